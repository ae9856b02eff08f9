//! Builds a small hand-rolled `Database` — three files on trunk, a cycle
//! between two of them, and a release tag matching the resulting branch
//! state — and runs it through `Emitter` to stdout.
//!
//! Run with `cargo run --example emit_demo`.

use changeset_emit::database::TRUNK_TAG;
use changeset_emit::hash::FingerprintBuilder;
use changeset_emit::output::TextWriter;
use changeset_emit::{Database, EmitConfig, Emitter};

fn main() {
    tracing_subscriber::fmt().with_target(false).without_time().init();

    let mut db = Database::new();

    let readme = db.add_file("README.md");
    let main_rs = db.add_file("src/main.rs");
    let lib_rs = db.add_file("src/lib.rs");

    let cs_init = db.add_commit_changeset(1, "alice", "initial import");
    let readme_1_1 = db.add_version(readme, "1.1", None, Some(TRUNK_TAG), false, false, cs_init);
    let main_1_1 = db.add_version(main_rs, "1.1", None, Some(TRUNK_TAG), false, false, cs_init);

    // Two interleaved commits whose parent edges cross: X touches
    // main.rs's next revision and lib.rs's first revision; Y touches
    // lib.rs's next revision and main.rs's revision after that. Depending
    // on which gets scheduled first, neither is ready until the scheduler
    // breaks the cycle.
    let cs_x = db.add_commit_changeset(3, "bob", "wire up lib");
    let cs_y = db.add_commit_changeset(2, "bob", "expand main");

    let lib_1_1 = db.add_version(lib_rs, "1.1", None, Some(TRUNK_TAG), false, false, cs_x);
    let main_1_2 = db.add_version(main_rs, "1.2", Some(main_1_1), Some(TRUNK_TAG), false, false, cs_y);
    let _lib_1_2 = db.add_version(lib_rs, "1.2", Some(lib_1_1), Some(TRUNK_TAG), false, false, cs_y);
    let _main_1_3 = db.add_version(main_rs, "1.3", Some(main_1_2), Some(TRUNK_TAG), false, false, cs_x);

    // A tag recorded as matching the state once README, main.rs and lib.rs
    // have all landed their first revision.
    let fingerprint = {
        let mut b = FingerprintBuilder::new();
        b.update(readme_1_1);
        b.update(main_1_1);
        b.finish()
    };
    let release = db.add_plain_tag("v0.1.0", 1);
    db.seed_fingerprint(fingerprint, release);

    let config = EmitConfig::default();
    let mut writer = TextWriter::new(std::io::stdout());
    let summary = Emitter::run(&mut db, &mut writer, &config).expect("demo database has no invariant violations");

    eprintln!(
        "\n{} of {} commits emitted, {} of {} branches+tags emitted",
        summary.commit_changesets_emitted,
        summary.commit_changesets_total,
        summary.total_emitted(),
        summary.total_tags_and_branches(),
    );
}
