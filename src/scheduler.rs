//! Readiness accounting and the emission order itself (spec §4.2, §4.3).
//!
//! A changeset becomes *ready* (eligible for [`next_changeset`]) once its
//! `unready_count` reaches zero. For a commit changeset that count is the
//! number of member versions not yet released; for a tag or implicit-merge
//! changeset it's the number of dependency edges still outstanding. Both
//! cases fall through the same [`changeset_release`] decrement-and-promote
//! step, so the rest of the scheduler doesn't need to know which kind of
//! changeset it's looking at.

use crate::branch;
use crate::config::EmitConfig;
use crate::cycle;
use crate::database::{ChangesetId, ChangesetVariant, Database, VersionId};
use crate::heap::IndexHeap;

/// Seed the ready-versions heap with every file's root version(s), kicking
/// off readiness propagation for a fresh pass. Call once before driving
/// either emission pass.
pub fn prepare_for_emission(db: &mut Database, ready_versions: &mut IndexHeap<VersionId>) {
    let roots: Vec<VersionId> = db
        .files()
        .flat_map(|(_, file)| file.versions.iter().copied())
        .filter(|&v| db.version(v).parent.is_none())
        .collect();
    for v in roots {
        version_release(db, ready_versions, v);
    }
}

/// Mark `id` ready: insert it into the ready-versions heap and propagate
/// the readiness signal to its owning changeset.
pub fn version_release(db: &mut Database, ready_versions: &mut IndexHeap<VersionId>, id: VersionId) {
    db.insert_ready_version(ready_versions, id);
    let commit = db.version(id).commit;
    changeset_release(db, commit);
}

/// Decrement `id`'s unready count; once it reaches zero, insert it into the
/// ready-changesets heap.
pub fn changeset_release(db: &mut Database, id: ChangesetId) {
    let cs = db.changeset_mut(id);
    debug_assert!(cs.unready_count > 0, "changeset_release called on an already-ready changeset");
    cs.unready_count = cs.unready_count.saturating_sub(1);
    if cs.unready_count == 0 {
        db.insert_ready_changeset(id);
    }
}

/// Record that `id` has been emitted: update branch state and matching
/// tags (for commit changesets), release its member versions' children,
/// and release anything waiting on `id` itself.
pub fn changeset_emitted(
    db: &mut Database,
    ready_versions: &mut IndexHeap<VersionId>,
    config: &EmitConfig,
    id: ChangesetId,
    authoritative: bool,
) {
    branch::changeset_update_branch_hash(db, config, id, authoritative);

    if let ChangesetVariant::Commit { versions, .. } = &db.changeset(id).variant {
        let versions = versions.clone();
        for v in versions {
            db.remove_ready_version(ready_versions, v);
            // Dead versions still propagate readiness: deletion is a real
            // revision in the chain, not a break in it.
            let children = db.version(v).children.clone();
            for child in children {
                version_release(db, ready_versions, child);
            }
        }
    }

    let children = db.changeset(id).children.clone();
    for child in children {
        changeset_release(db, child);
    }
}

/// The next ready changeset, if any, without touching cycle detection.
pub fn next_changeset(db: &mut Database) -> Option<ChangesetId> {
    db.pop_ready_changeset()
}

/// The next changeset to emit, breaking a dependency cycle if none is
/// immediately ready but versions are still waiting (spec §4.4).
///
/// Returns `None` only once every version and changeset in the database
/// has been emitted.
pub fn next_changeset_split(
    db: &mut Database,
    ready_versions: &mut IndexHeap<VersionId>,
    config: &EmitConfig,
) -> Option<ChangesetId> {
    if let Some(id) = next_changeset(db) {
        return Some(id);
    }
    if ready_versions.is_empty() {
        return None;
    }
    cycle::break_one_cycle(db, ready_versions, config);
    next_changeset(db)
}
