//! Branch-state tracking and tag matching (spec §4.5).
//!
//! Every time a commit (or implicit-merge) changeset is emitted, the branch
//! it writes to gets a new live snapshot: one slot per file, holding that
//! file's current version on the branch (or absent, once deleted or never
//! created there). The snapshot is fingerprinted and looked up in the tag
//! index; a hit wires a dependency edge from the writing changeset to the
//! matching tag's changeset, so the tag flows through the scheduler like
//! any other changeset once its prerequisite is actually emitted.

use tracing::warn;

use crate::config::EmitConfig;
use crate::database::{ChangesetId, ChangesetVariant, Database, TagId, VersionId, TRUNK_TAG};
use crate::hash::{BranchFingerprint, FingerprintBuilder};

/// Update the branch `cs` writes to with its effective versions. Returns
/// the number of slots actually changed; `0` means either an anonymous
/// branch (spec §9) or a changeset variant with nothing to write.
pub fn changeset_update_branch_versions(db: &mut Database, cs: ChangesetId) -> usize {
    let Some((branch, effective)) = effective_versions(db, cs) else {
        return 0;
    };

    let mut changed = 0;
    for v in effective {
        let file = db.version(v).file;
        let new_value = if db.version(v).dead { None } else { Some(v) };
        if let Some(slots) = &mut db.tag_mut(branch).branch_versions {
            if slots[file.0] != new_value {
                slots[file.0] = new_value;
                changed += 1;
            }
        }
    }
    changed
}

/// The branch a changeset writes to, and the versions it contributes to
/// that branch's live snapshot (spec §4.5).
fn effective_versions(db: &Database, cs: ChangesetId) -> Option<(TagId, Vec<VersionId>)> {
    match &db.changeset(cs).variant {
        ChangesetVariant::ImplicitMerge => {
            let parent = db
                .changeset(cs)
                .parent
                .expect("implicit_merge changeset must have a parent commit");
            let parent_versions = match &db.changeset(parent).variant {
                ChangesetVariant::Commit { versions, .. } => versions.clone(),
                other => unreachable!("implicit_merge parent must be a commit changeset, got {other:?}"),
            };
            let effective: Vec<VersionId> = parent_versions
                .into_iter()
                .filter(|&v| db.version(v).implicit_merge)
                .collect();
            Some((TRUNK_TAG, effective))
        }
        ChangesetVariant::Commit { versions, .. } => {
            if versions.is_empty() {
                return None;
            }
            let branch = db.version(versions[0]).branch?;
            Some((branch, versions.clone()))
        }
        ChangesetVariant::Tag(_) => None,
    }
}

/// Update branch state for `cs` and, if anything changed, fingerprint the
/// result and release any tag whose recorded target state now matches.
/// `authoritative` distinguishes the real (pass 2) run from the
/// tag-discovery (pass 1) run: diagnostics only print, and duplicate-hit
/// tracking only counts, on the real pass.
pub fn changeset_update_branch_hash(db: &mut Database, config: &EmitConfig, cs: ChangesetId, authoritative: bool) -> usize {
    let changed = changeset_update_branch_versions(db, cs);
    if changed == 0 {
        return 0;
    }
    let Some((branch, _)) = effective_versions(db, cs) else {
        return changed;
    };
    let fingerprint = fingerprint_branch(db, branch);
    let hits = db.tags_matching(&fingerprint).to_vec();
    for tag in hits {
        record_hit(db, config, tag, cs, authoritative);
    }
    changed
}

fn fingerprint_branch(db: &Database, branch: TagId) -> BranchFingerprint {
    let slots = db
        .tag(branch)
        .branch_versions
        .as_ref()
        .expect("fingerprint_branch called on a non-branch tag");
    let mut builder = FingerprintBuilder::new();
    for slot in slots {
        if let Some(v) = slot {
            if !db.version(*v).dead {
                builder.update(*v);
            }
        }
    }
    builder.finish()
}

fn record_hit(db: &mut Database, config: &EmitConfig, tag: TagId, matching_changeset: ChangesetId, authoritative: bool) {
    let tag_changeset = db.tag(tag).changeset;
    let mut exact_match_now = false;
    if db.changeset(tag_changeset).parent.is_none() {
        db.changeset_mut(tag_changeset).parent = Some(matching_changeset);
        db.add_changeset_child(matching_changeset, tag_changeset);
        db.tag_mut(tag).exact_match = true;
        exact_match_now = true;
    }

    if authoritative {
        db.tag_mut(tag).hit_count += 1;
    }
    let hit_count = db.tag(tag).hit_count;
    let already_released = db.tag(tag).is_released;

    if authoritative && config.log_tag_hits {
        let name = db.tag(tag).name.clone();
        let kind = if db.tag(tag).branch_versions.is_some() { "BRANCH" } else { "TAG" };
        if hit_count > 1 {
            warn!(tag = %name, kind, "*** HIT {kind} {name} (DUPLICATE)");
        } else if !exact_match_now {
            warn!(tag = %name, kind, "*** HIT {kind} {name} (ALREADY EMITTED)");
        } else {
            warn!(tag = %name, kind, "*** HIT {kind} {name}");
        }
    }

    if !already_released {
        db.tag_mut(tag).is_released = true;
        db.insert_ready_tag(tag);
    }
}
