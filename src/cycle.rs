//! Cycle detection and changeset splitting (spec §4.4).
//!
//! The scheduler can deadlock: changeset A waits on one of its own member
//! versions, whose sibling version belongs to changeset B, which in turn
//! waits on a version whose sibling is back in A. No literal graph of
//! changesets is built to detect this — instead [`preceed`] defines a
//! single-valued step function over *ready* versions ("what ready version
//! is blocking this one's changeset"), and Floyd's tortoise-and-hare finds
//! a repeated value in the sequence it generates, which is enough to prove
//! a cycle exists without ever materializing one.

use tracing::warn;

use crate::config::EmitConfig;
use crate::database::{ChangesetId, ChangesetVariant, Database, VersionId};
use crate::heap::IndexHeap;

/// One step of the cycle-search function: given a ready version, return
/// some ready version whose changeset is blocking `v`'s own changeset.
///
/// FIXME: picks the first unready sibling found in changeset order, which
/// is not stable if other siblings are released between calls. Harmless
/// for Floyd's algorithm (any single-valued function works), but means
/// `preceed` is not a pure function of `v` alone over the life of a run.
fn preceed(db: &Database, v: VersionId) -> VersionId {
    let cs = db.version(v).commit;
    let versions = match &db.changeset(cs).variant {
        ChangesetVariant::Commit { versions, .. } => versions,
        other => unreachable!("ready version's changeset must be a commit, got {other:?}"),
    };
    let blocker = versions
        .iter()
        .copied()
        .find(|&u| u != v && db.version(u).ready_index.is_none())
        .expect("a changeset with unready_count > 0 must have an unready member version");

    let mut cur = blocker;
    loop {
        if db.version(cur).ready_index.is_some() {
            return cur;
        }
        cur = db
            .version(cur)
            .parent
            .expect("root versions are released by prepare_for_emission, so an unready version must have a parent");
    }
}

/// Floyd's tortoise-and-hare: returns a version on the cycle reachable by
/// repeatedly applying `preceed` starting from `start`.
fn cycle_find(db: &Database, start: VersionId) -> VersionId {
    let mut tortoise = start;
    let mut hare = start;
    loop {
        tortoise = preceed(db, tortoise);
        hare = preceed(db, preceed(db, hare));
        if tortoise == hare {
            return tortoise;
        }
    }
}

/// Split `blocked`'s member versions into a ready half (moved to a new
/// sibling changeset that's immediately inserted as ready) and a blocked
/// half (left behind). The new changeset shares the original's timestamp,
/// author and log, since they're still logically the same commit.
fn cycle_split(db: &mut Database, blocked: ChangesetId, config: &EmitConfig) {
    let (time, author, log, all_versions) = match &db.changeset(blocked).variant {
        ChangesetVariant::Commit { versions, author, log } => (db.changeset(blocked).time, author.clone(), log.clone(), versions.clone()),
        other => unreachable!("cycle_split target must be a commit changeset, got {other:?}"),
    };

    let (ready, still_blocked): (Vec<VersionId>, Vec<VersionId>) =
        all_versions.into_iter().partition(|&v| db.version(v).ready_index.is_some());

    assert!(
        !ready.is_empty(),
        "cycle_split: changeset {blocked:?} has no ready members to split off"
    );
    assert!(
        !still_blocked.is_empty(),
        "cycle_split: changeset {blocked:?} has no blocked members left, it should have become ready on its own"
    );

    if config.log_cycle_splits {
        let moved: Vec<&str> = ready.iter().map(|&v| db.version(v).version.as_str()).collect();
        let kept: Vec<&str> = still_blocked.iter().map(|&v| db.version(v).version.as_str()).collect();
        warn!(
            author = %author,
            moved = ?moved,
            remaining = ?kept,
            "*** CYCLE *** splitting changeset to break a dependency loop"
        );
    }

    let new_id = db.push_split_changeset(time, author, log, ready.clone());

    if let ChangesetVariant::Commit { versions, .. } = &mut db.changeset_mut(blocked).variant {
        versions.retain(|v| !ready.contains(v));
    }
    for v in &ready {
        db.version_mut(*v).commit = new_id;
    }

    // Every version moved to `new_id` is already released, so the new
    // changeset is born ready rather than flowing through
    // scheduler::changeset_release.
    db.insert_ready_changeset(new_id);
}

/// Find and resolve one cycle among the currently ready versions.
pub fn break_one_cycle(db: &mut Database, ready_versions: &mut IndexHeap<VersionId>, config: &EmitConfig) {
    let start = ready_versions
        .front()
        .expect("caller checked ready_versions is non-empty");
    let meeting = cycle_find(db, start);
    let blocked = db.version(meeting).commit;
    cycle_split(db, blocked, config);
}
