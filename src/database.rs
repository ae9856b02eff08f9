//! The shared graph of files, versions, changesets and tags (spec §3).
//!
//! `Database` is the single arena that owns every node created for a run.
//! Every inter-node link — parent/child version chains, changeset
//! membership, branch/tag references — is a `Copy` typed index into one of
//! the arena's `Vec`s rather than a raw pointer, so the graph (including its
//! cycles) is representable without `unsafe`. This is the one substantive
//! redesign from the original tool's pointer/intrusive-list data model; see
//! `DESIGN.md` for the full rationale.
//!
//! Population (what `spec.md` calls the parser and branch analyzer) is out
//! of this crate's scope — `Database`'s `add_*` methods are the interface a
//! caller (a real parser, or a test) uses to build a database that already
//! satisfies the invariants in spec §3.

use ahash::AHashMap;

use crate::hash::BranchFingerprint;
use crate::heap::{HeapKey, IndexHeap};

macro_rules! arena_id {
    ($name:ident) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub usize);
    };
}

arena_id!(FileId);
arena_id!(VersionId);
arena_id!(ChangesetId);
arena_id!(TagId);

/// An input artifact identified by its path. Owns the ordered sequence of
/// versions recorded for it.
#[derive(Debug, Clone)]
pub struct FileNode {
    pub path: String,
    pub versions: Vec<VersionId>,
}

/// One revision of one file (spec §3 "Version").
#[derive(Debug, Clone)]
pub struct VersionNode {
    pub file: FileId,
    pub version: String,
    pub parent: Option<VersionId>,
    /// Versions whose `parent` is this version (replaces the original's
    /// `sibling`-chained intrusive list — see module docs).
    pub children: Vec<VersionId>,
    /// The branch this version lies on, or `None` for a genuinely anonymous
    /// branch (spec §4.5, §9 "Anonymous-branch changesets"). Trunk versions
    /// point at `TagId(0)`, not `None`.
    pub branch: Option<TagId>,
    pub commit: ChangesetId,
    pub dead: bool,
    pub implicit_merge: bool,
    /// Position in the caller-owned ready-versions heap, or `None`
    /// (the spec's `SIZE_MAX` sentinel) if not currently ready.
    pub ready_index: Option<usize>,
    pub(crate) seq: u64,
}

/// A repository-wide logical commit (spec §3 "Changeset").
#[derive(Debug, Clone)]
pub enum ChangesetVariant {
    /// Aggregates a non-empty list of versions sharing author, log and
    /// approximate time.
    Commit {
        versions: Vec<VersionId>,
        author: String,
        log: String,
    },
    /// The trunk-merge side effect of a vendor-branch commit. `parent` (on
    /// the owning `ChangesetNode`) points at the originating commit.
    ImplicitMerge,
    /// A named snapshot. The payload is the `Tag` this changeset wraps.
    Tag(TagId),
}

#[derive(Debug, Clone)]
pub struct ChangesetNode {
    pub variant: ChangesetVariant,
    pub time: i64,
    pub unready_count: usize,
    pub children: Vec<ChangesetId>,
    /// Meaningful for `ImplicitMerge` (the originating commit) and `Tag`
    /// (the commit whose branch state first matched, once found).
    pub parent: Option<ChangesetId>,
    pub heap_index: Option<usize>,
    pub(crate) seq: u64,
}

/// A named label embedded in a `Tag`-variant changeset (spec §3 "Tag").
#[derive(Debug, Clone)]
pub struct TagNode {
    pub name: String,
    /// `Some` iff this tag denotes a branch: the per-file live-version
    /// snapshot of that branch, indexed by `FileId`.
    pub branch_versions: Option<Vec<Option<VersionId>>>,
    pub is_released: bool,
    pub exact_match: bool,
    /// The changeset (always `ChangesetVariant::Tag(self)`) this tag is
    /// embedded in.
    pub changeset: ChangesetId,
    /// Number of times this tag's fingerprint has matched a live branch
    /// state in the current run — used to tell a genuine duplicate match
    /// apart from the first hit (spec §9, redefined "DUPLICATE").
    pub hit_count: u32,
    pub(crate) seq: u64,
}

/// The shared graph of files, versions, changesets and tags.
#[derive(Debug)]
pub struct Database {
    pub(crate) files: Vec<FileNode>,
    pub(crate) versions: Vec<VersionNode>,
    pub(crate) changesets: Vec<ChangesetNode>,
    pub(crate) tags: Vec<TagNode>,
    /// Static index from a branch-state fingerprint to the tags whose
    /// recorded target snapshot hashes to it. Populated once up front
    /// (by the out-of-scope branch analyzer, or directly by a test) and
    /// never mutated during emission.
    pub(crate) tag_fingerprint_index: AHashMap<BranchFingerprint, Vec<TagId>>,
    pub(crate) ready_changesets: IndexHeap<ChangesetId>,
    /// Bookkeeping only: every tag released during the current pass, kept
    /// in time order purely so end-of-run reporting is deterministic. Not
    /// consulted by the scheduler (see `DESIGN.md`).
    pub(crate) ready_tags: IndexHeap<TagId>,
    next_seq: u64,
}

/// Conventional index of the empty-named trunk branch (spec §3).
pub const TRUNK_TAG: TagId = TagId(0);

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

impl Database {
    pub fn new() -> Self {
        let mut db = Self {
            files: Vec::new(),
            versions: Vec::new(),
            changesets: Vec::new(),
            tags: Vec::new(),
            tag_fingerprint_index: AHashMap::new(),
            ready_changesets: IndexHeap::new(),
            ready_tags: IndexHeap::new(),
            next_seq: 0,
        };
        db.push_tag(String::new(), Some(Vec::new()), 0);
        debug_assert_eq!(db.tags.len() - 1, TRUNK_TAG.0);
        db
    }

    fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn push_tag(&mut self, name: String, branch_versions: Option<Vec<Option<VersionId>>>, time: i64) -> TagId {
        let tag_seq = self.next_seq();
        let cs_seq = self.next_seq();
        let tag_id = TagId(self.tags.len());
        let cs_id = ChangesetId(self.changesets.len());
        self.changesets.push(ChangesetNode {
            variant: ChangesetVariant::Tag(tag_id),
            time,
            unready_count: 0,
            children: Vec::new(),
            parent: None,
            heap_index: None,
            seq: cs_seq,
        });
        self.tags.push(TagNode {
            name,
            branch_versions,
            is_released: tag_id == TRUNK_TAG,
            exact_match: false,
            changeset: cs_id,
            hit_count: 0,
            seq: tag_seq,
        });
        tag_id
    }

    /// Register a file. Extends every existing branch's live snapshot with
    /// a new (absent) slot for it.
    pub fn add_file(&mut self, path: impl Into<String>) -> FileId {
        let id = FileId(self.files.len());
        self.files.push(FileNode {
            path: path.into(),
            versions: Vec::new(),
        });
        for tag in &mut self.tags {
            if let Some(bv) = &mut tag.branch_versions {
                bv.push(None);
            }
        }
        id
    }

    /// Register a named branch: a tag whose `branch_versions` is live
    /// (`Some`), sized to the current file count.
    pub fn add_branch_tag(&mut self, name: impl Into<String>, time: i64) -> TagId {
        let snapshot = vec![None; self.files.len()];
        self.push_tag(name.into(), Some(snapshot), time)
    }

    /// Register a plain (non-branch) tag: matched against other branches'
    /// live state, but never itself live-tracked.
    pub fn add_plain_tag(&mut self, name: impl Into<String>, time: i64) -> TagId {
        self.push_tag(name.into(), None, time)
    }

    /// Seed the static fingerprint index: `fingerprint` is the recorded
    /// target state for `tag`. Call once per tag before emission starts.
    pub fn seed_fingerprint(&mut self, fingerprint: BranchFingerprint, tag: TagId) {
        self.tag_fingerprint_index.entry(fingerprint).or_default().push(tag);
    }

    /// Tags whose recorded target state hashes to `fingerprint`, if any.
    pub(crate) fn tags_matching(&self, fingerprint: &BranchFingerprint) -> &[TagId] {
        self.tag_fingerprint_index
            .get(fingerprint)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Create an empty `commit`-variant changeset.
    pub fn add_commit_changeset(
        &mut self,
        time: i64,
        author: impl Into<String>,
        log: impl Into<String>,
    ) -> ChangesetId {
        let seq = self.next_seq();
        let id = ChangesetId(self.changesets.len());
        self.changesets.push(ChangesetNode {
            variant: ChangesetVariant::Commit {
                versions: Vec::new(),
                author: author.into(),
                log: log.into(),
            },
            time,
            unready_count: 0,
            children: Vec::new(),
            parent: None,
            heap_index: None,
            seq,
        });
        id
    }

    /// Create an `implicit_merge`-variant changeset derived from `parent`.
    pub fn add_implicit_merge_changeset(&mut self, parent: ChangesetId) -> ChangesetId {
        let time = self.changesets[parent.0].time;
        let seq = self.next_seq();
        let id = ChangesetId(self.changesets.len());
        self.changesets.push(ChangesetNode {
            variant: ChangesetVariant::ImplicitMerge,
            time,
            unready_count: 0,
            children: Vec::new(),
            parent: Some(parent),
            heap_index: None,
            seq,
        });
        id
    }

    /// Create a new commit changeset holding exactly `versions`, used by
    /// [`crate::cycle::cycle_split`] to peel the ready half off a blocked
    /// changeset. Unlike [`Database::add_commit_changeset`], the caller
    /// supplies the member list directly rather than building it up with
    /// [`Database::add_version`], since these versions already exist.
    pub(crate) fn push_split_changeset(
        &mut self,
        time: i64,
        author: String,
        log: String,
        versions: Vec<VersionId>,
    ) -> ChangesetId {
        let seq = self.next_seq();
        let id = ChangesetId(self.changesets.len());
        self.changesets.push(ChangesetNode {
            variant: ChangesetVariant::Commit { versions, author, log },
            time,
            unready_count: 0,
            children: Vec::new(),
            parent: None,
            heap_index: None,
            seq,
        });
        id
    }

    /// Create a new version of `file`, parented on `parent`, and attach it
    /// to `commit`'s version list.
    #[allow(clippy::too_many_arguments)]
    pub fn add_version(
        &mut self,
        file: FileId,
        version: impl Into<String>,
        parent: Option<VersionId>,
        branch: Option<TagId>,
        dead: bool,
        implicit_merge: bool,
        commit: ChangesetId,
    ) -> VersionId {
        let seq = self.next_seq();
        let id = VersionId(self.versions.len());
        self.versions.push(VersionNode {
            file,
            version: version.into(),
            parent,
            children: Vec::new(),
            branch,
            commit,
            dead,
            implicit_merge,
            ready_index: None,
            seq,
        });
        if let Some(p) = parent {
            self.versions[p.0].children.push(id);
        }
        self.files[file.0].versions.push(id);
        match &mut self.changesets[commit.0].variant {
            ChangesetVariant::Commit { versions, .. } => versions.push(id),
            other => panic!("add_version: changeset {commit:?} is not a commit changeset ({other:?})"),
        }
        // A commit changeset is ready only once every one of its versions
        // has been released (scheduler::version_release), so its
        // unready_count tracks version count, not just dependency edges.
        self.changesets[commit.0].unready_count += 1;
        id
    }

    /// Record that `parent` must be emitted before `child` becomes
    /// eligible: pushes the forward edge and bumps `child.unready_count` so
    /// `scheduler::changeset_release(parent)`'s cascade can bring it to
    /// zero.
    pub fn add_changeset_child(&mut self, parent: ChangesetId, child: ChangesetId) {
        self.changesets[parent.0].children.push(child);
        self.changesets[child.0].unready_count += 1;
    }

    pub fn file(&self, id: FileId) -> &FileNode {
        &self.files[id.0]
    }

    pub fn version(&self, id: VersionId) -> &VersionNode {
        &self.versions[id.0]
    }

    pub fn version_mut(&mut self, id: VersionId) -> &mut VersionNode {
        &mut self.versions[id.0]
    }

    pub fn changeset(&self, id: ChangesetId) -> &ChangesetNode {
        &self.changesets[id.0]
    }

    pub fn changeset_mut(&mut self, id: ChangesetId) -> &mut ChangesetNode {
        &mut self.changesets[id.0]
    }

    pub fn tag(&self, id: TagId) -> &TagNode {
        &self.tags[id.0]
    }

    pub fn tag_mut(&mut self, id: TagId) -> &mut TagNode {
        &mut self.tags[id.0]
    }

    pub fn files(&self) -> impl Iterator<Item = (FileId, &FileNode)> {
        self.files.iter().enumerate().map(|(i, f)| (FileId(i), f))
    }

    pub fn changesets(&self) -> impl Iterator<Item = (ChangesetId, &ChangesetNode)> {
        self.changesets.iter().enumerate().map(|(i, c)| (ChangesetId(i), c))
    }

    pub fn tags(&self) -> impl Iterator<Item = (TagId, &TagNode)> {
        self.tags.iter().enumerate().map(|(i, t)| (TagId(i), t))
    }

    // -- heap bookkeeping -------------------------------------------------
    //
    // Each wrapper keeps the relevant node's back-pointer field in sync
    // with its position in the corresponding heap; see `src/heap.rs`.

    pub(crate) fn insert_ready_version(&mut self, ready_versions: &mut IndexHeap<VersionId>, id: VersionId) {
        let time = self.changesets[self.versions[id.0].commit.0].time;
        let seq = self.versions[id.0].seq;
        let versions = &mut self.versions;
        ready_versions.insert(HeapKey { time, seq }, id, |vid, pos| {
            versions[vid.0].ready_index = Some(pos);
        });
    }

    pub(crate) fn remove_ready_version(&mut self, ready_versions: &mut IndexHeap<VersionId>, id: VersionId) {
        if let Some(pos) = self.versions[id.0].ready_index.take() {
            let versions = &mut self.versions;
            ready_versions.remove(pos, |vid, p| versions[vid.0].ready_index = Some(p));
        }
    }

    pub(crate) fn pop_ready_version(&mut self, ready_versions: &mut IndexHeap<VersionId>) -> Option<VersionId> {
        let versions = &mut self.versions;
        let popped = ready_versions.pop_front(|vid, p| versions[vid.0].ready_index = Some(p));
        if let Some(id) = popped {
            self.versions[id.0].ready_index = None;
        }
        popped
    }

    pub(crate) fn insert_ready_changeset(&mut self, id: ChangesetId) {
        let time = self.changesets[id.0].time;
        let seq = self.changesets[id.0].seq;
        let changesets = &mut self.changesets;
        self.ready_changesets.insert(HeapKey { time, seq }, id, |cid, pos| {
            changesets[cid.0].heap_index = Some(pos);
        });
    }

    pub(crate) fn pop_ready_changeset(&mut self) -> Option<ChangesetId> {
        let changesets = &mut self.changesets;
        let popped = self.ready_changesets.pop_front(|cid, p| changesets[cid.0].heap_index = Some(p));
        if let Some(id) = popped {
            self.changesets[id.0].heap_index = None;
        }
        popped
    }

    pub(crate) fn insert_ready_tag(&mut self, id: TagId) {
        let time = self.changesets[self.tags[id.0].changeset.0].time;
        let seq = self.tags[id.0].seq;
        let tags = &mut self.tags;
        self.ready_tags.insert(HeapKey { time, seq }, id, |tid, pos| {
            tags[tid.0].heap_index = Some(pos);
        });
    }

    /// Reset all heap memberships, readiness counters and tag release
    /// flags, while leaving the changeset/version/tag graph itself (file
    /// contents, parent links, and any `children`/`parent` edges wired up
    /// by a prior tag-matching pass) untouched. Used by
    /// [`crate::driver::Emitter`] between its two emission passes.
    pub fn reset_readiness(&mut self) {
        for v in &mut self.versions {
            v.ready_index = None;
        }
        for (i, t) in self.tags.iter_mut().enumerate() {
            t.is_released = i == TRUNK_TAG.0;
            t.exact_match = false;
            t.heap_index = None;
            t.hit_count = 0;
            if let Some(bv) = &mut t.branch_versions {
                bv.iter_mut().for_each(|slot| *slot = None);
            }
        }

        // unready_count is recomputed rather than simply cleared: for a
        // commit changeset it's the number of member versions (gated by
        // version_release) plus any incoming changeset-to-changeset edges
        // (a commit can itself be some other changeset's child, not just
        // tags/implicit-merges); for a tag/implicit_merge changeset it's
        // just the incoming edges. Those edges may already have been wired
        // by pass 1 via `add_changeset_child`, and this reset must not
        // discard them.
        let mut incoming = vec![0usize; self.changesets.len()];
        for cs in &self.changesets {
            for &child in &cs.children {
                incoming[child.0] += 1;
            }
        }
        for (i, cs) in self.changesets.iter_mut().enumerate() {
            cs.heap_index = None;
            cs.unready_count = match &cs.variant {
                ChangesetVariant::Commit { versions, .. } => versions.len() + incoming[i],
                ChangesetVariant::ImplicitMerge | ChangesetVariant::Tag(_) => incoming[i],
            };
        }

        self.ready_changesets = IndexHeap::new();
        self.ready_tags = IndexHeap::new();
    }
}
