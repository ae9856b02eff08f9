//! The 160-bit branch-state fingerprint used to match reconstructed branch
//! snapshots against recorded tags.
//!
//! A fingerprint is the SHA-1 digest of the live (non-null, non-dead) slots
//! of a branch's per-file version snapshot, fed in ascending file-index
//! order. Unlike object hashing in a content-addressed store, this digest is
//! never used to identify or deduplicate data — only to answer "does this
//! branch's current state match some recorded tag's target state", so a
//! fixed 160-bit SHA-1 (no pluggable algorithm) is all the spec calls for.

use std::fmt::Display;

use colored::Colorize;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use crate::database::VersionId;

/// 160-bit digest of a branch-state snapshot, used as the key into the
/// tag-fingerprint index.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BranchFingerprint(pub [u8; 20]);

impl std::fmt::Debug for BranchFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BranchFingerprint({self})")
    }
}

impl Display for BranchFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl BranchFingerprint {
    /// Colorized hex string, for terminal diagnostics.
    pub fn to_color_str(self) -> String {
        self.to_string().yellow().bold().to_string()
    }
}

/// Incrementally builds a [`BranchFingerprint`] by feeding it the identity of
/// every live version in a branch snapshot, in ascending file-index order.
///
/// A version's "identity" for hashing purposes is its arena index
/// (`VersionId`), which stands in for the pointer identity the original tool
/// hashes directly — a pointer value isn't reproducible across runs or
/// processes, while an arena index is, which is exactly what the crate's
/// determinism property (spec §8) requires.
#[derive(Default)]
pub struct FingerprintBuilder {
    hasher: Sha1,
}

impl FingerprintBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one live slot's version identity into the digest.
    pub fn update(&mut self, version: VersionId) {
        self.hasher.update(version.0.to_le_bytes());
    }

    pub fn finish(self) -> BranchFingerprint {
        let digest = self.hasher.finalize();
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest);
        BranchFingerprint(bytes)
    }
}
