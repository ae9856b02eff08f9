//! Run-time configuration for the emission driver.

use serde::{Deserialize, Serialize};

/// Tunables for [`crate::driver::Emitter`].
///
/// None of these affect emission *order* (that's fully determined by the
/// database and the heap tie-break rule) — they only affect diagnostics and
/// which optional pass is run.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EmitConfig {
    /// Run pass 1 (tag-point assignment) before the authoritative pass. Only
    /// ever disabled in tests that want to exercise pass 2 in isolation
    /// against a database whose tag edges were wired by hand.
    pub run_tag_assignment_pass: bool,

    /// Emit a `tracing::warn!` line for every cycle split, matching the
    /// original tool's `*** CYCLE ***` stderr banner.
    pub log_cycle_splits: bool,

    /// Emit `tracing::warn!("*** HIT ...")` lines for tag/branch matches.
    pub log_tag_hits: bool,

    /// Name used for the trunk branch in diagnostics and output records.
    pub trunk_name: String,
}

impl Default for EmitConfig {
    fn default() -> Self {
        Self {
            run_tag_assignment_pass: true,
            log_cycle_splits: true,
            log_tag_hits: true,
            trunk_name: String::new(),
        }
    }
}
