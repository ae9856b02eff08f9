//! Error types for the changeset-emit crate.
//!
//! This module defines a unified error enumeration for everything the crate
//! can fail on *recoverably*. Invariant violations (spec: "cannot arise from
//! valid input, indicate a bug") are deliberately **not** modeled here — they
//! surface as panics (`assert!`/`unreachable!`) at the point of detection,
//! the same way the original tool would simply `abort()`.
//!
//! Notes:
//! - Each variant carries contextual details via its message payload.
//! - Integrates with `thiserror` to provide `Display`/`std::error::Error`.

use thiserror::Error;

#[derive(Error, Debug)]
/// Unified error enumeration for the changeset-emit library.
pub enum EmitError {
    /// A version's or changeset's recorded timestamp could not be formatted,
    /// even after falling back to UTC.
    #[error("could not format timestamp `{0}` in local or UTC form")]
    MalformedDate(String),

    /// The output collaborator failed while writing a record.
    #[error("IO Error: {0}")]
    IOError(#[from] std::io::Error),
}
