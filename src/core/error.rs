//! Recoverable, construction-time errors.
//!
//! Hot-path failures (capacity overflow, invariant violation) are *not*
//! modelled here — per spec.md §7 those are caller misconfiguration and are
//! surfaced as panics, not `Result`s.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("half-edge mesh failed validation: {reason}")]
    InvalidHalfEdgeMesh { reason: &'static str },

    #[error("object {object_id} has no collision primitives")]
    EmptyObject { object_id: crate::core::types::ObjectId },

    #[error("primitive has non-positive extent: {reason}")]
    DegeneratePrimitive { reason: &'static str },
}
