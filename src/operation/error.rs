use thiserror::Error;

use crate::buffer::BufferError;

/// Error type for invalid operation construction, application or transform.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OperationError {
    #[error(transparent)]
    Buffer(#[from] BufferError),

    /// Attempted to merge a reversible delete with a non-reversible one.
    #[error("cannot merge a reversible delete with a non-reversible one")]
    MergeMismatch,

    /// `mirror()` was called on a non-reversible delete.
    #[error("cannot mirror a non-reversible delete")]
    MirrorUndefined,

    /// Two inserts share a position and no tie-break (`cid`) was supplied.
    #[error("ambiguous transform: two inserts at position {position} with no cid")]
    AmbiguousCid { position: usize },

    /// `make_reversible` was called against a pair of operations whose
    /// shapes (`Split` vs. non-`Split`) don't match.
    #[error("cannot make operation reversible: shape mismatch with its translated counterpart")]
    ShapeMismatch,
}
