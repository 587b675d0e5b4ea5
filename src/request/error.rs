use thiserror::Error;

use crate::operation::OperationError;

/// Error type for invalid request construction or manipulation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RequestError {
    #[error(transparent)]
    Operation(#[from] OperationError),

    /// `fold` was asked to collapse an odd number of do/undo or undo/redo
    /// pairs; a fold always removes a matched pair, so the amount must be
    /// even.
    #[error("fold amount {amount} is odd, expected an even number of paired requests")]
    FoldParity { amount: i64 },

    /// An `UndoRequest`/`RedoRequest` has no matching request in the log.
    #[error("no associated request found in the log for this undo/redo")]
    NoAssociatedRequest,
}
