use thiserror::Error;

use crate::operation::OperationError;
use crate::request::RequestError;
use crate::vector::Vector;

/// Error type for invalid state transitions.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateError {
    #[error(transparent)]
    Operation(#[from] OperationError),

    #[error(transparent)]
    Request(#[from] RequestError),

    /// `translate` exhausted every contributing user without finding a
    /// reachable intermediate vector; the target is genuinely unreachable
    /// from the request's own vector given the current log.
    #[error("no translation path from request vector to target {target}")]
    NoTranslationPath { target: Vector },

    /// `request_by_user` was asked for an index past the end of that
    /// user's contributions to the log.
    #[error("no request found for user at the requested index")]
    UnknownRequest,
}
