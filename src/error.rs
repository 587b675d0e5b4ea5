use thiserror::Error;

use crate::{buffer::BufferError, operation::OperationError, request::RequestError, state::StateError};

/// Crate-wide error, aggregating every subsystem's own error type.
///
/// Callers who only care that *something* failed can match on this; callers
/// who care which layer failed can match on the wrapped subsystem error
/// directly (each subsystem's error is also returned from its own methods).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Buffer(#[from] BufferError),

    #[error(transparent)]
    Operation(#[from] OperationError),

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    State(#[from] StateError),
}
