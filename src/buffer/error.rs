use thiserror::Error;

/// Error type for invalid buffer operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    #[error(
        "buffer splice out of bounds: index {index} exceeds buffer length {length}"
    )]
    OutOfBounds { index: usize, length: usize },
}
