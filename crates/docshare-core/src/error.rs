//! Error types for DocShare Core.

use thiserror::Error;

/// Errors raised when an operation does not fit the text it targets.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperationError {
    #[error("operation range {position}..{end} exceeds document length {len}")]
    OutOfBounds {
        position: usize,
        end: usize,
        len: usize,
    },

    #[error("operation range overflows: position={position}, delete_len={delete_len}")]
    Overflow { position: usize, delete_len: usize },

    #[error("document of {len} chars is too short for outstanding edits adding {delta} chars")]
    BacklogMismatch { len: usize, delta: isize },

    #[error("inserted text of {len} chars exceeds limit of {max}")]
    InsertTooLarge { len: usize, max: usize },
}

/// Result type for operation checks.
pub type Result<T> = std::result::Result<T, OperationError>;
