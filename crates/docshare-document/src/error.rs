//! Error types for the document module.

use docshare_core::OperationError;
use thiserror::Error;

/// Errors that can occur while editing a document.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The edit does not fit the current text.
    #[error("invalid edit: {0}")]
    InvalidEdit(#[from] OperationError),

    /// The editing surface refused the edit (read-only, disposed, ...).
    #[error("document rejected edit: {0}")]
    Rejected(String),
}

/// Result type for document operations.
pub type Result<T> = std::result::Result<T, DocumentError>;
