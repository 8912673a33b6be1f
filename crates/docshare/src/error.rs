//! Error types for document sharing.

use docshare_core::{OperationError, PeerId};
use docshare_document::DocumentError;
use docshare_sync::SyncError;
use thiserror::Error;

/// Errors that can occur during sharing operations.
///
/// Every error is scoped to a single session; none is fatal to the process.
#[derive(Debug, Error)]
pub enum ShareError {
    /// Encoding, decoding or transport error.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// The editing surface refused an edit.
    #[error("document error: {0}")]
    Document(#[from] DocumentError),

    /// A session is already active or pending.
    #[error("already sharing or waiting on a start request")]
    Busy,

    /// No start request is waiting for a decision.
    #[error("no pending share request")]
    NoPendingOffer,

    /// A message that decoded fine but makes no sense in the current session.
    #[error("protocol violation from {peer}: {reason}")]
    Protocol { peer: PeerId, reason: String },

    /// An incoming edit did not fit the document; the session was ended.
    #[error("invalid remote operation: {0}")]
    InvalidOperation(#[from] OperationError),

    /// Invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl ShareError {
    /// True for malformed, unexpected or misaddressed messages.
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            ShareError::Protocol { .. }
                | ShareError::Sync(
                    SyncError::Decoding(_)
                        | SyncError::InvalidMessage(_)
                        | SyncError::VersionMismatch { .. }
                )
        )
    }
}

/// Result type for sharing operations.
pub type Result<T> = std::result::Result<T, ShareError>;
