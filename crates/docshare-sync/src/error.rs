//! Error types for the sync module.

use docshare_core::PeerId;
use thiserror::Error;

/// Errors that can occur while encoding, decoding or moving messages.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Protocol version mismatch with peer.
    #[error("protocol version mismatch: local={local}, peer={peer}")]
    VersionMismatch { local: u8, peer: u8 },

    /// Message validation failed.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Message could not be serialized.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Bytes did not decode into a message envelope.
    #[error("decoding error: {0}")]
    Decoding(String),

    /// Transport-level error.
    #[error("transport error: {0}")]
    TransportError(String),

    /// Peer is not connected.
    #[error("peer not connected: {0}")]
    PeerNotConnected(PeerId),

    /// The inbound side of the channel is gone.
    #[error("channel closed")]
    ChannelClosed,
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
