//! Wire encoding for session messages.
//!
//! Every message travels as a CBOR-encoded [`Envelope`]: a protocol version
//! plus the message, whose variant is named by a `kind` field. The channel
//! treats the resulting bytes as opaque.

use bytes::Bytes;

use crate::error::{Result, SyncError};
use crate::messages::{Envelope, MessageLimits, ShareMessage, PROTOCOL_VERSION};

/// Encode a message for the wire, enforcing `limits`.
pub fn encode(message: &ShareMessage, limits: &MessageLimits) -> Result<Bytes> {
    message
        .validate_limits(limits)
        .map_err(|reason| SyncError::InvalidMessage(reason.into()))?;

    let envelope = Envelope::new(message.clone());
    let mut buf = Vec::new();
    ciborium::into_writer(&envelope, &mut buf).map_err(|e| SyncError::Encoding(e.to_string()))?;

    if buf.len() > limits.max_message_bytes {
        return Err(SyncError::InvalidMessage(format!(
            "encoded message is {} bytes, limit is {}",
            buf.len(),
            limits.max_message_bytes
        )));
    }
    Ok(Bytes::from(buf))
}

/// Decode bytes received from the wire, enforcing `limits`.
pub fn decode(bytes: &[u8], limits: &MessageLimits) -> Result<ShareMessage> {
    if bytes.len() > limits.max_message_bytes {
        return Err(SyncError::InvalidMessage(format!(
            "message is {} bytes, limit is {}",
            bytes.len(),
            limits.max_message_bytes
        )));
    }

    let envelope: Envelope =
        ciborium::from_reader(bytes).map_err(|e| SyncError::Decoding(e.to_string()))?;

    if envelope.version != PROTOCOL_VERSION {
        return Err(SyncError::VersionMismatch {
            local: PROTOCOL_VERSION,
            peer: envelope.version,
        });
    }

    envelope
        .message
        .validate_limits(limits)
        .map_err(|reason| SyncError::InvalidMessage(reason.into()))?;

    Ok(envelope.message)
}
