//! Session protocol message types.
//!
//! These messages are exchanged between the two parties of a sharing session.

use serde::{Deserialize, Serialize};

use docshare_core::{Operation, PeerId};

/// Current protocol version.
pub const PROTOCOL_VERSION: u8 = 0;

/// Session protocol messages.
///
/// Encoded with an explicit `kind` discriminator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShareMessage {
    /// Invitation to share, carrying the full document.
    Start(StartMessage),

    /// A single edit, in the sender's transform context.
    Update(UpdateMessage),

    /// End of the session, or refusal of an invitation.
    Stop,
}

/// Payload of a [`ShareMessage::Start`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartMessage {
    /// The initiator.
    pub sender_id: PeerId,
    /// Name shown to the receiver when asking whether to accept.
    pub sender_name: String,
    /// The intended receiver.
    pub receiver_id: PeerId,
    /// Full text of the document at the moment sharing started.
    pub document_text: String,
    /// File name, with extension, of the shared document.
    pub file_name: String,
}

/// Payload of a [`ShareMessage::Update`].
///
/// The counters place the edit in the sender's history: it is the sender's
/// `sent`-th edit, made after applying `seen` edits from the receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateMessage {
    #[serde(flatten)]
    pub operation: Operation,
    /// Edits the sender has sent, this one included.
    pub sent: u64,
    /// Edits from the receiver the sender had applied.
    pub seen: u64,
}

impl UpdateMessage {
    pub fn new(operation: Operation, sent: u64, seen: u64) -> Self {
        Self {
            operation,
            sent,
            seen,
        }
    }

    /// An update with no history attached.
    pub fn untagged(operation: Operation) -> Self {
        Self::new(operation, 0, 0)
    }
}

impl From<Operation> for UpdateMessage {
    fn from(operation: Operation) -> Self {
        Self::untagged(operation)
    }
}

/// Versioned wrapper written on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Protocol version of the sender.
    pub version: u8,
    /// The message itself.
    pub message: ShareMessage,
}

impl Envelope {
    /// Wrap a message with the current protocol version.
    pub fn new(message: ShareMessage) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            message,
        }
    }
}

/// Message size limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageLimits {
    /// Max chars of document text in a Start message.
    pub max_document_chars: usize,
    /// Max chars inserted by one Update.
    pub max_insert_chars: usize,
    /// Max chars of a file name.
    pub max_file_name_chars: usize,
    /// Max chars of a sender display name.
    pub max_sender_name_chars: usize,
    /// Max size of one encoded envelope.
    pub max_message_bytes: usize,
}

impl Default for MessageLimits {
    fn default() -> Self {
        Self {
            max_document_chars: 4 * 1024 * 1024,
            max_insert_chars: 1024 * 1024,
            max_file_name_chars: 1024,
            max_sender_name_chars: 256,
            max_message_bytes: 32 * 1024 * 1024,
        }
    }
}

impl ShareMessage {
    /// Short name of the variant, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ShareMessage::Start(_) => "start",
            ShareMessage::Update(_) => "update",
            ShareMessage::Stop => "stop",
        }
    }

    /// Check if this message respects size limits.
    pub fn validate_limits(&self, limits: &MessageLimits) -> Result<(), &'static str> {
        match self {
            ShareMessage::Start(start) => {
                if start.document_text.chars().count() > limits.max_document_chars {
                    return Err("document too large");
                }
                if start.file_name.chars().count() > limits.max_file_name_chars {
                    return Err("file name too long");
                }
                if start.sender_name.chars().count() > limits.max_sender_name_chars {
                    return Err("sender name too long");
                }
            }
            ShareMessage::Update(UpdateMessage { operation: op, .. }) => {
                if op.check_structure().is_err() {
                    return Err("operation range overflows");
                }
                if op.inserted_len() > limits.max_insert_chars {
                    return Err("inserted text too large");
                }
            }
            ShareMessage::Stop => {}
        }
        Ok(())
    }
}
