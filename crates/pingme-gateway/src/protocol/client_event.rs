//! Inbound client events
//!
//! Every text frame a client sends decodes into exactly one of these
//! variants. Unknown `type` tags are a decode failure, not a silent skip.

use pingme_core::{AttachmentRef, ConversationId, DeliveryError, MessageId};
use serde::Deserialize;

/// A decoded inbound event.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Send a message into a conversation
    Message {
        conversation_id: ConversationId,
        #[serde(default)]
        content: String,
        #[serde(default)]
        attachment: Option<AttachmentRef>,
        #[serde(default)]
        nonce: Option<String>,
    },
    /// The sender is typing in a conversation
    Typing { conversation_id: ConversationId },
    /// Mark a message as read
    ReadReceipt {
        conversation_id: ConversationId,
        message_id: MessageId,
    },
}

impl ClientEvent {
    /// Decode a text frame.
    ///
    /// # Errors
    /// Returns `DeliveryError::Decode` for invalid JSON, missing fields, or
    /// an unknown event tag.
    pub fn decode(text: &str) -> Result<Self, DeliveryError> {
        serde_json::from_str(text).map_err(|e| DeliveryError::Decode(e.to_string()))
    }

    /// The conversation this event targets
    #[must_use]
    pub fn conversation_id(&self) -> ConversationId {
        match self {
            Self::Message {
                conversation_id, ..
            }
            | Self::Typing { conversation_id }
            | Self::ReadReceipt {
                conversation_id, ..
            } => *conversation_id,
        }
    }

    /// Short name for logging
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Message { .. } => "message",
            Self::Typing { .. } => "typing",
            Self::ReadReceipt { .. } => "read_receipt",
        }
    }
}
