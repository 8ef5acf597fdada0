//! Outbound server events
//!
//! Everything pushed to a client serializes as `{"type": ..., "payload": ...}`.

use pingme_core::{ConversationId, DeliveryError, MessageEnvelope, MessageId, PresenceRecord, UserId};
use serde::{Deserialize, Serialize};

/// Typing indicator payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingPayload {
    pub conversation_id: ConversationId,
    pub user_id: UserId,
}

/// Read receipt payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadReceiptPayload {
    pub conversation_id: ConversationId,
    pub message_id: MessageId,
    pub reader_id: UserId,
}

/// Error payload, scoped to the requesting connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

/// An event pushed to a client connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerEvent {
    /// A new message in a conversation the recipient participates in
    ChatMessage(MessageEnvelope),
    /// Synchronous acknowledgment of the sender's own send, carrying the
    /// canonical persisted envelope
    Ack(MessageEnvelope),
    /// Another participant is typing
    Typing(TypingPayload),
    /// Another participant read a message
    ReadReceipt(ReadReceiptPayload),
    /// A user's presence changed
    Presence(PresenceRecord),
    /// A request from this connection failed
    Error(ErrorPayload),
}

impl ServerEvent {
    #[must_use]
    pub fn chat_message(envelope: MessageEnvelope) -> Self {
        Self::ChatMessage(envelope)
    }

    #[must_use]
    pub fn ack(envelope: MessageEnvelope) -> Self {
        Self::Ack(envelope)
    }

    #[must_use]
    pub fn typing(conversation_id: ConversationId, user_id: UserId) -> Self {
        Self::Typing(TypingPayload {
            conversation_id,
            user_id,
        })
    }

    #[must_use]
    pub fn read_receipt(
        conversation_id: ConversationId,
        message_id: MessageId,
        reader_id: UserId,
    ) -> Self {
        Self::ReadReceipt(ReadReceiptPayload {
            conversation_id,
            message_id,
            reader_id,
        })
    }

    #[must_use]
    pub fn presence(record: PresenceRecord) -> Self {
        Self::Presence(record)
    }

    /// Build an error event from a delivery failure
    #[must_use]
    pub fn error(err: &DeliveryError) -> Self {
        Self::Error(ErrorPayload {
            code: err.code().to_string(),
            message: err.to_string(),
        })
    }

    /// Short name for logging
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ChatMessage(_) => "chat_message",
            Self::Ack(_) => "ack",
            Self::Typing(_) => "typing",
            Self::ReadReceipt(_) => "read_receipt",
            Self::Presence(_) => "presence",
            Self::Error(_) => "error",
        }
    }

    /// Serialize to JSON for the transport
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
