//! Delivery errors - the failure taxonomy of the real-time core

use thiserror::Error;

use crate::ids::{ConversationId, MessageId, UserId};

/// Errors produced while accepting, routing, or delivering client events.
///
/// Every variant is scoped to the requesting connection; none of them may
/// disturb other connections or the shared registries.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Handshake rejected; the connection never opens
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Malformed inbound event; the connection stays open
    #[error("malformed client event: {0}")]
    Decode(String),

    /// Sender is not a participant of the conversation
    #[error("user {user_id} is not a participant of conversation {conversation_id}")]
    Forbidden {
        user_id: UserId,
        conversation_id: ConversationId,
    },

    /// The conversation does not exist in the durable store
    #[error("conversation not found: {0}")]
    ConversationNotFound(ConversationId),

    /// The referenced message does not exist in the durable store
    #[error("message not found: {0}")]
    MessageNotFound(MessageId),

    /// Persistence failure; nothing was routed
    #[error("storage error: {0}")]
    Storage(String),

    /// Late-arriving operation on a torn-down connection; never surfaced
    /// to any client
    #[error("connection closed")]
    ConnectionClosed,
}

impl DeliveryError {
    /// Get a stable wire code for error events
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Auth(_) => "AUTH_FAILED",
            Self::Decode(_) => "DECODE_ERROR",
            Self::Forbidden { .. } => "FORBIDDEN",
            Self::ConversationNotFound(_) => "UNKNOWN_CONVERSATION",
            Self::MessageNotFound(_) => "UNKNOWN_MESSAGE",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::ConnectionClosed => "CONNECTION_CLOSED",
        }
    }

    /// Check if this is a "not found" error
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ConversationNotFound(_) | Self::MessageNotFound(_)
        )
    }

    /// Only authentication failures terminate the connection; every other
    /// error is reported to the sender and the session continues.
    #[must_use]
    pub fn closes_connection(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}
