//! Collaborator ports - interfaces to systems outside the delivery core
//!
//! The core defines what it needs from the identity provider and the durable
//! store; the surrounding application supplies the implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::envelope::{MessageEnvelope, NewMessage};
use crate::error::DeliveryError;
use crate::ids::{ConversationId, MessageId, UserId};

/// Result type for collaborator operations
pub type StoreResult<T> = Result<T, DeliveryError>;

/// Token verification port to the identity collaborator.
///
/// Registration and credential management live entirely outside the core;
/// all the core needs is to turn a bearer token into a `UserId`.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Verify a bearer token, returning the authenticated user.
    ///
    /// # Errors
    /// Returns `DeliveryError::Auth` if the token is missing, malformed,
    /// expired, or otherwise rejected.
    async fn verify_token(&self, token: &str) -> Result<UserId, DeliveryError>;
}

/// Port to the durable conversation/message store.
///
/// The store is authoritative for conversation membership and message
/// history; the core only caches and routes.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Persist a message, assigning its id and timestamp.
    ///
    /// Message ids are strictly increasing within a conversation. A store
    /// may use the envelope's nonce to de-duplicate client resends, in which
    /// case the original envelope is returned unchanged.
    async fn create_message(&self, message: NewMessage) -> StoreResult<MessageEnvelope>;

    /// Resolve the participant set of a conversation.
    ///
    /// # Errors
    /// Returns `DeliveryError::ConversationNotFound` for unknown
    /// conversations.
    async fn participants_of(&self, conversation_id: ConversationId) -> StoreResult<Vec<UserId>>;

    /// Mark a message as read on behalf of `reader_id`.
    ///
    /// The update is scoped: only a participant other than the message's
    /// sender may flip the flag.
    async fn set_read(&self, message_id: MessageId, reader_id: UserId) -> StoreResult<()>;

    /// Persist a user's last-seen timestamp. Best-effort; callers are
    /// expected to log and swallow failures.
    async fn set_last_seen(&self, user_id: UserId, at: DateTime<Utc>) -> StoreResult<()>;
}
