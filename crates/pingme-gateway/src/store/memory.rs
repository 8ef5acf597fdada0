//! In-memory durable store
//!
//! Backs the `DurableStore` port with process-local maps. Message ids come
//! from one global counter, so they are strictly increasing within every
//! conversation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use pingme_core::{
    ConversationId, DeliveryError, DurableStore, MessageEnvelope, MessageId, NewMessage,
    StoreResult, UserId,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};

/// Process-local store backend.
pub struct MemoryStore {
    conversations: DashMap<ConversationId, HashSet<UserId>>,
    messages: DashMap<ConversationId, Vec<MessageEnvelope>>,
    last_seen: DashMap<UserId, DateTime<Utc>>,
    next_conversation_id: AtomicI64,
    next_message_id: AtomicI64,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self {
            conversations: DashMap::new(),
            messages: DashMap::new(),
            last_seen: DashMap::new(),
            next_conversation_id: AtomicI64::new(1),
            next_message_id: AtomicI64::new(1),
        }
    }

    /// Create a conversation with the given participants and return its id
    pub fn add_conversation(&self, participants: &[UserId]) -> ConversationId {
        let id = ConversationId::new(self.next_conversation_id.fetch_add(1, Ordering::SeqCst));
        self.conversations
            .insert(id, participants.iter().copied().collect());
        id
    }

    /// Number of persisted messages in a conversation
    #[must_use]
    pub fn message_count(&self, conversation_id: ConversationId) -> usize {
        self.messages
            .get(&conversation_id)
            .map_or(0, |messages| messages.len())
    }

    /// Fetch a persisted message by id
    #[must_use]
    pub fn message(
        &self,
        conversation_id: ConversationId,
        message_id: MessageId,
    ) -> Option<MessageEnvelope> {
        self.messages
            .get(&conversation_id)
            .and_then(|messages| messages.iter().find(|m| m.id == message_id).cloned())
    }

    /// Last persisted last-seen timestamp for a user
    #[must_use]
    pub fn last_seen(&self, user_id: UserId) -> Option<DateTime<Utc>> {
        self.last_seen.get(&user_id).map(|entry| *entry)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn create_message(&self, message: NewMessage) -> StoreResult<MessageEnvelope> {
        if !self.conversations.contains_key(&message.conversation_id) {
            return Err(DeliveryError::ConversationNotFound(message.conversation_id));
        }

        let mut messages = self.messages.entry(message.conversation_id).or_default();

        // Idempotent resend: the same sender re-submitting the same nonce
        // gets the original envelope back
        if let Some(nonce) = &message.nonce {
            if let Some(existing) = messages
                .iter()
                .find(|m| m.sender_id == message.sender_id && m.nonce.as_deref() == Some(nonce))
            {
                return Ok(existing.clone());
            }
        }

        let envelope = MessageEnvelope {
            id: MessageId::new(self.next_message_id.fetch_add(1, Ordering::SeqCst)),
            conversation_id: message.conversation_id,
            sender_id: message.sender_id,
            content: message.content,
            attachment: message.attachment,
            nonce: message.nonce,
            timestamp: Utc::now(),
            is_read: false,
        };
        messages.push(envelope.clone());

        Ok(envelope)
    }

    async fn participants_of(&self, conversation_id: ConversationId) -> StoreResult<Vec<UserId>> {
        self.conversations
            .get(&conversation_id)
            .map(|participants| participants.iter().copied().collect())
            .ok_or(DeliveryError::ConversationNotFound(conversation_id))
    }

    async fn set_read(&self, message_id: MessageId, reader_id: UserId) -> StoreResult<()> {
        for mut entry in self.messages.iter_mut() {
            if let Some(message) = entry.value_mut().iter_mut().find(|m| m.id == message_id) {
                if message.sender_id == reader_id {
                    // Read receipts are scoped to recipients
                    return Err(DeliveryError::Forbidden {
                        user_id: reader_id,
                        conversation_id: message.conversation_id,
                    });
                }
                message.is_read = true;
                return Ok(());
            }
        }
        Err(DeliveryError::MessageNotFound(message_id))
    }

    async fn set_last_seen(&self, user_id: UserId, at: DateTime<Utc>) -> StoreResult<()> {
        self.last_seen.insert(user_id, at);
        Ok(())
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("conversations", &self.conversations.len())
            .finish()
    }
}
