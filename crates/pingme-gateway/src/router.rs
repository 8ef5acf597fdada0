//! Message router - the dispatch core
//!
//! Takes a decoded client event and carries it through validate, authorize,
//! persist (sends only), and fan-out. Persistence is authoritative; fan-out
//! is best-effort per handle and proceeds even if the sender's connection
//! goes away mid-dispatch.

use crate::connection::ConnectionRegistry;
use crate::directory::ConversationDirectory;
use crate::protocol::{ClientEvent, ServerEvent};
use pingme_core::{
    ConversationId, DeliveryError, DurableStore, MessageId, NewMessage, UserId,
};
use std::collections::HashSet;
use std::sync::Arc;

/// Routes inbound client events to the store and the connected recipients.
pub struct MessageRouter {
    registry: Arc<ConnectionRegistry>,
    directory: Arc<ConversationDirectory>,
    store: Arc<dyn DurableStore>,
}

impl MessageRouter {
    /// Create a new router
    #[must_use]
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        directory: Arc<ConversationDirectory>,
        store: Arc<dyn DurableStore>,
    ) -> Self {
        Self {
            registry,
            directory,
            store,
        }
    }

    /// Process one inbound event on behalf of `sender_id`.
    ///
    /// Returns the synchronous acknowledgment for sends; typing indicators
    /// and read receipts produce no reply of their own.
    ///
    /// # Errors
    /// All errors are scoped to the requesting connection; no error here
    /// leaves partial state behind.
    pub async fn dispatch(
        &self,
        sender_id: UserId,
        event: ClientEvent,
    ) -> Result<Option<ServerEvent>, DeliveryError> {
        match event {
            ClientEvent::Message {
                conversation_id,
                content,
                attachment,
                nonce,
            } => {
                let message = NewMessage {
                    conversation_id,
                    sender_id,
                    content,
                    attachment,
                    nonce,
                };
                self.handle_send(message).await.map(Some)
            }
            ClientEvent::Typing { conversation_id } => self
                .handle_typing(sender_id, conversation_id)
                .await
                .map(|()| None),
            ClientEvent::ReadReceipt {
                conversation_id,
                message_id,
            } => self
                .handle_read_receipt(sender_id, conversation_id, message_id)
                .await
                .map(|()| None),
        }
    }

    /// Resolve the participant set and require the sender to be in it
    async fn authorize(
        &self,
        sender_id: UserId,
        conversation_id: ConversationId,
    ) -> Result<Arc<HashSet<UserId>>, DeliveryError> {
        let participants = self.directory.participants_of(conversation_id).await?;
        if !participants.contains(&sender_id) {
            return Err(DeliveryError::Forbidden {
                user_id: sender_id,
                conversation_id,
            });
        }
        Ok(participants)
    }

    async fn handle_send(&self, message: NewMessage) -> Result<ServerEvent, DeliveryError> {
        if message.is_empty() {
            return Err(DeliveryError::Decode(
                "message carries no content or attachment".to_string(),
            ));
        }

        let sender_id = message.sender_id;
        let participants = self
            .authorize(sender_id, message.conversation_id)
            .await?;

        let envelope = self.store.create_message(message).await?;

        tracing::debug!(
            message_id = %envelope.id,
            conversation_id = %envelope.conversation_id,
            sender_id = %sender_id,
            "Message persisted"
        );

        self.fan_out(
            &participants,
            sender_id,
            ServerEvent::chat_message(envelope.clone()),
        )
        .await;

        Ok(ServerEvent::ack(envelope))
    }

    async fn handle_typing(
        &self,
        sender_id: UserId,
        conversation_id: ConversationId,
    ) -> Result<(), DeliveryError> {
        let participants = self.authorize(sender_id, conversation_id).await?;
        self.fan_out(
            &participants,
            sender_id,
            ServerEvent::typing(conversation_id, sender_id),
        )
        .await;
        Ok(())
    }

    async fn handle_read_receipt(
        &self,
        sender_id: UserId,
        conversation_id: ConversationId,
        message_id: MessageId,
    ) -> Result<(), DeliveryError> {
        let participants = self.authorize(sender_id, conversation_id).await?;
        self.store.set_read(message_id, sender_id).await?;
        self.fan_out(
            &participants,
            sender_id,
            ServerEvent::read_receipt(conversation_id, message_id, sender_id),
        )
        .await;
        Ok(())
    }

    /// Push an event to every live handle of every participant except the
    /// sender. A recipient with no live handles simply receives nothing; a
    /// push failure on one handle never aborts delivery to the rest.
    async fn fan_out(
        &self,
        participants: &HashSet<UserId>,
        sender_id: UserId,
        event: ServerEvent,
    ) -> usize {
        let mut sent = 0usize;

        for &user_id in participants {
            if user_id == sender_id {
                // The sender reconciles through the ack, never a push
                continue;
            }
            for handle in self.registry.handles_for(user_id) {
                match handle.push(event.clone()).await {
                    Ok(()) => sent += 1,
                    Err(error) => {
                        tracing::debug!(
                            user_id = %user_id,
                            connection_id = %handle.id(),
                            error = %error,
                            "Push failed, continuing fan-out"
                        );
                    }
                }
            }
        }

        tracing::trace!(event = event.kind(), sent, "Fan-out complete");
        sent
    }
}

impl std::fmt::Debug for MessageRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageRouter")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
