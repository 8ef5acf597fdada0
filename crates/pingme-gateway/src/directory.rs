//! Conversation directory
//!
//! Read-through cache resolving a conversation to its participant set, so
//! fan-out target computation does not hit the durable store on every
//! message. The store stays authoritative; cache entries expire after a
//! bounded TTL and can be invalidated eagerly when membership changes.

use dashmap::DashMap;
use pingme_core::{ConversationId, DeliveryError, DurableStore, UserId};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Default staleness bound for cached participant sets
pub const DEFAULT_PARTICIPANT_TTL: Duration = Duration::from_secs(30);

struct CachedParticipants {
    participants: Arc<HashSet<UserId>>,
    fetched_at: Instant,
}

/// Cached conversation-to-participants mapping.
pub struct ConversationDirectory {
    store: Arc<dyn DurableStore>,
    cache: DashMap<ConversationId, CachedParticipants>,
    ttl: Duration,
}

impl ConversationDirectory {
    /// Create a directory with the given staleness bound
    #[must_use]
    pub fn new(store: Arc<dyn DurableStore>, ttl: Duration) -> Self {
        Self {
            store,
            cache: DashMap::new(),
            ttl,
        }
    }

    /// Create a directory with the default 30s staleness bound
    #[must_use]
    pub fn with_default_ttl(store: Arc<dyn DurableStore>) -> Self {
        Self::new(store, DEFAULT_PARTICIPANT_TTL)
    }

    /// Resolve the participant set of a conversation.
    ///
    /// Serves from cache while the entry is within its TTL, otherwise loads
    /// synchronously from the store. The cache guard is never held across
    /// the store call.
    ///
    /// # Errors
    /// Returns `DeliveryError::ConversationNotFound` for unknown
    /// conversations, or whatever the store load fails with.
    pub async fn participants_of(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Arc<HashSet<UserId>>, DeliveryError> {
        if let Some(entry) = self.cache.get(&conversation_id) {
            if entry.fetched_at.elapsed() < self.ttl {
                return Ok(Arc::clone(&entry.participants));
            }
        }

        let listed = self.store.participants_of(conversation_id).await?;
        let participants: HashSet<UserId> = listed.into_iter().collect();
        // An empty membership means the conversation is effectively gone
        if participants.is_empty() {
            return Err(DeliveryError::ConversationNotFound(conversation_id));
        }

        let participants = Arc::new(participants);
        self.cache.insert(
            conversation_id,
            CachedParticipants {
                participants: Arc::clone(&participants),
                fetched_at: Instant::now(),
            },
        );

        tracing::trace!(
            conversation_id = %conversation_id,
            participants = participants.len(),
            "Participant set cached"
        );

        Ok(participants)
    }

    /// Drop the cached entry for a conversation.
    ///
    /// The hook for the surrounding application to call when a participant
    /// is added or removed.
    pub fn invalidate(&self, conversation_id: ConversationId) {
        if self.cache.remove(&conversation_id).is_some() {
            tracing::debug!(
                conversation_id = %conversation_id,
                "Participant cache invalidated"
            );
        }
    }

    /// Users sharing a fresh cached conversation with `user_id`, excluding
    /// the user themself. In-memory only; never consults the store.
    #[must_use]
    pub fn cached_peers_of(&self, user_id: UserId) -> HashSet<UserId> {
        let mut peers = HashSet::new();
        for entry in &self.cache {
            if entry.fetched_at.elapsed() >= self.ttl {
                continue;
            }
            if entry.participants.contains(&user_id) {
                peers.extend(entry.participants.iter().filter(|&&p| p != user_id));
            }
        }
        peers
    }

    /// Number of cached conversations (fresh or stale)
    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }
}

impl std::fmt::Debug for ConversationDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationDirectory")
            .field("cached", &self.cache.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use pingme_core::{MessageEnvelope, MessageId, NewMessage, StoreResult};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Store double that counts participant lookups
    struct CountingStore {
        participants: Vec<UserId>,
        lookups: AtomicUsize,
    }

    impl CountingStore {
        fn new(participants: Vec<UserId>) -> Arc<Self> {
            Arc::new(Self {
                participants,
                lookups: AtomicUsize::new(0),
            })
        }

        fn lookups(&self) -> usize {
            self.lookups.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DurableStore for CountingStore {
        async fn create_message(&self, _message: NewMessage) -> StoreResult<MessageEnvelope> {
            unreachable!("directory never persists")
        }

        async fn participants_of(
            &self,
            conversation_id: ConversationId,
        ) -> StoreResult<Vec<UserId>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            if conversation_id == ConversationId::new(404) {
                return Err(DeliveryError::ConversationNotFound(conversation_id));
            }
            Ok(self.participants.clone())
        }

        async fn set_read(&self, _message_id: MessageId, _reader_id: UserId) -> StoreResult<()> {
            Ok(())
        }

        async fn set_last_seen(&self, _user_id: UserId, _at: DateTime<Utc>) -> StoreResult<()> {
            Ok(())
        }
    }

    fn users(ids: &[i64]) -> Vec<UserId> {
        ids.iter().copied().map(UserId::new).collect()
    }

    #[tokio::test]
    async fn test_cache_hit_skips_store() {
        let store = CountingStore::new(users(&[1, 2]));
        let directory = ConversationDirectory::with_default_ttl(store.clone());
        let conv = ConversationId::new(1);

        let first = directory.participants_of(conv).await.unwrap();
        let second = directory.participants_of(conv).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.lookups(), 1);
    }

    #[tokio::test]
    async fn test_participants_are_deduplicated() {
        let store = CountingStore::new(users(&[1, 2, 2, 1]));
        let directory = ConversationDirectory::with_default_ttl(store);

        let participants = directory
            .participants_of(ConversationId::new(1))
            .await
            .unwrap();
        assert_eq!(participants.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry_reloads() {
        let store = CountingStore::new(users(&[1, 2]));
        let directory =
            ConversationDirectory::new(store.clone(), Duration::from_secs(30));
        let conv = ConversationId::new(1);

        directory.participants_of(conv).await.unwrap();
        assert_eq!(store.lookups(), 1);

        tokio::time::advance(Duration::from_secs(29)).await;
        directory.participants_of(conv).await.unwrap();
        assert_eq!(store.lookups(), 1);

        tokio::time::advance(Duration::from_secs(2)).await;
        directory.participants_of(conv).await.unwrap();
        assert_eq!(store.lookups(), 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_reload() {
        let store = CountingStore::new(users(&[1, 2]));
        let directory = ConversationDirectory::with_default_ttl(store.clone());
        let conv = ConversationId::new(1);

        directory.participants_of(conv).await.unwrap();
        directory.invalidate(conv);
        directory.participants_of(conv).await.unwrap();

        assert_eq!(store.lookups(), 2);
    }

    #[tokio::test]
    async fn test_not_found_propagates_and_is_not_cached() {
        let store = CountingStore::new(users(&[1]));
        let directory = ConversationDirectory::with_default_ttl(store.clone());

        let err = directory
            .participants_of(ConversationId::new(404))
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::ConversationNotFound(_)));
        assert_eq!(directory.cached_len(), 0);
    }

    #[tokio::test]
    async fn test_empty_membership_is_not_found() {
        let store = CountingStore::new(vec![]);
        let directory = ConversationDirectory::with_default_ttl(store);

        let err = directory
            .participants_of(ConversationId::new(1))
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::ConversationNotFound(_)));
    }

    #[tokio::test]
    async fn test_cached_peers_of() {
        let store = CountingStore::new(users(&[1, 2, 3]));
        let directory = ConversationDirectory::with_default_ttl(store);

        assert!(directory.cached_peers_of(UserId::new(1)).is_empty());

        directory
            .participants_of(ConversationId::new(1))
            .await
            .unwrap();

        let peers = directory.cached_peers_of(UserId::new(1));
        let expected: HashSet<UserId> = users(&[2, 3]).into_iter().collect();
        assert_eq!(peers, expected);

        // Not a participant anywhere
        assert!(directory.cached_peers_of(UserId::new(9)).is_empty());
    }
}
