//! Presence tracking
//!
//! Derives online/offline state from connection registry edge transitions,
//! broadcasts presence updates to interested users, and persists last-seen
//! timestamps best-effort. All tracker state is in-memory; the only I/O is
//! the detached last-seen write, which never blocks the connection close
//! path.

use crate::connection::{ConnectionRegistry, RegistryEvent};
use crate::directory::ConversationDirectory;
use crate::protocol::ServerEvent;
use chrono::Utc;
use parking_lot::RwLock;
use pingme_core::{DurableStore, PresenceRecord, UserId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Tracks per-user presence derived from registry transitions.
pub struct PresenceTracker {
    records: RwLock<HashMap<UserId, PresenceRecord>>,
    registry: Arc<ConnectionRegistry>,
    directory: Arc<ConversationDirectory>,
    store: Arc<dyn DurableStore>,
}

impl PresenceTracker {
    /// Create a new tracker
    #[must_use]
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        directory: Arc<ConversationDirectory>,
        store: Arc<dyn DurableStore>,
    ) -> Arc<Self> {
        Arc::new(Self {
            records: RwLock::new(HashMap::new()),
            registry,
            directory,
            store,
        })
    }

    /// Spawn the task consuming registry edge events.
    ///
    /// The subscription is taken before the task starts, so transitions
    /// occurring right after this call are not missed.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let tracker = Arc::clone(self);
        let mut events = tracker.registry.subscribe();

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(RegistryEvent::Online(user_id)) => tracker.handle_online(user_id),
                    Ok(RegistryEvent::Offline(user_id)) => tracker.handle_offline(user_id),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "Presence tracker lagged behind registry");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            tracing::debug!("Presence tracker loop ended");
        })
    }

    /// Current presence of a user; offline-with-no-history if never observed
    #[must_use]
    pub fn snapshot(&self, user_id: UserId) -> PresenceRecord {
        self.records
            .read()
            .get(&user_id)
            .cloned()
            .unwrap_or_else(|| PresenceRecord::unknown(user_id))
    }

    /// Check if a user is currently marked online
    #[must_use]
    pub fn is_online(&self, user_id: UserId) -> bool {
        self.records
            .read()
            .get(&user_id)
            .is_some_and(|r| r.is_online)
    }

    /// Apply an online edge: mark the record and notify interested users
    pub fn handle_online(&self, user_id: UserId) {
        let record = PresenceRecord::online(user_id);
        self.records.write().insert(user_id, record.clone());

        tracing::debug!(user_id = %user_id, "User presence set to online");
        self.broadcast_presence(&record);
    }

    /// Apply an offline edge: stamp last-seen, persist it best-effort, and
    /// notify interested users
    pub fn handle_offline(&self, user_id: UserId) {
        let now = Utc::now();
        let record = PresenceRecord::offline(user_id, now);
        self.records.write().insert(user_id, record.clone());

        tracing::debug!(user_id = %user_id, "User presence set to offline");

        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            if let Err(error) = store.set_last_seen(user_id, now).await {
                tracing::warn!(
                    user_id = %user_id,
                    error = %error,
                    "Failed to persist last-seen timestamp"
                );
            }
        });

        self.broadcast_presence(&record);
    }

    /// Push a presence update to every live handle of every user sharing a
    /// fresh cached conversation with the subject. Best-effort per handle.
    fn broadcast_presence(&self, record: &PresenceRecord) {
        let interested = self.directory.cached_peers_of(record.user_id);
        if interested.is_empty() {
            return;
        }

        let event = ServerEvent::presence(record.clone());
        let mut sent = 0usize;

        for peer in interested {
            for handle in self.registry.handles_for(peer) {
                match handle.try_push(event.clone()) {
                    Ok(()) => sent += 1,
                    Err(error) => {
                        tracing::trace!(
                            peer = %peer,
                            connection_id = %handle.id(),
                            error = %error,
                            "Presence push skipped"
                        );
                    }
                }
            }
        }

        tracing::trace!(
            user_id = %record.user_id,
            is_online = record.is_online,
            sent,
            "Presence update broadcast"
        );
    }
}

impl std::fmt::Debug for PresenceTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceTracker")
            .field("records", &self.records.read().len())
            .finish()
    }
}
