//! Connection registry
//!
//! Maps users to their live connections using DashMap for concurrent access.
//! Source of truth for "is this user reachable right now". Presence
//! transitions are edge-triggered on the 0↔1 handle-count boundary and
//! published on a broadcast channel.

use super::ConnectionHandle;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use pingme_core::UserId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Buffer for registry edge-transition events
const EVENT_BUFFER_SIZE: usize = 1024;

/// Edge transition of a user's reachability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryEvent {
    /// First handle registered for the user
    Online(UserId),
    /// Last handle removed for the user
    Offline(UserId),
}

/// Registry of all live connections, indexed by owning user.
///
/// Register/unregister on disjoint users never block each other; per-user
/// operations serialize on the user's map entry, which is what makes the
/// edge detection race-free.
pub struct ConnectionRegistry {
    /// Live handles per user
    connections: DashMap<UserId, HashMap<Uuid, Arc<ConnectionHandle>>>,

    /// Edge-transition events for presence tracking
    events: broadcast::Sender<RegistryEvent>,
}

impl ConnectionRegistry {
    /// Create a new registry
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER_SIZE);
        Self {
            connections: DashMap::new(),
            events,
        }
    }

    /// Create a new registry wrapped in Arc
    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Subscribe to edge-transition events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    /// Register a handle under its owning user.
    ///
    /// Multiple simultaneous handles per user are permitted (multi-device);
    /// re-registering the same handle is a no-op.
    pub fn register(&self, handle: Arc<ConnectionHandle>) {
        let user_id = handle.user_id();
        let connection_id = handle.id();

        let went_online = {
            let mut handles = self.connections.entry(user_id).or_default();
            let was_offline = handles.is_empty();
            handles.insert(connection_id, handle);
            was_offline
        };

        tracing::debug!(
            connection_id = %connection_id,
            user_id = %user_id,
            "Connection registered"
        );

        if went_online {
            let _ = self.events.send(RegistryEvent::Online(user_id));
        }
    }

    /// Remove a handle; no-op if absent.
    ///
    /// If this was the user's last handle, an offline event is emitted.
    pub fn unregister(&self, handle: &ConnectionHandle) {
        let user_id = handle.user_id();
        let connection_id = handle.id();

        let went_offline = match self.connections.entry(user_id) {
            Entry::Occupied(mut occupied) => {
                let removed = occupied.get_mut().remove(&connection_id).is_some();
                if removed && occupied.get().is_empty() {
                    occupied.remove();
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(_) => false,
        };

        tracing::debug!(
            connection_id = %connection_id,
            user_id = %user_id,
            "Connection unregistered"
        );

        if went_offline {
            let _ = self.events.send(RegistryEvent::Offline(user_id));
        }
    }

    /// Snapshot of the user's live handles at call time (may be empty)
    #[must_use]
    pub fn handles_for(&self, user_id: UserId) -> Vec<Arc<ConnectionHandle>> {
        self.connections
            .get(&user_id)
            .map(|handles| handles.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Check if the user has at least one live handle
    #[must_use]
    pub fn is_online(&self, user_id: UserId) -> bool {
        self.connections
            .get(&user_id)
            .is_some_and(|handles| !handles.is_empty())
    }

    /// Total number of live connections
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.iter().map(|entry| entry.value().len()).sum()
    }

    /// Number of distinct reachable users
    #[must_use]
    pub fn user_count(&self) -> usize {
        self.connections.len()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("users", &self.connections.len())
            .finish()
    }
}
