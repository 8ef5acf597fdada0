//! Individual connection handle
//!
//! Represents one live transport-level session. The handle owns the
//! write-only side of the connection: a bounded channel drained by a single
//! writer task, so pushes from many concurrent fan-out operations never
//! interleave on the outbound stream.

use crate::protocol::ServerEvent;
use parking_lot::RwLock;
use pingme_core::{DeliveryError, UserId};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Transport accepted, no identity yet
    Connecting,
    /// Token verified, not yet registered
    Authenticated,
    /// Registered; accepting inbound events and outbound pushes
    Open,
    /// Terminal; no event is processed after entering this state
    Closed,
}

/// A single live connection.
///
/// Owned by its session task; the registry only holds references for the
/// duration of the connection and never closes a handle itself.
pub struct ConnectionHandle {
    /// Unique connection ID
    id: Uuid,

    /// The authenticated owner, fixed at handshake
    user_id: UserId,

    /// Single-writer outbound queue
    sender: mpsc::Sender<ServerEvent>,

    /// Current lifecycle state
    state: RwLock<ConnectionState>,

    /// Connection creation time
    opened_at: Instant,
}

impl ConnectionHandle {
    /// Create a new handle for an authenticated user
    pub fn new(user_id: UserId, sender: mpsc::Sender<ServerEvent>) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            user_id,
            sender,
            state: RwLock::new(ConnectionState::Authenticated),
            opened_at: Instant::now(),
        })
    }

    /// Get the connection ID
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Get the owning user
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Get the current state
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Set the lifecycle state
    pub fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
    }

    /// Check if the connection can no longer deliver events
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self.state(), ConnectionState::Closed) || self.sender.is_closed()
    }

    /// Get connection age
    #[must_use]
    pub fn age(&self) -> std::time::Duration {
        self.opened_at.elapsed()
    }

    /// Push an event onto this connection's outbound queue.
    ///
    /// # Errors
    /// Returns `DeliveryError::ConnectionClosed` once the connection has
    /// entered its terminal state or the writer task has gone away.
    pub async fn push(&self, event: ServerEvent) -> Result<(), DeliveryError> {
        if self.is_closed() {
            return Err(DeliveryError::ConnectionClosed);
        }
        self.sender
            .send(event)
            .await
            .map_err(|_| DeliveryError::ConnectionClosed)
    }

    /// Try to push without waiting for queue capacity (non-blocking)
    pub fn try_push(
        &self,
        event: ServerEvent,
    ) -> Result<(), mpsc::error::TrySendError<ServerEvent>> {
        if matches!(self.state(), ConnectionState::Closed) {
            return Err(mpsc::error::TrySendError::Closed(event));
        }
        self.sender.try_send(event)
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_handle_creation() {
        let (tx, _rx) = mpsc::channel(10);
        let handle = ConnectionHandle::new(UserId::new(1), tx);

        assert_eq!(handle.user_id(), UserId::new(1));
        assert_eq!(handle.state(), ConnectionState::Authenticated);
        assert!(!handle.is_closed());
    }

    #[tokio::test]
    async fn test_push_delivers_to_queue() {
        let (tx, mut rx) = mpsc::channel(10);
        let handle = ConnectionHandle::new(UserId::new(1), tx);
        handle.set_state(ConnectionState::Open);

        let err = pingme_core::DeliveryError::ConnectionClosed;
        handle.push(ServerEvent::error(&err)).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.kind(), "error");
    }

    #[tokio::test]
    async fn test_push_after_close_fails() {
        let (tx, _rx) = mpsc::channel(10);
        let handle = ConnectionHandle::new(UserId::new(1), tx);
        handle.set_state(ConnectionState::Closed);

        let err = pingme_core::DeliveryError::ConnectionClosed;
        let result = handle.push(ServerEvent::error(&err)).await;
        assert!(matches!(result, Err(DeliveryError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_push_after_receiver_dropped_fails() {
        let (tx, rx) = mpsc::channel(10);
        let handle = ConnectionHandle::new(UserId::new(1), tx);
        handle.set_state(ConnectionState::Open);
        drop(rx);

        assert!(handle.is_closed());
        let err = pingme_core::DeliveryError::ConnectionClosed;
        let result = handle.push(ServerEvent::error(&err)).await;
        assert!(matches!(result, Err(DeliveryError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_handles_have_unique_ids() {
        let (tx1, _rx1) = mpsc::channel(1);
        let (tx2, _rx2) = mpsc::channel(1);

        let h1 = ConnectionHandle::new(UserId::new(1), tx1);
        let h2 = ConnectionHandle::new(UserId::new(1), tx2);
        assert_ne!(h1.id(), h2.id());
    }
}
