//! Presence record - online flag plus last-seen timestamp

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::UserId;

/// A user's presence as derived from connection lifecycle.
///
/// `is_online` holds exactly when the connection registry has at least one
/// live handle for the user; `last_seen` is stamped on the online-to-offline
/// edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceRecord {
    pub user_id: UserId,
    pub is_online: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
}

impl PresenceRecord {
    /// Record for a user that has never been observed online
    #[must_use]
    pub fn unknown(user_id: UserId) -> Self {
        Self {
            user_id,
            is_online: false,
            last_seen: None,
        }
    }

    /// Record for a user that just came online
    #[must_use]
    pub fn online(user_id: UserId) -> Self {
        Self {
            user_id,
            is_online: true,
            last_seen: None,
        }
    }

    /// Record for a user that just went offline at `at`
    #[must_use]
    pub fn offline(user_id: UserId, at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            is_online: false,
            last_seen: Some(at),
        }
    }
}
