//! Message envelope - the unit exchanged between clients and the store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ConversationId, MessageId, UserId};

/// Kind of an attached media object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    Video,
    Audio,
    File,
}

/// Reference to an attachment stored outside the delivery core
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    /// Location of the stored blob
    pub url: String,
    /// Media kind
    pub kind: AttachmentKind,
}

impl AttachmentRef {
    /// Create a new attachment reference
    #[must_use]
    pub fn new(url: impl Into<String>, kind: AttachmentKind) -> Self {
        Self {
            url: url.into(),
            kind,
        }
    }
}

/// A message as submitted by a sender, before the store has assigned an
/// identifier and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub content: String,
    pub attachment: Option<AttachmentRef>,
    /// Client-supplied token for idempotent resends
    pub nonce: Option<String>,
}

impl NewMessage {
    /// Create a plain text message
    #[must_use]
    pub fn text(
        conversation_id: ConversationId,
        sender_id: UserId,
        content: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id,
            sender_id,
            content: content.into(),
            attachment: None,
            nonce: None,
        }
    }

    /// Attach a media reference
    #[must_use]
    pub fn with_attachment(mut self, attachment: AttachmentRef) -> Self {
        self.attachment = Some(attachment);
        self
    }

    /// Set the idempotency nonce
    #[must_use]
    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    /// A message must carry text or an attachment
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty() && self.attachment.is_none()
    }
}

/// The canonical persisted message.
///
/// Immutable once persisted except for `is_read`, which only read-receipt
/// events from a non-sender participant may flip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<AttachmentRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// Assigned by the store at persist time
    pub timestamp: DateTime<Utc>,
    pub is_read: bool,
}

impl MessageEnvelope {
    /// Check if the envelope carries an attachment
    #[inline]
    #[must_use]
    pub fn has_attachment(&self) -> bool {
        self.attachment.is_some()
    }

    /// Get a truncated preview of the content (for logs and notifications)
    #[must_use]
    pub fn preview(&self, max_len: usize) -> &str {
        if self.content.len() <= max_len {
            &self.content
        } else {
            let mut end = max_len;
            while !self.content.is_char_boundary(end) && end > 0 {
                end -= 1;
            }
            &self.content[..end]
        }
    }
}
