//! Shared payload types for the Huddle wire contract.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Atomic counter disambiguating ids generated within the same instant.
static CONNECTION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique identifier for a connection.
///
/// Issued by the transport layer when a socket is accepted and never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub String);

impl ConnectionId {
    /// Create a new connection ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh connection ID.
    ///
    /// Combines a timestamp with an atomic counter so concurrent accepts
    /// never collide.
    #[must_use]
    pub fn generate() -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let counter = CONNECTION_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self(format!("conn_{timestamp:x}_{counter:x}"))
    }

    /// Get the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ConnectionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Current Unix time in milliseconds.
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64
}

/// A username's online/offline state and current connection.
///
/// At most one entry per username is online at a given instant; entries are
/// soft-deleted (`online = false`) on disconnect, never removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceEntry {
    /// Username as supplied on join.
    pub username: String,
    /// Connection currently (or last) associated with the username.
    pub connection_id: ConnectionId,
    /// Whether the user is currently connected.
    pub online: bool,
}

impl PresenceEntry {
    /// Create a new online presence entry.
    #[must_use]
    pub fn new(username: impl Into<String>, connection_id: ConnectionId) -> Self {
        Self {
            username: username.into(),
            connection_id,
            online: true,
        }
    }
}

/// A chat message, immutable once created.
///
/// Exactly one of `room` / `to` is meaningful depending on `is_private`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Sender username, resolved server-side (never client-supplied).
    pub sender: String,
    /// Sender's connection at send time.
    pub sender_id: ConnectionId,
    /// Message body.
    pub message: String,
    /// Server-assigned creation time, Unix milliseconds.
    pub timestamp: u64,
    /// Whether this is a direct message.
    pub is_private: bool,
    /// Target room for broadcast messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    /// Target connection for private messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<ConnectionId>,
}

impl MessageRecord {
    /// Create a room-broadcast message record, timestamped now.
    #[must_use]
    pub fn room_message(
        sender: impl Into<String>,
        sender_id: ConnectionId,
        message: impl Into<String>,
        room: impl Into<String>,
    ) -> Self {
        Self {
            sender: sender.into(),
            sender_id,
            message: message.into(),
            timestamp: now_millis(),
            is_private: false,
            room: Some(room.into()),
            to: None,
        }
    }

    /// Create a private message record, timestamped now.
    #[must_use]
    pub fn private_message(
        sender: impl Into<String>,
        sender_id: ConnectionId,
        message: impl Into<String>,
        to: ConnectionId,
    ) -> Self {
        Self {
            sender: sender.into(),
            sender_id,
            message: message.into(),
            timestamp: now_millis(),
            is_private: true,
            room: None,
            to: Some(to),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_generation() {
        let id1 = ConnectionId::generate();
        let id2 = ConnectionId::generate();
        assert_ne!(id1, id2);
        assert!(id1.as_str().starts_with("conn_"));
    }

    #[test]
    fn test_connection_ids_unique_under_contention() {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                std::thread::spawn(|| {
                    (0..1000)
                        .map(|_| ConnectionId::generate())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = std::collections::HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate connection id generated");
            }
        }
    }

    #[test]
    fn test_connection_id_from_string() {
        let id: ConnectionId = "test-id".into();
        assert_eq!(id.as_str(), "test-id");
    }

    #[test]
    fn test_room_message_record() {
        let record = MessageRecord::room_message("alice", "c1".into(), "hi", "general");
        assert!(!record.is_private);
        assert_eq!(record.room.as_deref(), Some("general"));
        assert!(record.to.is_none());
        assert!(record.timestamp > 0);
    }

    #[test]
    fn test_private_message_record() {
        let record = MessageRecord::private_message("alice", "c1".into(), "psst", "c2".into());
        assert!(record.is_private);
        assert!(record.room.is_none());
        assert_eq!(record.to, Some("c2".into()));
    }
}
