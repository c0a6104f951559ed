//! The persistence collaborator interface and its in-memory implementation.
//!
//! Durable message storage is external to the hub: the router hands a
//! [`MessageRecord`] to a [`MessageStore`] and moves on. A save failure is
//! surfaced to logging but never suppresses live delivery, so a gap between
//! "delivered live" and "in history" is an accepted inconsistency.

use async_trait::async_trait;
use huddle_protocol::MessageRecord;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// A unique durable message identifier.
pub type MessageId = u64;

/// Atomic counter for ensuring unique IDs even within the same nanosecond.
static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a unique message ID.
#[must_use]
pub fn generate_message_id() -> MessageId {
    // Combine timestamp with atomic counter for guaranteed uniqueness
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos() as u64;
    let counter = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    timestamp.wrapping_add(counter)
}

/// Persistence errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store rejected or could not complete the operation.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// I/O error from the backing store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Durable message storage, consumed by the router and the read-model routes.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Append a message record, returning its durable id.
    async fn save(&self, record: &MessageRecord) -> Result<MessageId, StoreError>;

    /// All public (non-private) messages, ordered by timestamp ascending.
    async fn public_history(&self) -> Result<Vec<MessageRecord>, StoreError>;

    /// Public messages for one room, ordered by timestamp ascending.
    async fn room_history(&self, room: &str) -> Result<Vec<MessageRecord>, StoreError>;

    /// Private messages exchanged between two users, ordered by timestamp
    /// ascending.
    ///
    /// A record matches when one argument is its sender and the other is its
    /// target; the target field may hold either a username or a connection
    /// id, and both are honored.
    async fn private_history(
        &self,
        user_a: &str,
        user_b: &str,
    ) -> Result<Vec<MessageRecord>, StoreError>;
}

/// In-memory [`MessageStore`], suitable for single-process deployments and
/// tests. Messages live for the process lifetime.
#[derive(Debug, Default)]
pub struct MemoryStore {
    messages: RwLock<Vec<(MessageId, MessageRecord)>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.read().unwrap().len()
    }

    /// Whether the store holds no messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn collect_sorted(&self, filter: impl Fn(&MessageRecord) -> bool) -> Vec<MessageRecord> {
        let messages = self.messages.read().unwrap();
        let mut matched: Vec<MessageRecord> = messages
            .iter()
            .filter(|(_, record)| filter(record))
            .map(|(_, record)| record.clone())
            .collect();
        matched.sort_by_key(|record| record.timestamp);
        matched
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn save(&self, record: &MessageRecord) -> Result<MessageId, StoreError> {
        let id = generate_message_id();
        self.messages.write().unwrap().push((id, record.clone()));
        Ok(id)
    }

    async fn public_history(&self) -> Result<Vec<MessageRecord>, StoreError> {
        Ok(self.collect_sorted(|record| !record.is_private))
    }

    async fn room_history(&self, room: &str) -> Result<Vec<MessageRecord>, StoreError> {
        Ok(self.collect_sorted(|record| !record.is_private && record.room.as_deref() == Some(room)))
    }

    async fn private_history(
        &self,
        user_a: &str,
        user_b: &str,
    ) -> Result<Vec<MessageRecord>, StoreError> {
        let exchange = |record: &MessageRecord, from: &str, to: &str| {
            record.sender == from && record.to.as_ref().map(|t| t.as_str()) == Some(to)
        };
        Ok(self.collect_sorted(|record| {
            record.is_private
                && (exchange(record, user_a, user_b) || exchange(record, user_b, user_a))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_protocol::MessageRecord;

    fn room_msg(sender: &str, room: &str, body: &str) -> MessageRecord {
        MessageRecord::room_message(sender, format!("{sender}-conn").into(), body, room)
    }

    #[test]
    fn test_unique_message_ids() {
        let id1 = generate_message_id();
        let id2 = generate_message_id();
        assert_ne!(id1, id2);
    }

    #[tokio::test]
    async fn test_save_and_room_history() {
        let store = MemoryStore::new();
        store.save(&room_msg("alice", "general", "one")).await.unwrap();
        store.save(&room_msg("bob", "general", "two")).await.unwrap();
        store.save(&room_msg("alice", "dev", "three")).await.unwrap();

        let history = store.room_history("general").await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

        assert_eq!(store.public_history().await.unwrap().len(), 3);
        assert!(store.room_history("nowhere").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_private_history_excludes_rooms() {
        let store = MemoryStore::new();
        store.save(&room_msg("alice", "general", "public")).await.unwrap();
        store
            .save(&MessageRecord::private_message(
                "alice",
                "c1".into(),
                "psst",
                "bob".into(),
            ))
            .await
            .unwrap();
        store
            .save(&MessageRecord::private_message(
                "bob",
                "c2".into(),
                "reply",
                "alice".into(),
            ))
            .await
            .unwrap();

        let history = store.private_history("alice", "bob").await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|record| record.is_private));

        // Symmetric in its arguments.
        let reversed = store.private_history("bob", "alice").await.unwrap();
        assert_eq!(reversed.len(), 2);

        // A third party sees nothing.
        assert!(store.private_history("alice", "eve").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_private_history_matches_strict_pairs() {
        let store = MemoryStore::new();
        store
            .save(&MessageRecord::private_message(
                "alice",
                "c1".into(),
                "psst",
                "bob".into(),
            ))
            .await
            .unwrap();
        store
            .save(&MessageRecord::private_message(
                "alice",
                "c1".into(),
                "hey",
                "carol".into(),
            ))
            .await
            .unwrap();

        // Each pair sees only its own exchange, never everything alice sent.
        assert_eq!(store.private_history("alice", "bob").await.unwrap().len(), 1);
        assert_eq!(store.private_history("alice", "carol").await.unwrap().len(), 1);
        assert_eq!(store.private_history("alice", "alice").await.unwrap().len(), 0);

        // Naming one participant twice must not match a cross-pair record.
        assert!(store.private_history("bob", "bob").await.unwrap().is_empty());

        // A self-addressed message is the only thing a doubled query returns.
        store
            .save(&MessageRecord::private_message(
                "bob",
                "c2".into(),
                "note to self",
                "bob".into(),
            ))
            .await
            .unwrap();
        assert_eq!(store.private_history("bob", "bob").await.unwrap().len(), 1);
    }
}
