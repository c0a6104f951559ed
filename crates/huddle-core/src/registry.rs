//! Session registry for the Huddle hub.
//!
//! Tracks which username is attached to which connection and whether that
//! user is currently online. Entries are upserted by username, so a user
//! reconnecting under the same name displaces the previous connection's
//! presence record. Entries are soft-deleted on disconnect (`online = false`)
//! and never removed, preserving a presence history.

use huddle_protocol::{ConnectionId, PresenceEntry};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

#[derive(Debug, Default)]
struct RegistryInner {
    /// Presence entries keyed by username.
    by_username: HashMap<String, PresenceEntry>,
    /// Reverse index: connection id -> username.
    ///
    /// Invariant: an entry `cid -> name` exists only while the presence
    /// entry for `name` has `connection_id == cid`. The mapping survives
    /// `mark_offline` (history lookups) but is dropped when the username
    /// re-upserts under a different connection.
    by_connection: HashMap<ConnectionId, String>,
}

/// Registry of user presence, keyed by username with a connection index.
///
/// Both indices mutate together under one lock so concurrent upserts for the
/// same username serialize (last writer wins on the connection id).
#[derive(Debug, Default)]
pub struct SessionRegistry {
    inner: RwLock<RegistryInner>,
}

impl SessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or update the presence entry for `username`.
    ///
    /// Sets `online = true` and the given connection id. Returns a snapshot
    /// of the resulting entry.
    pub fn upsert(&self, username: &str, connection_id: ConnectionId) -> PresenceEntry {
        let mut inner = self.inner.write().unwrap();
        let RegistryInner {
            by_username,
            by_connection,
        } = &mut *inner;

        let entry = by_username
            .entry(username.to_string())
            .or_insert_with(|| PresenceEntry::new(username, connection_id.clone()));

        if entry.connection_id != connection_id {
            // Reconnect under the same name: the old connection no longer
            // resolves to this user.
            by_connection.remove(&entry.connection_id);
            entry.connection_id = connection_id.clone();
        }
        entry.online = true;
        by_connection.insert(connection_id, username.to_string());

        debug!(username = %username, connection = %entry.connection_id, "Presence upserted");
        entry.clone()
    }

    /// Mark the entry owning `connection_id` offline.
    ///
    /// Returns the updated entry, or `None` if no entry currently resolves to
    /// that connection (e.g. it disconnected before joining, or the user has
    /// since reconnected elsewhere).
    pub fn mark_offline(&self, connection_id: &ConnectionId) -> Option<PresenceEntry> {
        let mut inner = self.inner.write().unwrap();
        let RegistryInner {
            by_username,
            by_connection,
        } = &mut *inner;

        let username = by_connection.get(connection_id)?;
        let entry = by_username.get_mut(username)?;
        if &entry.connection_id != connection_id {
            return None;
        }

        entry.online = false;
        debug!(username = %entry.username, connection = %connection_id, "Presence marked offline");
        Some(entry.clone())
    }

    /// Snapshot of all entries with `online = true`, in no guaranteed order.
    #[must_use]
    pub fn online_users(&self) -> Vec<PresenceEntry> {
        let inner = self.inner.read().unwrap();
        inner
            .by_username
            .values()
            .filter(|entry| entry.online)
            .cloned()
            .collect()
    }

    /// Look up the entry associated with a connection id.
    ///
    /// Offline entries remain reachable through their last connection id.
    #[must_use]
    pub fn by_connection_id(&self, connection_id: &ConnectionId) -> Option<PresenceEntry> {
        let inner = self.inner.read().unwrap();
        let username = inner.by_connection.get(connection_id)?;
        inner.by_username.get(username).cloned()
    }

    /// Number of entries, online or offline.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().unwrap().by_username.len()
    }

    /// Whether the registry has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
