//! Typing indicator tracking.
//!
//! The typing set is global, not per-room, matching the event contract: a
//! `typing` event from any connection updates one shared set that is
//! broadcast to everyone. Fully derived state, nothing persisted.

use dashmap::DashSet;
use huddle_protocol::ConnectionId;

/// Set of connections currently marked as typing.
#[derive(Debug, Default)]
pub struct TypingTracker {
    typists: DashSet<ConnectionId>,
}

impl TypingTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark or unmark a connection as typing.
    pub fn set_typing(&self, connection_id: &ConnectionId, is_typing: bool) {
        if is_typing {
            self.typists.insert(connection_id.clone());
        } else {
            self.typists.remove(connection_id);
        }
    }

    /// Snapshot of the connections currently typing.
    #[must_use]
    pub fn current_typists(&self) -> Vec<ConnectionId> {
        self.typists.iter().map(|id| id.key().clone()).collect()
    }

    /// Whether a connection is marked as typing.
    #[must_use]
    pub fn is_typing(&self, connection_id: &ConnectionId) -> bool {
        self.typists.contains(connection_id)
    }
}
