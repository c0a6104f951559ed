//! Room directory for the Huddle hub.
//!
//! Rooms are named broadcast groups; membership is a set of connection ids.
//! Rooms are created implicitly on first join and never deleted — an empty
//! room simply has an empty member set. This avoids a delete-race between
//! "last member leaves" and "new member joins" at the cost of slow memory
//! growth for churny room names, which is acceptable at the target scale.

use dashmap::DashMap;
use huddle_protocol::ConnectionId;
use std::collections::HashSet;
use tracing::debug;

/// Maximum room name length.
pub const MAX_ROOM_NAME_LENGTH: usize = 256;

/// Validate a room name.
///
/// # Errors
///
/// Returns an error message if the room name is invalid.
pub fn validate_room_name(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("Room name cannot be empty");
    }
    if name.len() > MAX_ROOM_NAME_LENGTH {
        return Err("Room name too long");
    }
    if !name.chars().all(|c| c.is_ascii() && !c.is_ascii_control()) {
        return Err("Room name contains invalid characters");
    }
    Ok(())
}

/// Directory mapping room names to their member connection sets.
#[derive(Debug, Default)]
pub struct RoomDirectory {
    rooms: DashMap<String, HashSet<ConnectionId>>,
}

impl RoomDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to a room, creating the room on first join.
    ///
    /// Idempotent: joining a room twice is a no-op on the member set.
    pub fn join(&self, room: &str, connection_id: ConnectionId) {
        let mut members = self.rooms.entry(room.to_string()).or_default();
        if members.insert(connection_id.clone()) {
            debug!(room = %room, connection = %connection_id, members = members.len(), "Joined room");
        }
    }

    /// Remove a connection from a room. No-op if absent.
    pub fn leave(&self, room: &str, connection_id: &ConnectionId) {
        if let Some(mut members) = self.rooms.get_mut(room) {
            if members.remove(connection_id) {
                debug!(room = %room, connection = %connection_id, members = members.len(), "Left room");
            }
        }
    }

    /// Snapshot of a room's member set at call time.
    ///
    /// An unknown room yields an empty set, never an error.
    #[must_use]
    pub fn members(&self, room: &str) -> Vec<ConnectionId> {
        self.rooms
            .get(room)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether a connection is currently a member of a room.
    #[must_use]
    pub fn is_member(&self, room: &str, connection_id: &ConnectionId) -> bool {
        self.rooms
            .get(room)
            .map(|members| members.contains(connection_id))
            .unwrap_or(false)
    }

    /// Number of members in a room.
    #[must_use]
    pub fn member_count(&self, room: &str) -> usize {
        self.rooms.get(room).map(|members| members.len()).unwrap_or(0)
    }

    /// Number of rooms ever created.
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// All known room names.
    #[must_use]
    pub fn room_names(&self) -> Vec<String> {
        self.rooms.iter().map(|entry| entry.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_creates_room() {
        let rooms = RoomDirectory::new();
        rooms.join("general", "c1".into());

        assert_eq!(rooms.room_count(), 1);
        assert!(rooms.is_member("general", &"c1".into()));
        assert_eq!(rooms.members("general"), vec!["c1".into()]);
    }

    #[test]
    fn test_join_idempotent() {
        let rooms = RoomDirectory::new();
        rooms.join("general", "c1".into());
        rooms.join("general", "c1".into());

        assert_eq!(rooms.member_count("general"), 1);
    }

    #[test]
    fn test_leave_and_leave_again() {
        let rooms = RoomDirectory::new();
        rooms.join("general", "c1".into());
        rooms.join("general", "c2".into());

        rooms.leave("general", &"c1".into());
        assert_eq!(rooms.member_count("general"), 1);

        // Second leave is a no-op, not an error.
        rooms.leave("general", &"c1".into());
        assert_eq!(rooms.member_count("general"), 1);
    }

    #[test]
    fn test_empty_room_is_retained() {
        let rooms = RoomDirectory::new();
        rooms.join("general", "c1".into());
        rooms.leave("general", &"c1".into());

        // Rooms are never deleted.
        assert_eq!(rooms.room_count(), 1);
        assert!(rooms.members("general").is_empty());
    }

    #[test]
    fn test_unknown_room_is_empty() {
        let rooms = RoomDirectory::new();
        assert!(rooms.members("nowhere").is_empty());
        assert_eq!(rooms.member_count("nowhere"), 0);
        rooms.leave("nowhere", &"c1".into());
    }

    #[test]
    fn test_room_name_validation() {
        assert!(validate_room_name("general").is_ok());
        assert!(validate_room_name("dev:rust").is_ok());
        assert!(validate_room_name("").is_err());
        assert!(validate_room_name("bad\nname").is_err());

        let long_name = "a".repeat(MAX_ROOM_NAME_LENGTH + 1);
        assert!(validate_room_name(&long_name).is_err());
    }
}
