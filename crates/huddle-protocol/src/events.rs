//! Event types exchanged between clients and the hub.
//!
//! Each event is serialized as a tagged map `{ "event": ..., "data": ... }`.
//! The tag strings are the wire-level event names and are load-bearing:
//! clients dispatch on them.

use crate::records::{ConnectionId, MessageRecord, PresenceEntry};
use serde::{Deserialize, Serialize};

/// An inbound event from a client connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Announce a username for this connection.
    UserJoin(String),

    /// Join a named room.
    JoinRoom(String),

    /// Leave a named room.
    LeaveRoom(String),

    /// Send a message to a room.
    ///
    /// When `room` is absent the hub falls back to the connection's current
    /// room, then to the default room.
    SendMessage {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room: Option<String>,
    },

    /// Set or clear the typing indicator for this connection.
    Typing(bool),

    /// Send a direct message to another connection.
    PrivateMessage { to: ConnectionId, message: String },
}

/// An outbound event from the hub to one or more connections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Snapshot of all online users. Broadcast to everyone.
    UserList(Vec<PresenceEntry>),

    /// A user announced themselves. Broadcast to everyone.
    UserJoined {
        username: String,
        id: ConnectionId,
    },

    /// A user disconnected. Broadcast to everyone.
    UserLeft {
        username: String,
        id: ConnectionId,
    },

    /// Room join confirmation, sent to the caller only.
    JoinedRoom(String),

    /// Room leave confirmation, sent to the caller only.
    LeftRoom(String),

    /// A room-broadcast message.
    ReceiveMessage(MessageRecord),

    /// A direct message, delivered to the target and echoed to the sender.
    PrivateMessage(MessageRecord),

    /// Snapshot of connections currently typing. Broadcast to everyone.
    TypingUsers(Vec<ConnectionId>),
}

impl ClientEvent {
    /// The wire-level event name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::UserJoin(_) => "user_join",
            ClientEvent::JoinRoom(_) => "join_room",
            ClientEvent::LeaveRoom(_) => "leave_room",
            ClientEvent::SendMessage { .. } => "send_message",
            ClientEvent::Typing(_) => "typing",
            ClientEvent::PrivateMessage { .. } => "private_message",
        }
    }
}

impl ServerEvent {
    /// The wire-level event name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::UserList(_) => "user_list",
            ServerEvent::UserJoined { .. } => "user_joined",
            ServerEvent::UserLeft { .. } => "user_left",
            ServerEvent::JoinedRoom(_) => "joined_room",
            ServerEvent::LeftRoom(_) => "left_room",
            ServerEvent::ReceiveMessage(_) => "receive_message",
            ServerEvent::PrivateMessage(_) => "private_message",
            ServerEvent::TypingUsers(_) => "typing_users",
        }
    }
}
