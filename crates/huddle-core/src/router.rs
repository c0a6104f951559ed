//! The message router: the hub's control core.
//!
//! The router receives inbound events from the transport layer, validates
//! and enriches them, mutates the injected registries, and fans outbound
//! events out through the [`Outbound`] port. All collaborators are injected
//! at construction so tests can run against fresh state and capturing
//! doubles.
//!
//! Ordering: for a single event, state mutation happens first, then the
//! broadcast target set is resolved from live state, then persistence is
//! awaited, then delivery runs against the already-resolved snapshot. A slow
//! or failing store therefore never changes who receives a message and never
//! suppresses live delivery.

use crate::outbound::Outbound;
use crate::registry::SessionRegistry;
use crate::rooms::{validate_room_name, RoomDirectory};
use crate::store::MessageStore;
use crate::typing::TypingTracker;
use dashmap::DashMap;
use huddle_protocol::{ClientEvent, ConnectionId, MessageRecord, ServerEvent};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};

/// Sender name used when a connection sends before announcing a username.
pub const ANONYMOUS_SENDER: &str = "Anonymous";

/// Router errors. None of these are fatal to the hub; the offending event is
/// dropped and the connection stays open.
#[derive(Debug, Error)]
pub enum RouterError {
    /// Message body was empty or whitespace.
    #[error("Empty message body")]
    EmptyMessage,

    /// Room name failed validation.
    #[error("Invalid room name: {0}")]
    InvalidRoom(&'static str),

    /// Username failed validation.
    #[error("Invalid username: {0}")]
    InvalidUsername(&'static str),
}

/// Router configuration.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Room used when a message names no room and the sender never joined one.
    pub default_room: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            default_room: "general".to_string(),
        }
    }
}

/// The central message router.
///
/// Holds the hub's shared state and routes every inbound event to the
/// correct set of recipients.
pub struct MessageRouter {
    registry: Arc<SessionRegistry>,
    rooms: Arc<RoomDirectory>,
    typing: Arc<TypingTracker>,
    store: Arc<dyn MessageStore>,
    outbound: Arc<dyn Outbound>,
    /// Router-local bookkeeping: the room used for default message targeting.
    /// Deliberately independent of actual `RoomDirectory` membership.
    current_rooms: DashMap<ConnectionId, String>,
    config: RouterConfig,
}

impl MessageRouter {
    /// Create a router with default configuration.
    #[must_use]
    pub fn new(
        registry: Arc<SessionRegistry>,
        rooms: Arc<RoomDirectory>,
        typing: Arc<TypingTracker>,
        store: Arc<dyn MessageStore>,
        outbound: Arc<dyn Outbound>,
    ) -> Self {
        Self::with_config(registry, rooms, typing, store, outbound, RouterConfig::default())
    }

    /// Create a router with custom configuration.
    #[must_use]
    pub fn with_config(
        registry: Arc<SessionRegistry>,
        rooms: Arc<RoomDirectory>,
        typing: Arc<TypingTracker>,
        store: Arc<dyn MessageStore>,
        outbound: Arc<dyn Outbound>,
        config: RouterConfig,
    ) -> Self {
        info!(default_room = %config.default_room, "Creating message router");
        Self {
            registry,
            rooms,
            typing,
            store,
            outbound,
            current_rooms: DashMap::new(),
            config,
        }
    }

    /// A new connection was accepted by the transport.
    pub fn handle_connect(&self, connection_id: &ConnectionId) {
        debug!(connection = %connection_id, "Connection opened");
    }

    /// Process one inbound event from a connection.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed payloads; the event is dropped and
    /// nothing is broadcast. Never fatal.
    pub async fn handle_event(
        &self,
        connection_id: &ConnectionId,
        event: ClientEvent,
    ) -> Result<(), RouterError> {
        match event {
            ClientEvent::UserJoin(username) => self.user_join(connection_id, username).await,
            ClientEvent::JoinRoom(room) => self.join_room(connection_id, room).await,
            ClientEvent::LeaveRoom(room) => self.leave_room(connection_id, room).await,
            ClientEvent::SendMessage { message, room } => {
                self.send_message(connection_id, message, room).await
            }
            ClientEvent::Typing(is_typing) => self.set_typing(connection_id, is_typing).await,
            ClientEvent::PrivateMessage { to, message } => {
                self.private_message(connection_id, to, message).await
            }
        }
    }

    /// A connection closed. Idempotent: safe for connections that never
    /// joined anything.
    pub async fn handle_disconnect(&self, connection_id: &ConnectionId) {
        self.current_rooms.remove(connection_id);

        if let Some(entry) = self.registry.mark_offline(connection_id) {
            info!(username = %entry.username, connection = %connection_id, "User left the chat");
            self.outbound
                .send_to_all(ServerEvent::UserLeft {
                    username: entry.username,
                    id: connection_id.clone(),
                })
                .await;
        }

        self.outbound
            .send_to_all(ServerEvent::UserList(self.registry.online_users()))
            .await;
        self.outbound
            .send_to_all(ServerEvent::TypingUsers(self.typing.current_typists()))
            .await;
    }

    async fn user_join(
        &self,
        connection_id: &ConnectionId,
        username: String,
    ) -> Result<(), RouterError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(RouterError::InvalidUsername("Username cannot be empty"));
        }

        self.registry.upsert(username, connection_id.clone());
        info!(username = %username, connection = %connection_id, "User joined the chat");

        self.outbound
            .send_to_all(ServerEvent::UserList(self.registry.online_users()))
            .await;
        self.outbound
            .send_to_all(ServerEvent::UserJoined {
                username: username.to_string(),
                id: connection_id.clone(),
            })
            .await;
        Ok(())
    }

    async fn join_room(
        &self,
        connection_id: &ConnectionId,
        room: String,
    ) -> Result<(), RouterError> {
        validate_room_name(&room).map_err(RouterError::InvalidRoom)?;

        self.rooms.join(&room, connection_id.clone());
        self.current_rooms.insert(connection_id.clone(), room.clone());

        // Confirmation goes to the caller only, and is re-emitted even for a
        // duplicate join.
        self.outbound
            .send_to(connection_id, ServerEvent::JoinedRoom(room))
            .await;
        Ok(())
    }

    async fn leave_room(
        &self,
        connection_id: &ConnectionId,
        room: String,
    ) -> Result<(), RouterError> {
        validate_room_name(&room).map_err(RouterError::InvalidRoom)?;

        self.rooms.leave(&room, connection_id);
        // Only clear the default target if it still points at this room.
        self.current_rooms
            .remove_if(connection_id, |_, current| current == &room);

        self.outbound
            .send_to(connection_id, ServerEvent::LeftRoom(room))
            .await;
        Ok(())
    }

    async fn send_message(
        &self,
        connection_id: &ConnectionId,
        message: String,
        room: Option<String>,
    ) -> Result<(), RouterError> {
        if message.trim().is_empty() {
            return Err(RouterError::EmptyMessage);
        }
        if let Some(room) = &room {
            validate_room_name(room).map_err(RouterError::InvalidRoom)?;
        }

        // Explicit room wins, then the connection's current room, then the
        // default. Membership in the resolved room is not enforced.
        let room = room
            .or_else(|| self.current_rooms.get(connection_id).map(|r| r.value().clone()))
            .unwrap_or_else(|| self.config.default_room.clone());

        let sender = self.sender_name(connection_id);
        let record = MessageRecord::room_message(sender, connection_id.clone(), message, &room);

        // Targets are resolved from live membership at the instant of send,
        // before persistence is awaited.
        let targets = self.rooms.members(&room);

        self.persist(&record).await;

        debug!(room = %room, recipients = targets.len(), "Routing room message");
        self.outbound
            .send_to_many(&targets, ServerEvent::ReceiveMessage(record))
            .await;
        Ok(())
    }

    async fn set_typing(
        &self,
        connection_id: &ConnectionId,
        is_typing: bool,
    ) -> Result<(), RouterError> {
        self.typing.set_typing(connection_id, is_typing);
        self.outbound
            .send_to_all(ServerEvent::TypingUsers(self.typing.current_typists()))
            .await;
        Ok(())
    }

    async fn private_message(
        &self,
        connection_id: &ConnectionId,
        to: ConnectionId,
        message: String,
    ) -> Result<(), RouterError> {
        if message.trim().is_empty() {
            return Err(RouterError::EmptyMessage);
        }

        let sender = self.sender_name(connection_id);
        let record = MessageRecord::private_message(sender, connection_id.clone(), message, to.clone());

        self.persist(&record).await;

        // Deliver to the target and echo back to the sender, exactly once
        // each even when they coincide.
        self.outbound
            .send_to(&to, ServerEvent::PrivateMessage(record.clone()))
            .await;
        if to != *connection_id {
            self.outbound
                .send_to(connection_id, ServerEvent::PrivateMessage(record))
                .await;
        }
        Ok(())
    }

    /// Resolve the sender's username from presence, never trusting the client.
    fn sender_name(&self, connection_id: &ConnectionId) -> String {
        self.registry
            .by_connection_id(connection_id)
            .map(|entry| entry.username)
            .unwrap_or_else(|| ANONYMOUS_SENDER.to_string())
    }

    /// Append to durable storage. A failure is logged and otherwise ignored:
    /// recipients must not lose real-time delivery over a storage hiccup.
    async fn persist(&self, record: &MessageRecord) {
        if let Err(e) = self.store.save(record).await {
            error!(error = %e, sender = %record.sender, "Failed to persist message; delivering live anyway");
        }
    }

    /// The room a connection currently targets by default, if any.
    #[must_use]
    pub fn current_room(&self, connection_id: &ConnectionId) -> Option<String> {
        self.current_rooms.get(connection_id).map(|r| r.value().clone())
    }
}
