//! # huddle-protocol
//!
//! Wire contract for the Huddle chat hub.
//!
//! This crate defines:
//!
//! - **Events** - the inbound ([`ClientEvent`]) and outbound ([`ServerEvent`])
//!   event vocabulary exchanged with clients
//! - **Records** - shared payload types ([`PresenceEntry`], [`MessageRecord`],
//!   [`ConnectionId`])
//! - **Codec** - length-prefixed MessagePack framing
//!
//! Event names on the wire (`user_join`, `send_message`, `typing_users`, ...)
//! are part of the public contract and must not change.

pub mod codec;
pub mod events;
pub mod records;

pub use codec::ProtocolError;
pub use events::{ClientEvent, ServerEvent};
pub use records::{ConnectionId, MessageRecord, PresenceEntry};
