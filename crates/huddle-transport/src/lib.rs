//! # huddle-transport
//!
//! Transport adapter for the Huddle chat hub.
//!
//! The hub core is transport-agnostic: it emits [`ServerEvent`]s through the
//! [`Outbound`] port. This crate supplies the concrete adapter — a
//! [`PeerMap`] of per-connection outbound queues that the WebSocket layer
//! drains into sockets.
//!
//! [`ServerEvent`]: huddle_protocol::ServerEvent
//! [`Outbound`]: huddle_core::Outbound

pub mod fanout;

pub use fanout::PeerMap;
