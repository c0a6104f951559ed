//! The outbound delivery port.
//!
//! The router never talks to sockets directly; it resolves a target set and
//! hands events to an [`Outbound`] implementation supplied by the transport
//! layer. Delivery to a connection that has already gone away is a no-op and
//! never fails the rest of a broadcast.

use async_trait::async_trait;
use huddle_protocol::{ConnectionId, ServerEvent};

/// Delivers outbound events to specific connections.
#[async_trait]
pub trait Outbound: Send + Sync {
    /// Deliver an event to a single connection. No-op if unknown.
    async fn send_to(&self, target: &ConnectionId, event: ServerEvent);

    /// Deliver an event to each listed connection. Unknown ids are skipped.
    async fn send_to_many(&self, targets: &[ConnectionId], event: ServerEvent);

    /// Deliver an event to every currently-connected client.
    async fn send_to_all(&self, event: ServerEvent);
}
