//! Per-connection outbound queues and broadcast fan-out.
//!
//! Each live connection registers an unbounded sender; the socket task on
//! the other end drains the queue into the wire. Sending to a connection
//! that has unregistered (or whose receiver is gone) is a silent no-op, so
//! one dead socket never fails a broadcast.

use async_trait::async_trait;
use dashmap::DashMap;
use huddle_core::Outbound;
use huddle_protocol::{ConnectionId, ServerEvent};
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Registry of connected peers and their outbound queues.
#[derive(Debug, Default)]
pub struct PeerMap {
    peers: DashMap<ConnectionId, mpsc::UnboundedSender<ServerEvent>>,
}

impl PeerMap {
    /// Create an empty peer map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection's outbound queue.
    ///
    /// Returns the receiving half for the socket task to drain.
    pub fn register(&self, connection_id: ConnectionId) -> mpsc::UnboundedReceiver<ServerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.peers.insert(connection_id.clone(), tx);
        debug!(connection = %connection_id, peers = self.peers.len(), "Peer registered");
        rx
    }

    /// Remove a connection's outbound queue. No-op if unknown.
    pub fn unregister(&self, connection_id: &ConnectionId) {
        if self.peers.remove(connection_id).is_some() {
            debug!(connection = %connection_id, peers = self.peers.len(), "Peer unregistered");
        }
    }

    /// Whether a connection is currently registered.
    #[must_use]
    pub fn is_connected(&self, connection_id: &ConnectionId) -> bool {
        self.peers.contains_key(connection_id)
    }

    /// Number of registered connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.peers.len()
    }

    fn push(&self, target: &ConnectionId, event: ServerEvent) {
        if let Some(tx) = self.peers.get(target) {
            if tx.send(event).is_err() {
                // Receiver dropped but not yet unregistered; treat as gone.
                trace!(connection = %target, "Dropping event for closed peer");
            }
        }
    }
}

#[async_trait]
impl Outbound for PeerMap {
    async fn send_to(&self, target: &ConnectionId, event: ServerEvent) {
        self.push(target, event);
    }

    async fn send_to_many(&self, targets: &[ConnectionId], event: ServerEvent) {
        for target in targets {
            self.push(target, event.clone());
        }
    }

    async fn send_to_all(&self, event: ServerEvent) {
        for peer in self.peers.iter() {
            if peer.value().send(event.clone()).is_err() {
                trace!(connection = %peer.key(), "Dropping event for closed peer");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typing_event() -> ServerEvent {
        ServerEvent::TypingUsers(vec!["c9".into()])
    }

    #[tokio::test]
    async fn test_send_to_registered_peer() {
        let peers = PeerMap::new();
        let mut rx = peers.register("c1".into());

        peers.send_to(&"c1".into(), typing_event()).await;
        assert_eq!(rx.recv().await.unwrap(), typing_event());
    }

    #[tokio::test]
    async fn test_send_to_unknown_peer_is_noop() {
        let peers = PeerMap::new();
        // Must neither panic nor error.
        peers.send_to(&"ghost".into(), typing_event()).await;
    }

    #[tokio::test]
    async fn test_send_to_many_skips_missing() {
        let peers = PeerMap::new();
        let mut rx1 = peers.register("c1".into());
        let mut rx2 = peers.register("c2".into());

        peers
            .send_to_many(&["c1".into(), "ghost".into(), "c2".into()], typing_event())
            .await;

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_send_to_all() {
        let peers = PeerMap::new();
        let mut rx1 = peers.register("c1".into());
        let mut rx2 = peers.register("c2".into());
        assert_eq!(peers.connection_count(), 2);

        peers.send_to_all(typing_event()).await;

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_unregister_stops_delivery() {
        let peers = PeerMap::new();
        let mut rx = peers.register("c1".into());
        peers.unregister(&"c1".into());
        assert!(!peers.is_connected(&"c1".into()));

        peers.send_to(&"c1".into(), typing_event()).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dropped_receiver_is_noop() {
        let peers = PeerMap::new();
        let rx = peers.register("c1".into());
        drop(rx);

        // Sender is still registered but the receiver is gone.
        peers.send_to(&"c1".into(), typing_event()).await;
    }
}
