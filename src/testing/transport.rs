//! In-memory mesh transport
//!
//! A hub holding every test node's event channel and the set of live links
//! between them. Tests drive topology directly (`link`, `drop_link`,
//! `lose_peer`, `fail_sends`) and each node's [`MeshTransport`] behaves
//! like a radio attached to that hub.
//!
//! Connection model: `connect` on an existing link delivers `Connected` to
//! the caller and `ConnectionRequest` to the peer; the peer's `accept`
//! delivers its own `Connected`. Both sides discovering each other and
//! connecting in parallel therefore produces duplicate `Connected` events,
//! which the session table absorbs.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use tracing::trace;

use crate::message::NodeId;
use crate::transport::{Transport, TransportError, TransportEvent};

use tokio::sync::mpsc;

const EVENT_CAPACITY: usize = 256;

#[derive(Default)]
struct Hub {
    nodes: HashMap<NodeId, mpsc::Sender<TransportEvent>>,
    links: HashSet<(NodeId, NodeId)>,
    // Directional send failures, (from, to)
    failed_sends: HashSet<(NodeId, NodeId)>,
}

fn edge(a: &str, b: &str) -> (NodeId, NodeId) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

impl Hub {
    fn emit(&self, node: &NodeId, event: TransportEvent) {
        if let Some(tx) = self.nodes.get(node) {
            // Nothing to do if the node's receiver is gone or saturated
            let _ = tx.try_send(event);
        }
    }

    fn linked(&self, a: &str, b: &str) -> bool {
        self.links.contains(&edge(a, b))
    }
}

/// Shared hub for a simulated mesh.
#[derive(Clone, Default)]
pub struct MemoryMesh {
    hub: Arc<Mutex<Hub>>,
}

impl MemoryMesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node and return its transport plus event stream.
    pub fn add_node(&self, node_id: &str) -> (MeshTransport, mpsc::Receiver<TransportEvent>) {
        let (tx, rx) = mpsc::channel(EVENT_CAPACITY);
        self.hub
            .lock()
            .unwrap()
            .nodes
            .insert(node_id.to_string(), tx);
        (
            MeshTransport {
                node_id: node_id.to_string(),
                hub: self.hub.clone(),
            },
            rx,
        )
    }

    /// Bring two nodes into range: both sides discover each other.
    pub fn link(&self, a: &str, b: &str) {
        let mut hub = self.hub.lock().unwrap();
        if hub.links.insert(edge(a, b)) {
            hub.emit(&a.to_string(), TransportEvent::PeerFound(b.to_string()));
            hub.emit(&b.to_string(), TransportEvent::PeerFound(a.to_string()));
        }
    }

    /// Tear an established link down: both sides see a disconnect.
    pub fn drop_link(&self, a: &str, b: &str) {
        let mut hub = self.hub.lock().unwrap();
        if hub.links.remove(&edge(a, b)) {
            hub.emit(&a.to_string(), TransportEvent::Disconnected(b.to_string()));
            hub.emit(&b.to_string(), TransportEvent::Disconnected(a.to_string()));
        }
    }

    /// Take two nodes out of range at the discovery level.
    pub fn lose_peer(&self, a: &str, b: &str) {
        let mut hub = self.hub.lock().unwrap();
        if hub.links.remove(&edge(a, b)) {
            hub.emit(&a.to_string(), TransportEvent::PeerLost(b.to_string()));
            hub.emit(&b.to_string(), TransportEvent::PeerLost(a.to_string()));
        }
    }

    /// Make sends from `from` to `to` fail (or succeed again).
    pub fn fail_sends(&self, from: &str, to: &str, fail: bool) {
        let mut hub = self.hub.lock().unwrap();
        let key = (from.to_string(), to.to_string());
        if fail {
            hub.failed_sends.insert(key);
        } else {
            hub.failed_sends.remove(&key);
        }
    }
}

/// One node's view of the [`MemoryMesh`].
pub struct MeshTransport {
    node_id: NodeId,
    hub: Arc<Mutex<Hub>>,
}

impl Transport for MeshTransport {
    fn advertise(
        &self,
        local_name: &str,
        service_id: &str,
    ) -> BoxFuture<'static, Result<(), TransportError>> {
        trace!(node = %self.node_id, name = local_name, service = service_id, "advertising");
        Box::pin(async { Ok(()) })
    }

    fn start_discovery(&self, service_id: &str) -> BoxFuture<'static, Result<(), TransportError>> {
        trace!(node = %self.node_id, service = service_id, "discovery started");
        Box::pin(async { Ok(()) })
    }

    fn connect(&self, peer: &NodeId) -> BoxFuture<'static, Result<(), TransportError>> {
        let hub = self.hub.clone();
        let me = self.node_id.clone();
        let peer = peer.clone();
        Box::pin(async move {
            let hub = hub.lock().unwrap();
            if hub.linked(&me, &peer) {
                hub.emit(&me, TransportEvent::Connected(peer.clone()));
                hub.emit(&peer, TransportEvent::ConnectionRequest(me));
            } else {
                hub.emit(
                    &me,
                    TransportEvent::ConnectionFailed {
                        peer,
                        reason: "peer out of range".to_string(),
                    },
                );
            }
            Ok(())
        })
    }

    fn accept(&self, peer: &NodeId) -> BoxFuture<'static, Result<(), TransportError>> {
        let hub = self.hub.clone();
        let me = self.node_id.clone();
        let peer = peer.clone();
        Box::pin(async move {
            let hub = hub.lock().unwrap();
            if hub.linked(&me, &peer) {
                hub.emit(&me, TransportEvent::Connected(peer));
            } else {
                hub.emit(
                    &me,
                    TransportEvent::ConnectionFailed {
                        peer,
                        reason: "peer out of range".to_string(),
                    },
                );
            }
            Ok(())
        })
    }

    fn send(
        &self,
        peer: &NodeId,
        bytes: Vec<u8>,
    ) -> BoxFuture<'static, Result<(), TransportError>> {
        let hub = self.hub.clone();
        let me = self.node_id.clone();
        let peer = peer.clone();
        Box::pin(async move {
            let hub = hub.lock().unwrap();
            if !hub.linked(&me, &peer) {
                return Err(TransportError::NotConnected(peer));
            }
            if hub.failed_sends.contains(&(me.clone(), peer.clone())) {
                return Err(TransportError::Send("link noise".to_string()));
            }
            hub.emit(&peer, TransportEvent::Payload { peer: me, bytes });
            Ok(())
        })
    }

    fn disconnect_all(&self) -> BoxFuture<'static, Result<(), TransportError>> {
        let hub = self.hub.clone();
        let me = self.node_id.clone();
        Box::pin(async move {
            let mut hub = hub.lock().unwrap();
            let gone: Vec<(NodeId, NodeId)> = hub
                .links
                .iter()
                .filter(|(a, b)| a == &me || b == &me)
                .cloned()
                .collect();
            for key in gone {
                hub.links.remove(&key);
                let other = if key.0 == me { key.1 } else { key.0 };
                hub.emit(&other, TransportEvent::Disconnected(me.clone()));
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn next(rx: &mut mpsc::Receiver<TransportEvent>) -> TransportEvent {
        tokio::time::timeout(std::time::Duration::from_millis(200), rx.recv())
            .await
            .expect("event expected")
            .expect("channel open")
    }

    #[tokio::test]
    async fn test_link_emits_peer_found_both_sides() {
        let mesh = MemoryMesh::new();
        let (_ta, mut ra) = mesh.add_node("a");
        let (_tb, mut rb) = mesh.add_node("b");

        mesh.link("a", "b");
        assert!(matches!(next(&mut ra).await, TransportEvent::PeerFound(p) if p == "b"));
        assert!(matches!(next(&mut rb).await, TransportEvent::PeerFound(p) if p == "a"));
    }

    #[tokio::test]
    async fn test_connect_and_accept_handshake() {
        let mesh = MemoryMesh::new();
        let (ta, mut ra) = mesh.add_node("a");
        let (tb, mut rb) = mesh.add_node("b");
        mesh.link("a", "b");
        let _ = next(&mut ra).await;
        let _ = next(&mut rb).await;

        ta.connect(&"b".to_string()).await.unwrap();
        assert!(matches!(next(&mut ra).await, TransportEvent::Connected(p) if p == "b"));
        assert!(matches!(next(&mut rb).await, TransportEvent::ConnectionRequest(p) if p == "a"));

        tb.accept(&"a".to_string()).await.unwrap();
        assert!(matches!(next(&mut rb).await, TransportEvent::Connected(p) if p == "a"));
    }

    #[tokio::test]
    async fn test_connect_without_link_fails() {
        let mesh = MemoryMesh::new();
        let (ta, mut ra) = mesh.add_node("a");
        let (_tb, _rb) = mesh.add_node("b");

        ta.connect(&"b".to_string()).await.unwrap();
        assert!(matches!(
            next(&mut ra).await,
            TransportEvent::ConnectionFailed { peer, .. } if peer == "b"
        ));
    }

    #[tokio::test]
    async fn test_send_delivers_payload() {
        let mesh = MemoryMesh::new();
        let (ta, _ra) = mesh.add_node("a");
        let (_tb, mut rb) = mesh.add_node("b");
        mesh.link("a", "b");
        let _ = next(&mut rb).await; // PeerFound

        ta.send(&"b".to_string(), b"hello".to_vec()).await.unwrap();
        match next(&mut rb).await {
            TransportEvent::Payload { peer, bytes } => {
                assert_eq!(peer, "a");
                assert_eq!(bytes, b"hello");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_sends_are_directional() {
        let mesh = MemoryMesh::new();
        let (ta, mut ra) = mesh.add_node("a");
        let (tb, mut rb) = mesh.add_node("b");
        mesh.link("a", "b");
        let _ = next(&mut ra).await;
        let _ = next(&mut rb).await;

        mesh.fail_sends("a", "b", true);
        assert!(ta.send(&"b".to_string(), b"x".to_vec()).await.is_err());
        // Reverse direction still works
        assert!(tb.send(&"a".to_string(), b"y".to_vec()).await.is_ok());

        mesh.fail_sends("a", "b", false);
        assert!(ta.send(&"b".to_string(), b"x".to_vec()).await.is_ok());
    }

    #[tokio::test]
    async fn test_drop_link_disconnects_both_sides() {
        let mesh = MemoryMesh::new();
        let (ta, mut ra) = mesh.add_node("a");
        let (_tb, mut rb) = mesh.add_node("b");
        mesh.link("a", "b");
        let _ = next(&mut ra).await;
        let _ = next(&mut rb).await;

        mesh.drop_link("a", "b");
        assert!(matches!(next(&mut ra).await, TransportEvent::Disconnected(p) if p == "b"));
        assert!(matches!(next(&mut rb).await, TransportEvent::Disconnected(p) if p == "a"));
        assert!(ta.send(&"b".to_string(), b"x".to_vec()).await.is_err());
    }

    #[tokio::test]
    async fn test_lose_peer_emits_peer_lost() {
        let mesh = MemoryMesh::new();
        let (ta, mut ra) = mesh.add_node("a");
        let (_tb, mut rb) = mesh.add_node("b");
        mesh.link("a", "b");
        let _ = next(&mut ra).await;
        let _ = next(&mut rb).await;

        mesh.lose_peer("a", "b");
        assert!(matches!(next(&mut ra).await, TransportEvent::PeerLost(p) if p == "b"));
        assert!(matches!(next(&mut rb).await, TransportEvent::PeerLost(p) if p == "a"));
        assert!(ta.send(&"b".to_string(), b"x".to_vec()).await.is_err());
    }

    #[tokio::test]
    async fn test_disconnect_all_notifies_neighbors() {
        let mesh = MemoryMesh::new();
        let (ta, _ra) = mesh.add_node("a");
        let (_tb, mut rb) = mesh.add_node("b");
        let (_tc, mut rc) = mesh.add_node("c");
        mesh.link("a", "b");
        mesh.link("a", "c");
        let _ = next(&mut rb).await;
        let _ = next(&mut rc).await;

        ta.disconnect_all().await.unwrap();
        assert!(matches!(next(&mut rb).await, TransportEvent::Disconnected(p) if p == "a"));
        assert!(matches!(next(&mut rc).await, TransportEvent::Disconnected(p) if p == "a"));
    }
}
