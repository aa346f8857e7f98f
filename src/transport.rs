//! Transport boundary
//!
//! The physical discovery/connection layer (radio-level peer discovery and
//! link establishment) is an external collaborator. This module defines the
//! seam: a [`Transport`] trait whose operations resolve to explicit results,
//! and a [`TransportEvent`] stream that replaces the callback style of the
//! underlying link layer. Once a relay is running, transport failures are
//! never fatal; they degrade to retries or queued sends.

use futures::future::BoxFuture;

use crate::message::NodeId;

/// Errors from the transport collaborator.
#[derive(Debug, Clone)]
pub enum TransportError {
    /// Advertising the local service failed.
    Advertise(String),
    /// Starting discovery failed.
    Discover(String),
    /// A connect/accept request could not be issued.
    Connect(String),
    /// A payload send failed.
    Send(String),
    /// The peer is not connected.
    NotConnected(NodeId),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Advertise(e) => write!(f, "advertise failed: {}", e),
            TransportError::Discover(e) => write!(f, "discovery failed: {}", e),
            TransportError::Connect(e) => write!(f, "connect failed: {}", e),
            TransportError::Send(e) => write!(f, "send failed: {}", e),
            TransportError::NotConnected(peer) => write!(f, "peer not connected: {}", peer),
        }
    }
}

impl std::error::Error for TransportError {}

/// Events emitted by the transport.
///
/// These arrive on the channel handed to `Relay::start` and are the only way
/// link-layer activity enters the mesh actor.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// Discovery found a peer advertising our service.
    PeerFound(NodeId),
    /// A previously found peer went out of range.
    PeerLost(NodeId),
    /// A peer asked to connect to us and needs accepting.
    ConnectionRequest(NodeId),
    /// A link to the peer was established.
    Connected(NodeId),
    /// A connect/accept attempt failed.
    ConnectionFailed { peer: NodeId, reason: String },
    /// An established link was torn down.
    Disconnected(NodeId),
    /// One wire payload arrived from a connected peer.
    Payload { peer: NodeId, bytes: Vec<u8> },
}

/// The physical transport collaborator.
///
/// Methods return futures so send/connect outcomes compose with the relay's
/// retry state machine instead of nesting callbacks. `send` resolves with
/// the outcome of that specific transmission.
pub trait Transport: Send + Sync + 'static {
    /// Advertise the local node under `service_id`.
    fn advertise(
        &self,
        local_name: &str,
        service_id: &str,
    ) -> BoxFuture<'static, Result<(), TransportError>>;

    /// Start discovering peers advertising `service_id`.
    fn start_discovery(&self, service_id: &str) -> BoxFuture<'static, Result<(), TransportError>>;

    /// Request a connection to a discovered peer.
    ///
    /// Resolution means the request was issued; the outcome arrives as a
    /// [`TransportEvent::Connected`] or [`TransportEvent::ConnectionFailed`].
    fn connect(&self, peer: &NodeId) -> BoxFuture<'static, Result<(), TransportError>>;

    /// Accept an incoming connection request.
    fn accept(&self, peer: &NodeId) -> BoxFuture<'static, Result<(), TransportError>>;

    /// Send one wire payload to a connected peer.
    fn send(&self, peer: &NodeId, bytes: Vec<u8>)
        -> BoxFuture<'static, Result<(), TransportError>>;

    /// Tear down every connection and stop advertising/discovery.
    fn disconnect_all(&self) -> BoxFuture<'static, Result<(), TransportError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::Send("radio off".to_string());
        assert_eq!(err.to_string(), "send failed: radio off");

        let err = TransportError::NotConnected("peer-1".to_string());
        assert!(err.to_string().contains("peer-1"));
    }
}
