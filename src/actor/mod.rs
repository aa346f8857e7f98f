//! Mesh actor
//!
//! Connection and payload events arrive concurrently from the transport
//! boundary, but all mutations to shared relay state (session table, dedup
//! cache, pending queues) happen here, one at a time, inside a single task.
//! Blocking work (transport sends, durable-store uploads) is spawned off
//! this path and rejoins through the command channel.
//!
//! No global ordering exists between payloads from different peers;
//! correctness relies on the dedup cache and visited-list checks making
//! relay idempotent under re-delivery.

pub mod dedup;
pub mod outbound;
pub mod routing;
pub mod sessions;

use std::sync::Arc;
use std::time::Duration;

use rusqlite::Connection;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::gateway::GatewayClient;
use crate::message::{Message, NodeId};
use crate::relay::config::RelayConfig;
use crate::relay::events::{EventSender, SessionInfo};
use crate::transport::{Transport, TransportEvent};
use crate::wire;

use dedup::DedupCache;
use outbound::RetryPolicy;
use sessions::{SessionState, SessionTable};

/// Inputs to the mesh actor.
pub(crate) enum Command {
    /// Locally created message enters the relay.
    Publish(Message),
    /// Connectivity to the durable store changed.
    SetConnectivity(bool),
    /// A session's settle timer fired.
    SessionSettled { peer: NodeId, epoch: u64 },
    /// A spawned transmission failed.
    SendFailed {
        peer: NodeId,
        message: Message,
        retries: u32,
    },
    /// A scheduled retry is due.
    RetrySend {
        peer: NodeId,
        message: Message,
        retries: u32,
    },
    /// Periodic dedup cache sweep.
    DedupSweep,
    /// Periodic gateway upload retry.
    GatewayRetry,
    /// Periodic health sweep: re-flush queues, emit diagnostics.
    HealthSweep,
    /// Session-table snapshot request.
    Snapshot(oneshot::Sender<Vec<SessionInfo>>),
    /// Stop processing. Acknowledged once no further mutation can occur.
    Shutdown(oneshot::Sender<()>),
}

/// The serialized-state relay actor.
pub(crate) struct MeshActor {
    pub(crate) node_id: NodeId,
    pub(crate) sessions: SessionTable,
    pub(crate) dedup: DedupCache,
    pub(crate) connectivity: bool,
    pub(crate) max_hops: u8,
    settle_delay: Duration,
    retry_policy: RetryPolicy,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) gateway: GatewayClient,
    pub(crate) db: Arc<Mutex<Connection>>,
    pub(crate) events: EventSender,
    cmd_tx: mpsc::Sender<Command>,
    /// In-flight upload tasks, aborted on shutdown.
    uploads: Vec<JoinHandle<()>>,
}

impl MeshActor {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        node_id: NodeId,
        config: &RelayConfig,
        transport: Arc<dyn Transport>,
        gateway: GatewayClient,
        db: Arc<Mutex<Connection>>,
        events: EventSender,
        cmd_tx: mpsc::Sender<Command>,
    ) -> Self {
        Self {
            node_id,
            sessions: SessionTable::new(),
            dedup: DedupCache::new(Duration::from_millis(config.dedup_ttl_ms)),
            connectivity: false,
            max_hops: config.max_hops,
            settle_delay: Duration::from_millis(config.settle_delay_ms),
            retry_policy: RetryPolicy::new(
                config.send_retries,
                Duration::from_millis(config.send_retry_unit_ms),
            ),
            transport,
            gateway,
            db,
            events,
            cmd_tx,
            uploads: Vec::new(),
        }
    }

    /// Spawn an upload future and keep its handle for teardown.
    pub(crate) fn spawn_upload(
        &mut self,
        fut: impl std::future::Future<Output = ()> + Send + 'static,
    ) {
        self.uploads.push(tokio::spawn(fut));
    }

    fn abort_uploads(&mut self) {
        for task in self.uploads.drain(..) {
            task.abort();
        }
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Publish(message) => self.handle_publish(message).await,
            Command::SetConnectivity(on) => self.handle_connectivity(on),
            Command::SessionSettled { peer, epoch } => self.handle_settled(&peer, epoch),
            Command::SendFailed {
                peer,
                message,
                retries,
            } => self.handle_send_failed(peer, message, retries),
            Command::RetrySend {
                peer,
                message,
                retries,
            } => self.handle_retry_send(peer, message, retries),
            Command::DedupSweep => {
                let evicted = self.dedup.sweep();
                if evicted > 0 {
                    debug!(evicted = evicted, "dedup sweep evicted stale entries");
                }
            }
            Command::GatewayRetry => {
                if self.connectivity {
                    let gateway = self.gateway.clone();
                    self.spawn_upload(async move {
                        gateway.retry_pending().await;
                    });
                }
            }
            Command::HealthSweep => self.handle_health_sweep(),
            Command::Snapshot(reply) => {
                let _ = reply.send(self.sessions.snapshot());
            }
            Command::Shutdown(_) => unreachable!("shutdown is handled by the run loop"),
        }
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::PeerFound(peer) => self.handle_peer_found(peer),
            TransportEvent::PeerLost(peer) => self.handle_peer_gone(&peer, "lost"),
            TransportEvent::ConnectionRequest(peer) => self.handle_connection_request(peer),
            TransportEvent::Connected(peer) => self.handle_connected(peer),
            TransportEvent::ConnectionFailed { peer, reason } => {
                if self.sessions.mark_failed(&peer) {
                    warn!(peer = %peer, reason = %reason, "connection failed");
                    self.events
                        .status(format!("connection to {} failed: {}", peer, reason));
                }
            }
            TransportEvent::Disconnected(peer) => self.handle_peer_gone(&peer, "disconnected"),
            TransportEvent::Payload { peer, bytes } => match wire::decode(&bytes) {
                Ok(message) => self.handle_incoming(&peer, message).await,
                Err(e) => {
                    // One bad payload never stalls the relay
                    warn!(peer = %peer, error = %e, "dropping malformed payload");
                    self.events
                        .status(format!("dropped malformed payload from {}", peer));
                }
            },
        }
    }

    fn handle_peer_found(&mut self, peer: NodeId) {
        // Re-found while a live session exists: keep the session
        if matches!(
            self.sessions.state(&peer),
            Some(SessionState::Initiated | SessionState::Accepted | SessionState::Ready)
        ) {
            trace!(peer = %peer, "peer re-found, session already live");
            return;
        }
        self.sessions.initiate(&peer);
        self.events.status(format!("peer found: {}", peer));

        let transport = self.transport.clone();
        let target = peer.clone();
        tokio::spawn(async move {
            if let Err(e) = transport.connect(&target).await {
                warn!(peer = %target, error = %e, "connect request failed");
            }
        });
    }

    fn handle_connection_request(&mut self, peer: NodeId) {
        if !self.sessions.contains(&peer) {
            self.sessions.initiate(&peer);
        }
        self.events.status(format!("accepting connection from {}", peer));

        let transport = self.transport.clone();
        let target = peer.clone();
        tokio::spawn(async move {
            if let Err(e) = transport.accept(&target).await {
                warn!(peer = %target, error = %e, "accept request failed");
            }
        });
    }

    fn handle_connected(&mut self, peer: NodeId) {
        if !self.sessions.contains(&peer) {
            // Link established without a prior discovery event
            self.sessions.initiate(&peer);
        }
        let Some(epoch) = self.sessions.mark_accepted(&peer) else {
            return;
        };
        debug!(peer = %peer, "link established, settling");
        self.events.status(format!("connected to {}, settling", peer));

        // Ready only after the settle delay; the epoch guards against a
        // reconnect racing this timer.
        let cmd_tx = self.cmd_tx.clone();
        let delay = self.settle_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = cmd_tx.send(Command::SessionSettled { peer, epoch }).await;
        });
    }

    fn handle_settled(&mut self, peer: &NodeId, epoch: u64) {
        if self.sessions.mark_ready(peer, epoch) {
            info!(peer = %peer, "session ready");
            self.events.status(format!("session ready: {}", peer));
            self.flush_queue(peer);
        }
    }

    fn handle_peer_gone(&mut self, peer: &NodeId, how: &str) {
        if let Some(session) = self.sessions.remove(peer) {
            info!(peer = %peer, queued = session.pending.len(), "peer {}", how);
            self.events.status(format!(
                "peer {} {}, {} queued messages discarded",
                peer,
                how,
                session.pending.len()
            ));
        }
    }

    fn handle_connectivity(&mut self, on: bool) {
        let had = self.connectivity;
        self.connectivity = on;
        self.events.status(format!(
            "connectivity {}",
            if on { "gained" } else { "lost" }
        ));
        if on && !had {
            // The instant connectivity appears, upload everything we hold
            let gateway = self.gateway.clone();
            self.spawn_upload(async move {
                gateway.retry_pending().await;
            });
        }
    }

    fn handle_health_sweep(&mut self) {
        self.uploads.retain(|task| !task.is_finished());
        for peer in self.sessions.ready_peers(None) {
            self.flush_queue(&peer);
        }
        let snapshot = self.sessions.snapshot();
        trace!(sessions = snapshot.len(), "health sweep");
        self.events.sessions(snapshot);
    }

    /// Send the peer's queued messages in arrival order.
    fn flush_queue(&mut self, peer: &NodeId) {
        let queued = self.sessions.drain_queue(peer);
        if queued.is_empty() {
            return;
        }
        debug!(peer = %peer, count = queued.len(), "flushing pending queue");
        for message in queued {
            self.transmit(peer, message, 0);
        }
    }

    fn handle_send_failed(&mut self, peer: NodeId, message: Message, retries: u32) {
        if self.retry_policy.should_retry(retries) {
            let retry = retries + 1;
            let delay = self.retry_policy.delay_for(retry);
            debug!(peer = %peer, message_id = %message.short_id(), retry = retry,
                delay_ms = delay.as_millis() as u64, "scheduling send retry");

            let cmd_tx = self.cmd_tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = cmd_tx
                    .send(Command::RetrySend {
                        peer,
                        message,
                        retries: retry,
                    })
                    .await;
            });
        } else if self.sessions.queue(&peer, message.clone()) {
            // Abandoned for this transmission; the message stays available
            // in the peer's pending queue for a later flush
            debug!(peer = %peer, message_id = %message.short_id(),
                "transmission abandoned, message queued");
            self.events.status(format!(
                "send of {} to {} abandoned after retries, queued",
                message.short_id(),
                peer
            ));
        } else {
            debug!(peer = %peer, message_id = %message.short_id(),
                "transmission abandoned, session gone");
        }
    }

    fn handle_retry_send(&mut self, peer: NodeId, message: Message, retries: u32) {
        match self.sessions.state(&peer) {
            Some(SessionState::Ready | SessionState::Accepted) => {
                self.transmit(&peer, message, retries)
            }
            Some(_) => {
                self.sessions.queue(&peer, message);
            }
            None => {
                trace!(peer = %peer, "dropping retry for departed peer");
            }
        }
    }

    /// Fire one transmission; failure re-enters via [`Command::SendFailed`].
    pub(crate) fn transmit(&self, peer: &NodeId, message: Message, retries: u32) {
        let bytes = match wire::encode(&message) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(message_id = %message.short_id(), error = %e, "failed to encode message");
                return;
            }
        };

        let transport = self.transport.clone();
        let cmd_tx = self.cmd_tx.clone();
        let peer = peer.clone();
        tokio::spawn(async move {
            match transport.send(&peer, bytes).await {
                Ok(()) => {
                    trace!(peer = %peer, message_id = %message.short_id(), "payload sent");
                }
                Err(e) => {
                    debug!(peer = %peer, message_id = %message.short_id(), error = %e,
                        "send failed");
                    let _ = cmd_tx
                        .send(Command::SendFailed {
                            peer,
                            message,
                            retries,
                        })
                        .await;
                }
            }
        });
    }

    /// Write a copy to the local pending store.
    pub(crate) async fn persist_pending(&self, message: &Message) {
        let db = self.db.lock().await;
        if let Err(e) = crate::data::pending::add_pending(&db, message) {
            warn!(message_id = %message.short_id(), error = %e,
                "failed to persist pending message");
        }
    }
}

/// Run the actor until shutdown.
///
/// In-flight upload tasks are aborted before the shutdown acknowledgement
/// is sent, so once the caller observes the ack no further mutation of
/// relay state or the durable store can happen; late transport events land
/// in a channel nobody reads.
pub(crate) async fn run(
    mut actor: MeshActor,
    mut commands: mpsc::Receiver<Command>,
    mut transport_events: mpsc::Receiver<TransportEvent>,
) {
    info!(node_id = %actor.node_id, "mesh actor started");
    let mut transport_open = true;

    loop {
        tokio::select! {
            cmd = commands.recv() => match cmd {
                Some(Command::Shutdown(ack)) => {
                    actor.abort_uploads();
                    let _ = ack.send(());
                    break;
                }
                Some(cmd) => actor.handle_command(cmd).await,
                None => {
                    actor.abort_uploads();
                    break;
                }
            },
            event = transport_events.recv(), if transport_open => match event {
                Some(event) => actor.handle_transport_event(event).await,
                None => {
                    debug!("transport event stream closed");
                    transport_open = false;
                }
            },
        }
    }

    info!(node_id = %actor.node_id, "mesh actor stopped");
}
