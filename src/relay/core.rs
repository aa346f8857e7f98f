//! Relay lifecycle
//!
//! `Relay::start` wires the pieces together: opens the local database,
//! spawns the mesh actor, points the transport's discovery at the
//! configured service and starts the periodic tasks. The returned handle
//! is the application's only way in; all relay state lives inside the
//! actor task.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::actor::{self, Command, MeshActor};
use crate::data::start_db;
use crate::gateway::{DurableStore, GatewayClient};
use crate::message::{new_message_id, Message, MessageId, MessageKind, NodeId};
use crate::relay::config::RelayConfig;
use crate::relay::error::RelayError;
use crate::relay::events::{EventSender, RelayEvent, SessionInfo};
use crate::tasks;
use crate::transport::{Transport, TransportEvent};

const COMMAND_CAPACITY: usize = 256;

/// Handle to a running mesh relay.
pub struct Relay {
    node_id: NodeId,
    display_name: String,
    cmd_tx: mpsc::Sender<Command>,
    event_rx: Option<mpsc::Receiver<RelayEvent>>,
    running: Arc<RwLock<bool>>,
    tasks: Vec<JoinHandle<()>>,
    actor_handle: Option<JoinHandle<()>>,
    transport: Arc<dyn Transport>,
}

impl Relay {
    /// Start the relay.
    ///
    /// `transport_events` is the event stream belonging to `transport`;
    /// `store` is the durable backing store the gateway uploads to.
    /// A node that can neither advertise nor discover is invisible to the
    /// mesh, so failures in either return [`RelayError::StartFailed`].
    pub async fn start(
        config: RelayConfig,
        transport: Arc<dyn Transport>,
        transport_events: mpsc::Receiver<TransportEvent>,
        store: Arc<dyn DurableStore>,
    ) -> Result<Relay, RelayError> {
        let node_id = config.node_id.clone().unwrap_or_else(new_message_id);
        info!(node_id = %node_id, config = %config, "starting relay");

        let conn = start_db(config.db_path.as_deref())
            .map_err(|e| RelayError::Database(e.to_string()))?;
        let db = Arc::new(Mutex::new(conn));

        let (event_tx, event_rx) = mpsc::channel(config.event_capacity);
        let events = EventSender::new(event_tx);
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CAPACITY);

        let gateway = GatewayClient::new(node_id.clone(), store, db.clone(), events.clone());
        let actor = MeshActor::new(
            node_id.clone(),
            &config,
            transport.clone(),
            gateway,
            db,
            events,
            cmd_tx.clone(),
        );
        let actor_handle = tokio::spawn(actor::run(actor, cmd_rx, transport_events));

        transport
            .advertise(&config.display_name, &config.service_id)
            .await
            .map_err(|e| RelayError::StartFailed(format!("advertise: {}", e)))?;
        transport
            .start_discovery(&config.service_id)
            .await
            .map_err(|e| RelayError::StartFailed(format!("discovery: {}", e)))?;

        let running = Arc::new(RwLock::new(true));
        let tasks = vec![
            tasks::start_dedup_sweep_task(
                cmd_tx.clone(),
                running.clone(),
                std::time::Duration::from_millis(config.dedup_sweep_interval_ms),
            ),
            tasks::start_gateway_retry_task(
                cmd_tx.clone(),
                running.clone(),
                std::time::Duration::from_millis(config.gateway_retry_interval_ms),
            ),
            tasks::start_health_sweep_task(
                cmd_tx.clone(),
                running.clone(),
                std::time::Duration::from_millis(config.health_interval_ms),
            ),
        ];

        info!(node_id = %node_id, "relay started");
        Ok(Relay {
            node_id,
            display_name: config.display_name,
            cmd_tx,
            event_rx: Some(event_rx),
            running,
            tasks,
            actor_handle: Some(actor_handle),
            transport,
        })
    }

    /// This node's stable id.
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Take the outward event stream. Can be taken once.
    pub fn events(&mut self) -> Option<mpsc::Receiver<RelayEvent>> {
        self.event_rx.take()
    }

    /// Create and publish a message into the mesh.
    ///
    /// Returns the assigned message id immediately; delivery happens
    /// asynchronously and progress is reported through the event stream.
    pub async fn publish(
        &self,
        content: String,
        kind: MessageKind,
        encrypted_location: Option<String>,
    ) -> Result<MessageId, RelayError> {
        if !*self.running.read().await {
            return Err(RelayError::NotRunning);
        }
        if content.is_empty() {
            return Err(RelayError::InvalidInput("empty message content".to_string()));
        }

        let message = Message::new(
            &self.node_id,
            &self.display_name,
            content,
            kind,
            encrypted_location,
        );
        let id = message.id.clone();
        self.cmd_tx
            .send(Command::Publish(message))
            .await
            .map_err(|_| RelayError::NotRunning)?;
        Ok(id)
    }

    /// Report a change in connectivity to the durable store.
    ///
    /// Gaining connectivity immediately triggers an upload of everything
    /// this node holds.
    pub async fn set_connectivity(&self, connected: bool) -> Result<(), RelayError> {
        self.cmd_tx
            .send(Command::SetConnectivity(connected))
            .await
            .map_err(|_| RelayError::NotRunning)
    }

    /// Snapshot of the current peer sessions.
    pub async fn sessions(&self) -> Result<Vec<SessionInfo>, RelayError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Snapshot(reply_tx))
            .await
            .map_err(|_| RelayError::NotRunning)?;
        reply_rx.await.map_err(|_| RelayError::NotRunning)
    }

    /// Stop the relay.
    ///
    /// Safe to call more than once. When this returns, the periodic tasks
    /// are cancelled, the actor has acknowledged shutdown (no further state
    /// mutation) and the transport has been told to tear down connections.
    pub async fn stop(&mut self) {
        {
            let mut running = self.running.write().await;
            if !*running {
                return;
            }
            *running = false;
        }
        info!(node_id = %self.node_id, "stopping relay");

        for task in self.tasks.drain(..) {
            task.abort();
        }

        let (ack_tx, ack_rx) = oneshot::channel();
        if self.cmd_tx.send(Command::Shutdown(ack_tx)).await.is_ok() {
            let _ = ack_rx.await;
        }
        if let Some(handle) = self.actor_handle.take() {
            let _ = handle.await;
        }

        if let Err(e) = self.transport.disconnect_all().await {
            warn!(error = %e, "transport teardown failed");
        }
        info!(node_id = %self.node_id, "relay stopped");
    }
}
