//! Gateway retry loop
//!
//! Periodically asks the actor to re-attempt uploads for the local pending
//! backlog. The actor skips the sweep entirely while the node has no
//! connectivity, and connectivity gain triggers an immediate retry outside
//! this loop, so the interval only bounds how stale a failed upload can get
//! while connectivity holds.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::info;

use crate::actor::Command;

pub(crate) fn start_gateway_retry_task(
    cmd_tx: mpsc::Sender<Command>,
    running: Arc<RwLock<bool>>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("gateway retry task started");
        loop {
            tokio::time::sleep(interval).await;
            if !*running.read().await {
                break;
            }
            if cmd_tx.send(Command::GatewayRetry).await.is_err() {
                break;
            }
        }
        info!("gateway retry task stopped");
    })
}
