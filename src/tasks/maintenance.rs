//! Maintenance sweeps
//!
//! The dedup sweep bounds the dedup cache's memory; the health sweep
//! re-flushes peer queues and emits session diagnostics. Both do their
//! actual work inside the actor, so the loops here only keep time.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::info;

use crate::actor::Command;

pub(crate) fn start_dedup_sweep_task(
    cmd_tx: mpsc::Sender<Command>,
    running: Arc<RwLock<bool>>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("dedup sweep task started");
        loop {
            tokio::time::sleep(interval).await;
            if !*running.read().await {
                break;
            }
            if cmd_tx.send(Command::DedupSweep).await.is_err() {
                break;
            }
        }
        info!("dedup sweep task stopped");
    })
}

pub(crate) fn start_health_sweep_task(
    cmd_tx: mpsc::Sender<Command>,
    running: Arc<RwLock<bool>>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("health sweep task started");
        loop {
            tokio::time::sleep(interval).await;
            if !*running.read().await {
                break;
            }
            if cmd_tx.send(Command::HealthSweep).await.is_err() {
                break;
            }
        }
        info!("health sweep task stopped");
    })
}
