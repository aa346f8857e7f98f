//! Gateway sync client
//!
//! When a node with connectivity holds a non-delivered message copy, it
//! becomes that copy's gateway: it uploads the record to the durable store
//! and stops relaying it. Gateway election is local and non-negotiated:
//! under split connectivity two disjoint branches may each upload copies of
//! the same logical message, and the store's upsert-by-id semantics make
//! the redundancy harmless.
//!
//! Uploads that fail leave the copy in the local pending store, where the
//! periodic gateway-retry sweep (and the moment connectivity returns)
//! re-attempts them.

use std::sync::Arc;

use futures::future::BoxFuture;
use rusqlite::Connection;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::data::pending::{list_pending, remove_pending};
use crate::message::{Message, MessageId, NodeId};
use crate::relay::events::{EventSender, MessageChange};

/// Errors from the durable store collaborator.
#[derive(Debug, Clone)]
pub enum StoreError {
    /// Store unreachable.
    Unavailable(String),
    /// Store rejected the record.
    Rejected(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Unavailable(e) => write!(f, "store unavailable: {}", e),
            StoreError::Rejected(e) => write!(f, "store rejected record: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

/// The durable backing store collaborator.
///
/// One operation: an idempotent upsert keyed by message id. Concurrent
/// writers for the same id are safe; the last writer determines the
/// delivering-node attribution, but the content is identical. The core
/// needs no read path.
pub trait DurableStore: Send + Sync + 'static {
    fn put(&self, id: &MessageId, record: &Message)
        -> BoxFuture<'static, Result<(), StoreError>>;
}

/// Uploads message copies to the durable store, with local persistent
/// fallback on failure.
#[derive(Clone)]
pub struct GatewayClient {
    node_id: NodeId,
    store: Arc<dyn DurableStore>,
    db: Arc<Mutex<Connection>>,
    events: EventSender,
}

impl GatewayClient {
    pub(crate) fn new(
        node_id: NodeId,
        store: Arc<dyn DurableStore>,
        db: Arc<Mutex<Connection>>,
        events: EventSender,
    ) -> Self {
        Self {
            node_id,
            store,
            db,
            events,
        }
    }

    /// Upload one copy. Returns whether the store confirmed it.
    ///
    /// On success the record is written delivered, with this node as the
    /// delivering node, and the local pending record is cleared. On failure
    /// the pending record stays (the caller wrote it before handing off)
    /// and the retry sweep owns the follow-up.
    pub async fn upload(&self, message: &Message) -> bool {
        if message.delivered {
            return true;
        }

        let mut record = message.clone();
        record.mark_delivered(&self.node_id);

        match self.store.put(&record.id, &record).await {
            Ok(()) => {
                {
                    let db = self.db.lock().await;
                    if let Err(e) = remove_pending(&db, &record.id) {
                        warn!(message_id = %record.short_id(), error = %e,
                            "failed to clear pending record after upload");
                    }
                }
                info!(message_id = %record.short_id(), "message uploaded to durable store");
                self.events
                    .status(format!("uploaded message {}", record.short_id()));
                self.events.message(record, MessageChange::Delivered);
                true
            }
            Err(e) => {
                warn!(message_id = %record.short_id(), error = %e,
                    "upload failed, keeping local fallback");
                self.events.status(format!(
                    "upload failed for {}, will retry: {}",
                    message.short_id(),
                    e
                ));
                false
            }
        }
    }

    /// Re-attempt upload for every record in the local fallback.
    ///
    /// Records already marked delivered are removed instead of re-uploaded.
    /// Returns how many uploads succeeded.
    pub async fn retry_pending(&self) -> usize {
        let backlog = {
            let db = self.db.lock().await;
            match list_pending(&db) {
                Ok(messages) => messages,
                Err(e) => {
                    warn!(error = %e, "failed to list pending messages");
                    return 0;
                }
            }
        };

        if backlog.is_empty() {
            return 0;
        }
        debug!(count = backlog.len(), "retrying pending uploads");

        let mut uploaded = 0;
        for message in backlog {
            if message.delivered {
                let db = self.db.lock().await;
                if let Err(e) = remove_pending(&db, &message.id) {
                    warn!(message_id = %message.short_id(), error = %e,
                        "failed to remove delivered pending record");
                }
                continue;
            }
            if self.upload(&message).await {
                uploaded += 1;
            }
        }

        if uploaded > 0 {
            info!(uploaded = uploaded, "pending uploads flushed");
        }
        uploaded
    }
}
