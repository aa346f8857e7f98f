//! In-memory durable store
//!
//! Upsert-by-id like the real backing store, plus a fail switch and an
//! artificial put delay so tests can exercise the local fallback, retry
//! and teardown paths.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;

use crate::gateway::{DurableStore, StoreError};
use crate::message::{Message, MessageId};

#[derive(Default)]
struct Inner {
    records: HashMap<MessageId, Message>,
    put_count: usize,
    fail: bool,
    delay: Option<Duration>,
}

/// Durable store double backed by a shared map.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent puts fail until switched back.
    pub fn set_fail(&self, fail: bool) {
        self.inner.lock().unwrap().fail = fail;
    }

    /// Make subsequent puts sleep before touching the map.
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.inner.lock().unwrap().delay = delay;
    }

    pub fn get(&self, id: &MessageId) -> Option<Message> {
        self.inner.lock().unwrap().records.get(id).cloned()
    }

    /// Number of distinct stored records.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().records.is_empty()
    }

    /// Total put attempts that reached the store and succeeded.
    pub fn put_count(&self) -> usize {
        self.inner.lock().unwrap().put_count
    }

    pub fn records(&self) -> Vec<Message> {
        self.inner.lock().unwrap().records.values().cloned().collect()
    }
}

impl DurableStore for MemoryStore {
    fn put(
        &self,
        id: &MessageId,
        record: &Message,
    ) -> BoxFuture<'static, Result<(), StoreError>> {
        let inner = self.inner.clone();
        let id = id.clone();
        let record = record.clone();
        Box::pin(async move {
            let delay = inner.lock().unwrap().delay;
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let mut inner = inner.lock().unwrap();
            if inner.fail {
                return Err(StoreError::Unavailable("store offline".to_string()));
            }
            inner.records.insert(id, record);
            inner.put_count += 1;
            Ok(())
        })
    }
}
