//! Message deduplication
//!
//! Bounded-time memory of message ids this node has already processed.
//! Suppresses reprocessing even across mesh cycles, independently of what a
//! message's own visited list claims, which matters when another node
//! restarted or its cache went stale.
//!
//! Entries expire after a TTL. `has_seen` evicts a stale entry lazily on
//! read; a periodic sweep removes all stale entries to bound memory
//! independent of read traffic.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::message::MessageId;

/// TTL-bounded set of already-processed message ids.
pub struct DedupCache {
    entries: HashMap<MessageId, Instant>,
    ttl: Duration,
}

impl DedupCache {
    /// Create a cache whose entries expire after `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    /// Record that `id` was processed now.
    pub fn mark_seen(&mut self, id: &MessageId) {
        self.mark_seen_at(id, Instant::now());
    }

    fn mark_seen_at(&mut self, id: &MessageId, now: Instant) {
        self.entries.insert(id.clone(), now);
    }

    /// Whether `id` was processed within the TTL.
    ///
    /// A stale entry is evicted on the spot and reported as unseen.
    pub fn has_seen(&mut self, id: &MessageId) -> bool {
        self.has_seen_at(id, Instant::now())
    }

    fn has_seen_at(&mut self, id: &MessageId, now: Instant) -> bool {
        match self.entries.get(id) {
            Some(&seen_at) if now.duration_since(seen_at) <= self.ttl => true,
            Some(_) => {
                self.entries.remove(id);
                false
            }
            None => false,
        }
    }

    /// Remove every stale entry. Returns how many were evicted.
    pub fn sweep(&mut self) -> usize {
        self.sweep_at(Instant::now())
    }

    fn sweep_at(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries
            .retain(|_, seen_at| now.duration_since(*seen_at) <= ttl);
        before - self.entries.len()
    }

    /// Number of tracked ids (stale entries included until swept).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
