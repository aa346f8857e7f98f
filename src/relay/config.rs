//! Relay configuration

use std::fmt;
use std::path::PathBuf;

use crate::message::MAX_HOPS;

/// Configuration for the mesh relay.
///
/// Intervals are in milliseconds so tests can run the full machinery at
/// speed; the defaults match production behavior (1s settle, 10s health
/// sweep, 30s gateway retry, 60s dedup sweep, 5 minute dedup TTL).
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Stable id for this node. If None, a random id is generated.
    pub node_id: Option<String>,

    /// Human-readable name advertised to peers.
    pub display_name: String,

    /// Service id used for advertising and discovery.
    pub service_id: String,

    /// Path to the local database file.
    /// If None, an in-memory database is used (tests/demos only).
    pub db_path: Option<PathBuf>,

    /// Maximum relay hops before a copy is dropped.
    pub max_hops: u8,

    /// How long a seen message id suppresses reprocessing.
    pub dedup_ttl_ms: u64,

    /// How often the dedup cache is proactively swept.
    pub dedup_sweep_interval_ms: u64,

    /// How often pending uploads are retried while connectivity is present.
    pub gateway_retry_interval_ms: u64,

    /// How often pending queues are re-flushed and diagnostics emitted.
    pub health_interval_ms: u64,

    /// Settle delay between a link being established and the session
    /// becoming ready for payload sends.
    pub settle_delay_ms: u64,

    /// Retries per failed transmission before it is parked in the peer's
    /// pending queue.
    pub send_retries: u32,

    /// Backoff unit: retry n waits n times this long.
    pub send_retry_unit_ms: u64,

    /// Capacity of the outward event channel.
    pub event_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            node_id: None,
            display_name: "caravan-node".to_string(),
            service_id: "caravan/relay/0".to_string(),
            db_path: None,
            max_hops: MAX_HOPS,
            dedup_ttl_ms: 5 * 60 * 1000,
            dedup_sweep_interval_ms: 60 * 1000,
            gateway_retry_interval_ms: 30 * 1000,
            health_interval_ms: 10 * 1000,
            settle_delay_ms: 1000,
            send_retries: 3,
            send_retry_unit_ms: 1000,
            event_capacity: 256,
        }
    }
}

impl RelayConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the stable node id.
    pub fn with_node_id(mut self, id: impl Into<String>) -> Self {
        self.node_id = Some(id.into());
        self
    }

    /// Set the advertised display name.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// Set the service id for advertising and discovery.
    pub fn with_service_id(mut self, id: impl Into<String>) -> Self {
        self.service_id = id.into();
        self
    }

    /// Set the database path.
    pub fn with_db_path(mut self, path: PathBuf) -> Self {
        self.db_path = Some(path);
        self
    }

    /// Set the maximum hop count.
    pub fn with_max_hops(mut self, hops: u8) -> Self {
        self.max_hops = hops;
        self
    }

    /// Set the dedup TTL.
    pub fn with_dedup_ttl_ms(mut self, ms: u64) -> Self {
        self.dedup_ttl_ms = ms;
        self
    }

    /// Set the settle delay.
    pub fn with_settle_delay_ms(mut self, ms: u64) -> Self {
        self.settle_delay_ms = ms;
        self
    }

    /// Configuration for testing: identical semantics, fast clocks.
    pub fn for_testing(node_id: impl Into<String>) -> Self {
        Self {
            node_id: Some(node_id.into()),
            display_name: "test-node".to_string(),
            service_id: "caravan/test".to_string(),
            db_path: None,
            max_hops: MAX_HOPS,
            dedup_ttl_ms: 60 * 1000,
            dedup_sweep_interval_ms: 100,
            gateway_retry_interval_ms: 60,
            health_interval_ms: 50,
            settle_delay_ms: 20,
            send_retries: 3,
            send_retry_unit_ms: 25,
            event_capacity: 1024,
        }
    }
}

impl fmt::Display for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) service={} max_hops={}",
            self.display_name,
            self.node_id.as_deref().unwrap_or("<random>"),
            self.service_id,
            self.max_hops
        )
    }
}
