//! Caravan Core
//!
//! Store-and-forward message relay for small groups of mostly-disconnected
//! peers. Nodes flood messages hop by hop through whatever short-range links
//! exist, hold copies in local storage while nobody can reach the backing
//! store, and the first node that gains connectivity uploads everything it
//! holds.
//!
//! # Module Structure
//!
//! - `relay/`: Public interface (Relay, config, errors, outward events)
//! - `actor/`: The serialized-state mesh actor (sessions, dedup, routing)
//! - `gateway/`: Durable store uploads with local fallback
//! - `data/`: SQLite persistence for held messages
//! - `tasks/`: Background loops (sweeps, gateway retry)
//! - `transport/` + `wire/`: The link-layer seam and the payload codec
//! - `testing/`: In-memory transport and store doubles
//!
//! # Quick Start
//!
//! ```ignore
//! use caravan_core::{Relay, RelayConfig, MessageKind};
//!
//! let relay = Relay::start(config, transport, transport_events, store).await?;
//!
//! // Publish a message; it floods to peers and is uploaded by whichever
//! // node reaches the durable store first
//! let id = relay.publish("hello".to_string(), MessageKind::Chat, None).await?;
//!
//! // Watch progress
//! let mut events = relay.events().unwrap();
//! while let Some(event) = events.recv().await {
//!     println!("{:?}", event);
//! }
//! ```

// Public interface
pub mod relay;

// Relay internals (pub for the test doubles and embedders that need them)
pub mod actor;
pub mod data;
pub mod gateway;
pub mod message;
pub mod tasks;
pub mod testing;
pub mod transport;
pub mod wire;

// Re-export main API types for convenience
pub use gateway::{DurableStore, StoreError};
pub use message::{Message, MessageId, MessageKind, MessageStatus, NodeId, MAX_HOPS};
pub use relay::{
    MessageChange, MessageUpdate, Relay, RelayConfig, RelayError, RelayEvent, SessionInfo,
};
pub use transport::{Transport, TransportError, TransportEvent};
