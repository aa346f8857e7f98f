//! Relay public surface
//!
//! [`Relay`] is the handle an application holds: start it with a transport
//! and a durable store, publish messages, feed it connectivity changes, and
//! read outward events. Everything else in the crate serves this surface.

pub mod config;
pub mod core;
pub mod error;
pub mod events;

pub use config::RelayConfig;
pub use core::Relay;
pub use error::RelayError;
pub use events::{MessageChange, MessageUpdate, RelayEvent, SessionInfo};
