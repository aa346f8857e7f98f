//! Test doubles
//!
//! In-memory implementations of the relay's two external collaborators,
//! used by unit tests and the end-to-end scenarios in `relay::core`. The
//! mesh hub gives tests full control over topology (links, link loss, send
//! failures) without any real radio; the store double records uploads and
//! can be told to fail.

pub mod store;
pub mod transport;

pub use store::MemoryStore;
pub use transport::{MemoryMesh, MeshTransport};
