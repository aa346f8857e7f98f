//! Background tasks
//!
//! Periodic loops that feed commands into the mesh actor. Each loop checks
//! the shared running flag after every sleep and exits on its own once the
//! relay is stopping; [`crate::relay::Relay::stop`] additionally aborts the
//! handles so teardown never waits out a sleep.

pub mod gateway_retry;
pub mod maintenance;

pub(crate) use gateway_retry::start_gateway_retry_task;
pub(crate) use maintenance::{start_dedup_sweep_task, start_health_sweep_task};
