//! Choreography events
//!
//! Broadcast bus the orchestrator publishes session, phase, operation and
//! registry events on. Every event is stamped with its position in the
//! bus's stream so observers can tell when they fell behind.

mod bus;
mod types;

pub use bus::{EventBus, EventStream};
pub use types::*;
