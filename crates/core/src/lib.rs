//! Domain model shared by the wire client and the orchestrator.

pub mod domain;
pub mod error;

pub use domain::*;
pub use error::{CoreError, Result};
