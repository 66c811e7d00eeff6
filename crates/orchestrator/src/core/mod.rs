//! Core abstractions for batch execution.
//!
//! - [`Operation`] - One command plus what to do around it
//! - [`Batch`] - Grouped operations dispatched together
//! - [`Strategy`] - How a batch maps onto connections
//! - [`Engine`] - Runs a batch and waits for all of it
//! - [`BatchReport`] - What the barrier saw

mod execution;
mod operation;

pub use execution::Engine;
pub use operation::{Batch, BatchReport, Operation, OperationFailure, Record, Strategy};
