//! Choreography of remote entities on a simulation server.
//!
//! The [`Sequencer`] walks a [`Structure`] through the fixed phase order;
//! each phase becomes a [`Batch`] that the [`Engine`] dispatches over one or
//! many connections and waits for in full.

pub mod bench;
pub mod clock;
pub mod config;
pub mod core;
pub mod error;
pub mod phases;
pub mod pulse;
pub mod registry;
pub mod sequencer;
pub mod state_machine;
pub mod structure;

pub use bench::{bench, bench_strategy, BenchOptions, BenchResult};
pub use clock::{RecordingSleeper, Sleeper, TokioSleeper};
pub use config::{
    Config, DelayConfig, EngineConfig, FailurePolicy, SessionConfig, StrategyConfig,
    DEFAULT_MAX_IN_FLIGHT,
};
pub use crate::core::{Batch, BatchReport, Engine, Operation, OperationFailure, Record, Strategy};
pub use error::{OrchestratorError, Result};
pub use pulse::{pulse, PulseTiming};
pub use registry::EntityRegistry;
pub use sequencer::{PhaseReport, Sequencer, SessionReport};
pub use state_machine::PhaseStateMachine;
pub use structure::Structure;
