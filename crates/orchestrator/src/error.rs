use cubewright_core::{CoreError, Phase};
use thiserror::Error;
use wire::WireError;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Invalid phase transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Wire error: {0}")]
    Wire(#[from] WireError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] CoreError),

    #[error("Invalid structure: {0}")]
    InvalidStructure(String),

    #[error("Phase {phase} failed: {failed} of {attempted} operations")]
    PhaseFailed {
        phase: Phase,
        failed: usize,
        attempted: usize,
    },
}

impl OrchestratorError {
    /// Create an invalid structure error.
    pub fn structure(reason: impl Into<String>) -> Self {
        Self::InvalidStructure(reason.into())
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
