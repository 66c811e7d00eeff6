use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid session parameters: {0}")]
    InvalidSession(String),

    #[error("Sentinel {sentinel:?} occurs inside {field}")]
    SentinelCollision { sentinel: String, field: String },

    #[error("Unknown phase: {0}")]
    UnknownPhase(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
