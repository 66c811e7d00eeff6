use cubewright_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("Connection to {address} failed: {reason}")]
    Connect { address: String, reason: String },

    #[error("Write failed: {0}")]
    Write(#[source] std::io::Error),

    #[error("No sentinel within the read deadline ({received} bytes received)")]
    ReadTimeout { received: usize },

    #[error("Read failed: {0}")]
    Read(String),

    #[error("Response could not be decoded: {0}")]
    Decode(String),

    #[error("JSON serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Sentinel {sentinel:?} occurs inside the message body")]
    SentinelCollision { sentinel: String },

    #[error("Invalid session parameters: {0}")]
    InvalidParams(#[from] CoreError),
}

impl WireError {
    /// Short tag used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect_failure",
            Self::Write(_) | Self::Serialization(_) | Self::SentinelCollision { .. } => {
                "write_failure"
            }
            Self::ReadTimeout { .. } => "read_timeout",
            Self::Read(_) => "read_failure",
            Self::Decode(_) => "decode_failure",
            Self::InvalidParams(_) => "configuration",
        }
    }

    /// Whether the connection the error happened on is no longer usable.
    ///
    /// Encode failures are raised before anything reaches the socket, so the
    /// stream is still in step with the server.
    pub fn breaks_connection(&self) -> bool {
        matches!(
            self,
            Self::Connect { .. } | Self::Write(_) | Self::ReadTimeout { .. } | Self::Read(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, WireError>;
