use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::error::{CoreError, Result};

pub const DEFAULT_ADDRESS: &str = "127.0.0.1:14000";
pub const DEFAULT_PASSWORD: &str = "my_secure_password";
pub const DEFAULT_SENTINEL: &str = "<???DONE???---";
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Process-wide connection constants, fixed for the lifetime of a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionParams {
    /// `host:port` of the simulation server
    pub address: String,
    /// Shared secret sent as the first frame of every connection
    pub password: String,
    /// Terminates every frame in both directions
    pub sentinel: String,
    /// Bound on every individual response read
    pub read_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for SessionParams {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
            sentinel: DEFAULT_SENTINEL.to_string(),
            read_timeout: DEFAULT_READ_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl SessionParams {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Default::default()
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    pub fn with_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.sentinel = sentinel.into();
        self
    }

    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Reject parameter sets that would break framing.
    pub fn validate(&self) -> Result<()> {
        if self.address.trim().is_empty() {
            return Err(CoreError::InvalidSession("address is empty".to_string()));
        }
        if self.sentinel.is_empty() {
            return Err(CoreError::InvalidSession("sentinel is empty".to_string()));
        }
        if self.read_timeout.is_zero() {
            return Err(CoreError::InvalidSession(
                "read timeout must be non-zero".to_string(),
            ));
        }
        if self.connect_timeout.is_zero() {
            return Err(CoreError::InvalidSession(
                "connect timeout must be non-zero".to_string(),
            ));
        }
        if self.password.contains(&self.sentinel) {
            return Err(CoreError::SentinelCollision {
                sentinel: self.sentinel.clone(),
                field: "password".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Aborted,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
        }
    }
}

/// One choreography run against the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub status: SessionStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            status: SessionStatus::default(),
            started_at: None,
            completed_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn start(&mut self) {
        self.status = SessionStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn complete(&mut self) {
        self.status = SessionStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    pub fn abort(&mut self) {
        self.status = SessionStatus::Aborted;
        self.completed_at = Some(Utc::now());
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params_are_valid() {
        let params = SessionParams::default();
        assert_eq!(params.address, "127.0.0.1:14000");
        assert_eq!(params.sentinel, "<???DONE???---");
        assert_eq!(params.read_timeout, Duration::from_secs(3));
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_password_containing_sentinel_is_rejected() {
        let params = SessionParams::default().with_password("secret<???DONE???---");
        assert!(matches!(
            params.validate(),
            Err(CoreError::SentinelCollision { .. })
        ));
    }

    #[test]
    fn test_empty_sentinel_is_rejected() {
        let params = SessionParams::default().with_sentinel("");
        assert!(matches!(
            params.validate(),
            Err(CoreError::InvalidSession(_))
        ));
    }

    #[test]
    fn test_zero_timeouts_are_rejected() {
        let params = SessionParams::default().with_connect_timeout(Duration::ZERO);
        let err = params.validate().unwrap_err();
        assert!(err.to_string().contains("connect timeout"));

        let params = SessionParams::default().with_read_timeout(Duration::ZERO);
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_session_lifecycle() {
        let mut session = Session::new();
        assert_eq!(session.status, SessionStatus::Pending);

        session.start();
        assert_eq!(session.status, SessionStatus::Running);
        assert!(session.started_at.is_some());

        session.complete();
        assert_eq!(session.status, SessionStatus::Completed);
        assert!(session.completed_at.is_some());
    }
}
