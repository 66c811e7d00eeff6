use cubewright_core::{
    Phase, SessionParams, DEFAULT_ADDRESS, DEFAULT_CONNECT_TIMEOUT, DEFAULT_PASSWORD,
    DEFAULT_READ_TIMEOUT, DEFAULT_SENTINEL,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use wire::ReadMode;

use crate::core::Strategy;
use crate::error::Result;
use crate::pulse::PulseTiming;

/// Default cap on simultaneously open connections.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 32;

/// Everything a choreography session can be tuned with.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub session: SessionConfig,
    pub engine: EngineConfig,
    pub strategies: StrategyConfig,
    pub delays: DelayConfig,
    /// Lifecycle pauses for `pulse`
    pub pulse: PulseTiming,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        self.session.to_params().validate()?;
        Ok(())
    }
}

/// Connection constants shared by every connection of a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    pub address: String,
    pub password: String,
    pub sentinel: String,
    pub read_timeout_ms: u64,
    pub connect_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
            sentinel: DEFAULT_SENTINEL.to_string(),
            read_timeout_ms: DEFAULT_READ_TIMEOUT.as_millis() as u64,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT.as_millis() as u64,
        }
    }
}

impl SessionConfig {
    pub fn to_params(&self) -> SessionParams {
        SessionParams::new(self.address.clone())
            .with_password(self.password.clone())
            .with_sentinel(self.sentinel.clone())
            .with_read_timeout(Duration::from_millis(self.read_timeout_ms))
            .with_connect_timeout(Duration::from_millis(self.connect_timeout_ms))
    }
}

/// What the sequencer does when a phase finishes with failed operations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Log and carry on with the next phase.
    #[default]
    BestEffort,
    /// Skip straight to teardown.
    Strict,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// 0 means no limit
    pub max_in_flight: usize,
    pub read_mode: ReadMode,
    pub failure_policy: FailurePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            read_mode: ReadMode::default(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

/// Per-phase concurrency strategy. Link always runs sequentially on one
/// connection and actuation always runs one connection per joint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StrategyConfig {
    pub spawn: Strategy,
    pub decorate: Strategy,
    pub stiffen: Strategy,
    pub release: Strategy,
    pub teardown: Strategy,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            spawn: Strategy::FanOut,
            decorate: Strategy::FanOut,
            stiffen: Strategy::FanOut,
            release: Strategy::FanOut,
            teardown: Strategy::FanOut,
        }
    }
}

impl StrategyConfig {
    pub fn for_phase(&self, phase: Phase) -> Strategy {
        match phase {
            Phase::Spawn => self.spawn,
            Phase::Decorate => self.decorate,
            Phase::Link => Strategy::Sequential,
            Phase::Stiffen => self.stiffen,
            Phase::Release => self.release,
            Phase::Actuate => Strategy::Grouped,
            Phase::Teardown => self.teardown,
        }
    }

    /// Same strategy for every configurable phase.
    pub fn uniform(strategy: Strategy) -> Self {
        Self {
            spawn: strategy,
            decorate: strategy,
            stiffen: strategy,
            release: strategy,
            teardown: strategy,
        }
    }
}

/// Settle delays between phases.
///
/// The server only acknowledges receipt, never physical convergence, so
/// every transition that depends on the simulation having caught up waits
/// a fixed time instead.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DelayConfig {
    pub after_spawn_ms: u64,
    pub after_decorate_ms: u64,
    pub after_link_ms: u64,
    pub after_stiffen_ms: u64,
    pub after_release_ms: u64,
    pub after_actuate_ms: u64,
    pub before_teardown_ms: u64,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            after_spawn_ms: 1000,
            after_decorate_ms: 0,
            after_link_ms: 500,
            after_stiffen_ms: 1000,
            after_release_ms: 2000,
            after_actuate_ms: 0,
            before_teardown_ms: 5000,
        }
    }
}

impl DelayConfig {
    /// No waiting anywhere.
    pub fn none() -> Self {
        Self {
            after_spawn_ms: 0,
            after_decorate_ms: 0,
            after_link_ms: 0,
            after_stiffen_ms: 0,
            after_release_ms: 0,
            after_actuate_ms: 0,
            before_teardown_ms: 0,
        }
    }

    /// Wait before `phase` starts.
    pub fn before(&self, phase: Phase) -> Duration {
        match phase {
            Phase::Teardown => Duration::from_millis(self.before_teardown_ms),
            _ => Duration::ZERO,
        }
    }

    /// Wait after `phase`'s barrier releases.
    pub fn after(&self, phase: Phase) -> Duration {
        let ms = match phase {
            Phase::Spawn => self.after_spawn_ms,
            Phase::Decorate => self.after_decorate_ms,
            Phase::Link => self.after_link_ms,
            Phase::Stiffen => self.after_stiffen_ms,
            Phase::Release => self.after_release_ms,
            Phase::Actuate => self.after_actuate_ms,
            Phase::Teardown => 0,
        };
        Duration::from_millis(ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.session.address, "127.0.0.1:14000");
        assert_eq!(config.session.read_timeout_ms, 3000);
        assert_eq!(config.engine.max_in_flight, DEFAULT_MAX_IN_FLIGHT);
        assert_eq!(config.engine.read_mode, ReadMode::Lenient);
        assert_eq!(config.engine.failure_policy, FailurePolicy::BestEffort);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"engine":{"failure_policy":"strict"}}"#).unwrap();
        assert_eq!(config.engine.failure_policy, FailurePolicy::Strict);
        assert_eq!(config.engine.max_in_flight, DEFAULT_MAX_IN_FLIGHT);
        assert_eq!(config.delays, DelayConfig::default());
    }

    #[test]
    fn test_pulse_section() {
        let config: Config =
            serde_json::from_str(r#"{"pulse":{"after_spawn_ms":10,"settle_ms":0}}"#).unwrap();
        assert_eq!(config.pulse.after_spawn_ms, 10);
        assert_eq!(config.pulse.settle_ms, 0);
        assert_eq!(config.pulse.after_refreeze_ms, PulseTiming::default().after_refreeze_ms);
    }

    #[test]
    fn test_invalid_session_rejected() {
        let mut config = Config::default();
        config.session.sentinel = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_fixed_strategies() {
        let strategies = StrategyConfig::uniform(Strategy::FanOut);
        assert_eq!(strategies.for_phase(Phase::Link), Strategy::Sequential);
        assert_eq!(strategies.for_phase(Phase::Actuate), Strategy::Grouped);
        assert_eq!(strategies.for_phase(Phase::Stiffen), Strategy::FanOut);
    }

    #[test]
    fn test_delays() {
        let delays = DelayConfig::default();
        assert_eq!(delays.before(Phase::Teardown), Duration::from_secs(5));
        assert_eq!(delays.before(Phase::Spawn), Duration::ZERO);
        assert_eq!(delays.after(Phase::Spawn), Duration::from_secs(1));
        assert_eq!(delays.after(Phase::Teardown), Duration::ZERO);
    }
}
