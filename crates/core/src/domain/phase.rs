use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// One ordered stage of a choreography session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Spawn,
    /// Cosmetic changes such as colour
    Decorate,
    Link,
    /// Apply a fixed parameter set to every known link
    Stiffen,
    /// Unfreeze every registered entity
    Release,
    Actuate,
    Teardown,
}

impl Phase {
    /// Every phase in choreography order.
    pub const ALL: [Phase; 7] = [
        Phase::Spawn,
        Phase::Decorate,
        Phase::Link,
        Phase::Stiffen,
        Phase::Release,
        Phase::Actuate,
        Phase::Teardown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spawn => "spawn",
            Self::Decorate => "decorate",
            Self::Link => "link",
            Self::Stiffen => "stiffen",
            Self::Release => "release",
            Self::Actuate => "actuate",
            Self::Teardown => "teardown",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|phase| phase.as_str() == s)
    }

    /// Optional phases may be skipped without breaking the ordering.
    pub fn is_optional(&self) -> bool {
        matches!(self, Self::Decorate | Self::Actuate)
    }

    pub fn position(&self) -> usize {
        *self as usize
    }

    pub fn next(&self) -> Option<Self> {
        Self::ALL.get(self.position() + 1).copied()
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Phase {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| CoreError::UnknownPhase(s.to_string()))
    }
}
