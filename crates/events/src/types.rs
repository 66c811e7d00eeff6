//! Event types published during a choreography session

use chrono::{DateTime, Utc};
use cubewright_core::Phase;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Envelope wrapping all events with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique event ID
    pub id: Uuid,
    /// Position in the emitting bus's stream, starting at 0
    pub seq: u64,
    /// When the event occurred
    pub timestamp: DateTime<Utc>,
    /// The actual event
    pub event: Event,
}

impl EventEnvelope {
    /// Create a new event envelope with auto-generated ID and timestamp
    pub fn new(seq: u64, event: Event) -> Self {
        Self {
            id: Uuid::new_v4(),
            seq,
            timestamp: Utc::now(),
            event,
        }
    }
}

/// All possible events in the system
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    // Session events
    #[serde(rename = "session.started")]
    SessionStarted { session_id: Uuid },

    #[serde(rename = "session.finished")]
    SessionFinished { session_id: Uuid, aborted: bool },

    // Phase events
    #[serde(rename = "phase.started")]
    PhaseStarted { session_id: Uuid, phase: Phase },

    /// The phase barrier released
    #[serde(rename = "phase.completed")]
    PhaseCompleted {
        session_id: Uuid,
        phase: Phase,
        attempted: usize,
        failed: usize,
    },

    // Operation events
    /// One operation of a batch was abandoned
    #[serde(rename = "operation.failed")]
    OperationFailed {
        batch: String,
        label: String,
        kind: String,
        message: String,
    },

    // Registry events
    #[serde(rename = "registry.entity_recorded")]
    EntityRecorded { remote_name: String },

    #[serde(rename = "registry.link_recorded")]
    LinkRecorded { joint_name: String },
}

impl Event {
    /// Get the session ID associated with this event, if any
    pub fn session_id(&self) -> Option<Uuid> {
        match self {
            Event::SessionStarted { session_id }
            | Event::SessionFinished { session_id, .. }
            | Event::PhaseStarted { session_id, .. }
            | Event::PhaseCompleted { session_id, .. } => Some(*session_id),
            Event::OperationFailed { .. }
            | Event::EntityRecorded { .. }
            | Event::LinkRecorded { .. } => None,
        }
    }
}
