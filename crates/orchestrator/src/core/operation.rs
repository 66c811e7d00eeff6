//! Units of remote work and the batches they are dispatched in.

use cubewright_core::{Command, Entity, Link};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How a batch is spread over connections.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// One connection per operation, all in parallel.
    #[default]
    FanOut,
    /// One connection for the whole batch, strictly in order.
    Sequential,
    /// One connection per group, groups in parallel, in order within a group.
    Grouped,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [Strategy::FanOut, Strategy::Sequential, Strategy::Grouped];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FanOut => "fan_out",
            Self::Sequential => "sequential",
            Self::Grouped => "grouped",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registry append applied once an operation's round-trip succeeds.
#[derive(Debug, Clone)]
pub enum Record {
    Entity(Entity),
    Link(Link),
    /// Links a single server-side bulk command creates
    Links(Vec<Link>),
}

/// One command to deliver, plus what to do around it.
#[derive(Debug, Clone)]
pub struct Operation {
    /// Identifier used in diagnostics
    pub label: String,
    pub command: Command,
    /// Read one reply after sending
    pub expect_reply: bool,
    pub record: Option<Record>,
    /// Hold the connection this long after success before the next command
    pub pause_after: Option<Duration>,
}

impl Operation {
    pub fn new(command: Command) -> Self {
        Self {
            label: format!("{}:{}", command.kind(), command.subject()),
            command,
            expect_reply: false,
            record: None,
            pause_after: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn awaiting_reply(mut self) -> Self {
        self.expect_reply = true;
        self
    }

    pub fn recording(mut self, record: Record) -> Self {
        self.record = Some(record);
        self
    }

    pub fn then_wait(mut self, pause: Duration) -> Self {
        self.pause_after = Some(pause);
        self
    }
}

/// A homogeneous set of operations, kept in groups so the grouped strategy
/// knows which operations share a connection.
#[derive(Debug, Clone)]
pub struct Batch {
    pub label: String,
    pub groups: Vec<Vec<Operation>>,
}

impl Batch {
    /// Independent operations: every operation is its own group.
    pub fn new(label: impl Into<String>, operations: Vec<Operation>) -> Self {
        Self {
            label: label.into(),
            groups: operations.into_iter().map(|op| vec![op]).collect(),
        }
    }

    pub fn grouped(label: impl Into<String>, groups: Vec<Vec<Operation>>) -> Self {
        Self {
            label: label.into(),
            groups,
        }
    }

    pub fn len(&self) -> usize {
        self.groups.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Split into units of work, one connection each.
    pub fn into_units(self, strategy: Strategy) -> Vec<Vec<Operation>> {
        let units: Vec<Vec<Operation>> = match strategy {
            Strategy::FanOut => self
                .groups
                .into_iter()
                .flatten()
                .map(|op| vec![op])
                .collect(),
            Strategy::Sequential => vec![self.groups.into_iter().flatten().collect()],
            Strategy::Grouped => self.groups,
        };
        units.into_iter().filter(|unit| !unit.is_empty()).collect()
    }
}

/// An operation that did not complete.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OperationFailure {
    pub label: String,
    /// `connect_failure`, `write_failure`, `read_timeout`, ... or `abandoned`
    pub kind: String,
    pub message: String,
}

/// What the barrier saw once every unit of a batch finished.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub label: String,
    pub strategy: Strategy,
    pub attempted: usize,
    pub succeeded: usize,
    pub units: usize,
    pub failures: Vec<OperationFailure>,
    #[serde(with = "duration_ms")]
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn empty(label: impl Into<String>, strategy: Strategy) -> Self {
        Self {
            label: label.into(),
            strategy,
            attempted: 0,
            succeeded: 0,
            units: 0,
            failures: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Every unit reached a terminal state.
    pub fn is_settled(&self) -> bool {
        self.succeeded + self.failed() == self.attempted
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

mod duration_ms {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }
}
