//! Batch execution engine.
//!
//! The engine splits a [`Batch`] into units of work according to a
//! [`Strategy`], spawns one task per unit, and waits for every task before
//! returning. There is no overall deadline and no early exit: a failed
//! operation is logged, reported and abandoned without retry. Only a
//! transport failure gives up the rest of its unit; a command that cannot
//! be encoded fails alone and the connection carries on.

use cubewright_core::Link;
use events::{Event, EventBus};
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use wire::{Connection, Connector, WireError};

use crate::clock::{Sleeper, TokioSleeper};
use crate::registry::EntityRegistry;

use super::operation::{Batch, BatchReport, Operation, OperationFailure, Record, Strategy};

/// Runs batches of remote operations against one server.
#[derive(Clone)]
pub struct Engine {
    connector: Connector,
    registry: Arc<EntityRegistry>,
    limiter: Option<Arc<Semaphore>>,
    sleeper: Arc<dyn Sleeper>,
    event_bus: Option<EventBus>,
}

impl Engine {
    /// Create an engine with no connection limit and wall-clock pauses.
    pub fn new(connector: Connector, registry: Arc<EntityRegistry>) -> Self {
        Self {
            connector,
            registry,
            limiter: None,
            sleeper: Arc::new(TokioSleeper),
            event_bus: None,
        }
    }

    /// Cap how many units may hold a connection at once. 0 removes the cap.
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.limiter = (max_in_flight > 0).then(|| Arc::new(Semaphore::new(max_in_flight)));
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn connector(&self) -> &Connector {
        &self.connector
    }

    pub fn registry(&self) -> &Arc<EntityRegistry> {
        &self.registry
    }

    pub fn sleeper(&self) -> &Arc<dyn Sleeper> {
        &self.sleeper
    }

    pub fn event_bus(&self) -> Option<&EventBus> {
        self.event_bus.as_ref()
    }

    /// Execute `batch` and return once every unit has finished.
    pub async fn run(&self, batch: Batch, strategy: Strategy) -> BatchReport {
        let started = Instant::now();
        let label = batch.label.clone();
        let attempted = batch.len();
        let units = batch.into_units(strategy);

        info!(
            batch = %label,
            strategy = %strategy,
            operations = attempted,
            units = units.len(),
            "Dispatching batch"
        );

        let mut labels = Vec::with_capacity(units.len());
        let mut handles = Vec::with_capacity(units.len());
        for operations in units {
            labels.push(operations.iter().map(|op| op.label.clone()).collect::<Vec<_>>());
            let unit = Unit {
                batch: label.clone(),
                connector: self.connector.clone(),
                registry: Arc::clone(&self.registry),
                limiter: self.limiter.clone(),
                sleeper: Arc::clone(&self.sleeper),
                event_bus: self.event_bus.clone(),
            };
            handles.push(tokio::spawn(unit.run(operations)));
        }

        let mut report = BatchReport::empty(label.clone(), strategy);
        report.attempted = attempted;
        report.units = handles.len();

        // Barrier: every unit reaches a terminal state before we return.
        for (unit_labels, joined) in labels.into_iter().zip(join_all(handles).await) {
            match joined {
                Ok(outcome) => {
                    report.succeeded += outcome.succeeded;
                    report.failures.extend(outcome.failures);
                }
                Err(e) => {
                    warn!(
                        component = "engine",
                        batch = %label,
                        error = %e,
                        "Unit of work did not finish"
                    );
                    report
                        .failures
                        .extend(unit_labels.into_iter().map(|op_label| OperationFailure {
                            label: op_label,
                            kind: "panicked".to_string(),
                            message: e.to_string(),
                        }));
                }
            }
        }

        report.elapsed = started.elapsed();
        info!(
            batch = %label,
            strategy = %strategy,
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failed(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Batch settled"
        );
        report
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("address", &self.connector.params().address)
            .field(
                "max_in_flight",
                &self.limiter.as_ref().map(|_| "bounded").unwrap_or("unbounded"),
            )
            .finish()
    }
}

#[derive(Debug, Default)]
struct UnitOutcome {
    succeeded: usize,
    failures: Vec<OperationFailure>,
}

/// Everything one spawned unit of work needs, owned.
struct Unit {
    batch: String,
    connector: Connector,
    registry: Arc<EntityRegistry>,
    limiter: Option<Arc<Semaphore>>,
    sleeper: Arc<dyn Sleeper>,
    event_bus: Option<EventBus>,
}

impl Unit {
    async fn run(self, operations: Vec<Operation>) -> UnitOutcome {
        let mut outcome = UnitOutcome::default();

        // The permit lives until the connection is closed.
        let _permit = match &self.limiter {
            Some(limiter) => Arc::clone(limiter).acquire_owned().await.ok(),
            None => None,
        };

        let mut conn = match self.connector.connect().await {
            Ok(conn) => conn,
            Err(e) => {
                for op in &operations {
                    self.fail(&mut outcome, &op.label, e.kind(), e.to_string());
                }
                return outcome;
            }
        };

        let mut remaining = operations.into_iter();
        while let Some(op) = remaining.next() {
            match self.execute(&mut conn, &op).await {
                Ok(()) => {
                    outcome.succeeded += 1;
                    if let Some(pause) = op.pause_after.filter(|p| !p.is_zero()) {
                        self.sleeper.sleep(pause).await;
                    }
                }
                Err(e) if !e.breaks_connection() => {
                    self.fail(&mut outcome, &op.label, e.kind(), e.to_string());
                }
                Err(e) => {
                    self.fail(&mut outcome, &op.label, e.kind(), e.to_string());
                    for rest in remaining.by_ref() {
                        self.fail(
                            &mut outcome,
                            &rest.label,
                            "abandoned",
                            format!("connection given up after {} failed", op.label),
                        );
                    }
                    break;
                }
            }
        }

        conn.close().await;
        outcome
    }

    async fn execute(&self, conn: &mut Connection, op: &Operation) -> Result<(), WireError> {
        conn.send(&op.command).await?;
        if op.expect_reply {
            let reply = conn.receive_checked().await?;
            debug!(batch = %self.batch, operation = %op.label, reply = %reply, "Reply received");
        }
        if let Some(record) = &op.record {
            self.apply(record.clone());
        }
        Ok(())
    }

    fn apply(&self, record: Record) {
        let events = match record {
            Record::Entity(entity) => {
                let remote_name = entity.remote_name.clone();
                self.registry.record_entity(entity);
                vec![Event::EntityRecorded { remote_name }]
            }
            Record::Link(link) => vec![self.record_link(link)],
            Record::Links(links) => links.into_iter().map(|l| self.record_link(l)).collect(),
        };
        if let Some(bus) = &self.event_bus {
            for event in events {
                bus.emit(event);
            }
        }
    }

    fn record_link(&self, link: Link) -> Event {
        let joint_name = link.joint_name.clone();
        self.registry.record_link(link);
        Event::LinkRecorded { joint_name }
    }

    fn fail(&self, outcome: &mut UnitOutcome, label: &str, kind: &str, message: String) {
        warn!(
            component = "engine",
            batch = %self.batch,
            operation = %label,
            kind,
            error = %message,
            "Operation abandoned"
        );
        if let Some(bus) = &self.event_bus {
            bus.emit(Event::OperationFailed {
                batch: self.batch.clone(),
                label: label.to_string(),
                kind: kind.to_string(),
                message: message.clone(),
            });
        }
        outcome.failures.push(OperationFailure {
            label: label.to_string(),
            kind: kind.to_string(),
            message,
        });
    }
}
