//! Choreography sequencer.
//!
//! Runs the phases of one session in order, each behind its own barrier,
//! with the configured settle delay after (and, for teardown, before) each
//! phase. The server only confirms receipt of a command, so the delays are
//! the session's whole consistency model.

use cubewright_core::{Phase, Session, SessionStatus};
use events::{Event, EventBus};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use wire::Connector;

use crate::config::{Config, DelayConfig, FailurePolicy, StrategyConfig};
use crate::core::{BatchReport, Engine};
use crate::error::{OrchestratorError, Result};
use crate::phases::{plan_for, PhaseContext};
use crate::registry::EntityRegistry;
use crate::state_machine::PhaseStateMachine;
use crate::structure::Structure;

#[derive(Debug, Clone, Serialize)]
pub struct PhaseReport {
    pub phase: Phase,
    pub batch: BatchReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub session: Session,
    pub phases: Vec<PhaseReport>,
    /// Phase whose failures sent a strict session straight to teardown
    pub aborted_after: Option<Phase>,
    pub entities_recorded: usize,
    pub links_recorded: usize,
}

impl SessionReport {
    pub fn phase(&self, phase: Phase) -> Option<&PhaseReport> {
        self.phases.iter().find(|report| report.phase == phase)
    }

    pub fn total_failed(&self) -> usize {
        self.phases.iter().map(|report| report.batch.failed()).sum()
    }

    /// Error for the phase that aborted the session, if one did.
    pub fn ensure_not_aborted(&self) -> Result<()> {
        match self.aborted_after.and_then(|phase| self.phase(phase)) {
            Some(report) => Err(OrchestratorError::PhaseFailed {
                phase: report.phase,
                failed: report.batch.failed(),
                attempted: report.batch.attempted,
            }),
            None => Ok(()),
        }
    }
}

pub struct Sequencer {
    engine: Engine,
    strategies: StrategyConfig,
    delays: DelayConfig,
    failure_policy: FailurePolicy,
    machine: PhaseStateMachine,
    session: Session,
}

impl Sequencer {
    pub fn new(engine: Engine, config: &Config) -> Self {
        Self {
            engine,
            strategies: config.strategies.clone(),
            delays: config.delays.clone(),
            failure_policy: config.engine.failure_policy,
            machine: PhaseStateMachine::new(),
            session: Session::new(),
        }
    }

    /// Build the engine, connector and a fresh registry from `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let connector =
            Connector::new(config.session.to_params())?.with_read_mode(config.engine.read_mode);
        let engine = Engine::new(connector, Arc::new(EntityRegistry::new()))
            .with_max_in_flight(config.engine.max_in_flight);
        Ok(Self::new(engine, config))
    }

    /// Publish session, phase and registry events on `bus`.
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.engine = self.engine.with_event_bus(bus);
        self
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn current_phase(&self) -> Option<Phase> {
        self.machine.current()
    }

    /// Run the next phase by hand. Fails without side effects if `phase`
    /// does not legally follow the current one, or if this is the first
    /// phase and `structure` is invalid.
    pub async fn advance(&mut self, phase: Phase, structure: &Structure) -> Result<PhaseReport> {
        PhaseStateMachine::validate_transition(self.machine.current(), phase)?;
        if self.machine.current().is_none() {
            self.check_structure(structure)?;
        }
        self.machine.advance(phase)?;
        self.begin_session();
        let report = self.run_phase(phase, structure).await;
        if phase == Phase::Teardown {
            self.finish_session(false);
        }
        Ok(report)
    }

    /// Run the whole choreography.
    ///
    /// Optional phases the structure does not ask for are skipped. Under the
    /// strict failure policy the first phase with a failed operation sends
    /// the session straight to teardown.
    pub async fn run(&mut self, structure: &Structure) -> Result<SessionReport> {
        self.check_structure(structure)?;
        if self.machine.current().is_some() {
            return Err(OrchestratorError::InvalidTransition {
                from: self.machine.current().map(|p| p.as_str()).unwrap_or("start").to_string(),
                to: Phase::Spawn.as_str().to_string(),
            });
        }

        self.begin_session();
        let mut phases = Vec::new();
        let mut aborted_after = None;

        for phase in Phase::ALL {
            if phase == Phase::Teardown {
                break;
            }
            let plan = plan_for(phase);
            if phase.is_optional() && !plan.applies(structure) {
                info!(session_id = %self.session.id, phase = %phase, "Phase skipped");
                continue;
            }

            self.machine.advance(phase)?;
            let report = self.run_phase(phase, structure).await;
            let failed = !report.batch.is_clean();
            phases.push(report);

            if failed && self.failure_policy == FailurePolicy::Strict {
                warn!(
                    component = "sequencer",
                    session_id = %self.session.id,
                    phase = %phase,
                    "Aborting to teardown"
                );
                aborted_after = Some(phase);
                break;
            }
        }

        match aborted_after {
            Some(_) => self.machine.abort_to_teardown()?,
            None => self.machine.advance(Phase::Teardown)?,
        }
        phases.push(self.run_phase(Phase::Teardown, structure).await);
        self.finish_session(aborted_after.is_some());

        Ok(SessionReport {
            session: self.session.clone(),
            phases,
            aborted_after,
            entities_recorded: self.engine.registry().entity_count(),
            links_recorded: self.engine.registry().link_count(),
        })
    }

    fn check_structure(&self, structure: &Structure) -> Result<()> {
        structure.validate()?;
        structure.ensure_frameable(&self.engine.connector().params().sentinel)
    }

    async fn run_phase(&self, phase: Phase, structure: &Structure) -> PhaseReport {
        self.settle(self.delays.before(phase)).await;

        let session_id = self.session.id;
        info!(session_id = %session_id, phase = %phase, "Phase started");
        self.emit(Event::PhaseStarted { session_id, phase });

        let batch = plan_for(phase)
            .plan(PhaseContext {
                engine: &self.engine,
                structure,
            })
            .await;
        let report = self
            .engine
            .run(batch, self.strategies.for_phase(phase))
            .await;

        info!(
            session_id = %session_id,
            phase = %phase,
            attempted = report.attempted,
            failed = report.failed(),
            "Phase completed"
        );
        self.emit(Event::PhaseCompleted {
            session_id,
            phase,
            attempted: report.attempted,
            failed: report.failed(),
        });

        self.settle(self.delays.after(phase)).await;
        PhaseReport {
            phase,
            batch: report,
        }
    }

    async fn settle(&self, delay: Duration) {
        if !delay.is_zero() {
            info!(delay_ms = delay.as_millis() as u64, "Settling");
            self.engine.sleeper().sleep(delay).await;
        }
    }

    fn begin_session(&mut self) {
        if self.session.status == SessionStatus::Pending {
            self.session.start();
            info!(session_id = %self.session.id, "Session started");
            self.emit(Event::SessionStarted {
                session_id: self.session.id,
            });
        }
    }

    fn finish_session(&mut self, aborted: bool) {
        if aborted {
            self.session.abort();
        } else {
            self.session.complete();
        }
        info!(
            session_id = %self.session.id,
            status = self.session.status.as_str(),
            "Session finished"
        );
        self.emit(Event::SessionFinished {
            session_id: self.session.id,
            aborted,
        });
    }

    fn emit(&self, event: Event) {
        if let Some(bus) = self.engine.event_bus() {
            bus.emit(event);
        }
    }
}

impl std::fmt::Debug for Sequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequencer")
            .field("session_id", &self.session.id)
            .field("current", &self.machine.current())
            .field("failure_policy", &self.failure_policy)
            .finish()
    }
}
