use cubewright_core::Phase;

use crate::error::{OrchestratorError, Result};

/// Enforces the choreography order: a phase may only follow the phases
/// before it, and only optional phases may be skipped on the way.
#[derive(Debug, Clone, Default)]
pub struct PhaseStateMachine {
    current: Option<Phase>,
}

impl PhaseStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Phase> {
        self.current
    }

    pub fn is_finished(&self) -> bool {
        self.current == Some(Phase::Teardown)
    }

    pub fn advance(&mut self, to: Phase) -> Result<()> {
        Self::validate_transition(self.current, to)?;
        self.current = Some(to);
        Ok(())
    }

    /// Skip whatever is left and go straight to teardown.
    ///
    /// Only valid once something may have been created and teardown has
    /// not run yet.
    pub fn abort_to_teardown(&mut self) -> Result<()> {
        match self.current {
            Some(phase) if phase != Phase::Teardown => {
                self.current = Some(Phase::Teardown);
                Ok(())
            }
            from => Err(OrchestratorError::InvalidTransition {
                from: from.map(|p| p.as_str()).unwrap_or("start").to_string(),
                to: Phase::Teardown.as_str().to_string(),
            }),
        }
    }

    pub fn validate_transition(from: Option<Phase>, to: Phase) -> Result<()> {
        if Self::allowed_transitions(from).contains(&to) {
            Ok(())
        } else {
            Err(OrchestratorError::InvalidTransition {
                from: from.map(|p| p.as_str()).unwrap_or("start").to_string(),
                to: to.as_str().to_string(),
            })
        }
    }

    /// Phases reachable from `from`: every later phase up to and including
    /// the first required one.
    pub fn allowed_transitions(from: Option<Phase>) -> Vec<Phase> {
        let start = from.map(|p| p.position() + 1).unwrap_or(0);
        let mut allowed = Vec::new();
        for phase in Phase::ALL.iter().skip(start) {
            allowed.push(*phase);
            if !phase.is_optional() {
                break;
            }
        }
        allowed
    }

    pub fn can_transition(from: Option<Phase>, to: Phase) -> bool {
        Self::validate_transition(from, to).is_ok()
    }
}
