//! Batch builders for each phase of a choreography session.
//!
//! Every phase turns the structure definition and the registry's current
//! contents into one [`Batch`]. Builders run when their phase starts, so
//! anything read from the registry reflects every earlier phase.
//!
//! - [`SpawnPhase`] - create every entity
//! - [`DecoratePhase`] - cosmetic colour changes
//! - [`LinkPhase`] - joints between entity pairs and chains
//! - [`StiffenPhase`] - lock every known joint
//! - [`ReleasePhase`] - unfreeze every recorded entity
//! - [`ActuatePhase`] - drive cycles on discovered joints
//! - [`TeardownPhase`] - despawn every recorded entity

mod actuate;
mod decorate;
mod link;
mod release;
mod spawn;
mod stiffen;
mod teardown;

use async_trait::async_trait;
use cubewright_core::Phase;

use crate::core::{Batch, Engine};
use crate::structure::Structure;

pub use actuate::{discover_joints, ActuatePhase};
pub use decorate::DecoratePhase;
pub use link::LinkPhase;
pub use release::ReleasePhase;
pub use spawn::SpawnPhase;
pub use stiffen::StiffenPhase;
pub use teardown::TeardownPhase;

/// What a phase builder may look at.
#[derive(Debug, Clone, Copy)]
pub struct PhaseContext<'a> {
    pub engine: &'a Engine,
    pub structure: &'a Structure,
}

#[async_trait]
pub trait PhasePlan: Send + Sync {
    fn phase(&self) -> Phase;

    /// Whether the structure asks for this phase at all. Only optional
    /// phases ever answer `false`.
    fn applies(&self, _structure: &Structure) -> bool {
        true
    }

    async fn plan(&self, ctx: PhaseContext<'_>) -> Batch;
}

/// Builder for `phase`.
pub fn plan_for(phase: Phase) -> Box<dyn PhasePlan> {
    match phase {
        Phase::Spawn => Box::new(SpawnPhase),
        Phase::Decorate => Box::new(DecoratePhase),
        Phase::Link => Box::new(LinkPhase),
        Phase::Stiffen => Box::new(StiffenPhase),
        Phase::Release => Box::new(ReleasePhase),
        Phase::Actuate => Box::new(ActuatePhase),
        Phase::Teardown => Box::new(TeardownPhase),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use cubewright_core::SessionParams;
    use std::sync::Arc;
    use std::time::Duration;
    use wire::Connector;

    use crate::core::Engine;
    use crate::registry::EntityRegistry;

    /// Engine pointed at a port nobody listens on. Builders never dial
    /// except for joint discovery.
    pub fn offline_engine() -> Engine {
        let params = SessionParams::new("127.0.0.1:1")
            .with_connect_timeout(Duration::from_millis(200))
            .with_read_timeout(Duration::from_millis(200));
        let connector = Connector::new(params).unwrap();
        Engine::new(connector, Arc::new(EntityRegistry::new()))
    }
}
