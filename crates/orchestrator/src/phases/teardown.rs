use async_trait::async_trait;
use cubewright_core::{Command, Phase};

use super::{PhaseContext, PhasePlan};
use crate::core::{Batch, Operation};

/// Despawn every entity ever recorded, including ones already gone remotely.
pub struct TeardownPhase;

#[async_trait]
impl PhasePlan for TeardownPhase {
    fn phase(&self) -> Phase {
        Phase::Teardown
    }

    async fn plan(&self, ctx: PhaseContext<'_>) -> Batch {
        let operations = ctx
            .engine
            .registry()
            .all_entities()
            .into_iter()
            .map(|entity| Operation::new(Command::despawn(entity.remote_name)))
            .collect();
        Batch::new("teardown", operations)
    }
}
