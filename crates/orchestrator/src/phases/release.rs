use async_trait::async_trait;
use cubewright_core::{Command, Phase};

use super::{PhaseContext, PhasePlan};
use crate::core::{Batch, Operation};

/// Unfreeze every entity the registry has recorded.
pub struct ReleasePhase;

#[async_trait]
impl PhasePlan for ReleasePhase {
    fn phase(&self) -> Phase {
        Phase::Release
    }

    async fn plan(&self, ctx: PhaseContext<'_>) -> Batch {
        let operations = ctx
            .engine
            .registry()
            .all_entities()
            .into_iter()
            .map(|entity| Operation::new(Command::freeze(entity.remote_name, false)))
            .collect();
        Batch::new("release", operations)
    }
}
