use async_trait::async_trait;
use cubewright_core::{Command, Phase};

use super::{PhaseContext, PhasePlan};
use crate::core::{Batch, Operation, Record};

/// Create every entity in the structure. Each success is recorded in the
/// registry under the entity's remote name.
pub struct SpawnPhase;

#[async_trait]
impl PhasePlan for SpawnPhase {
    fn phase(&self) -> Phase {
        Phase::Spawn
    }

    async fn plan(&self, ctx: PhaseContext<'_>) -> Batch {
        let operations = ctx
            .structure
            .entities()
            .into_iter()
            .map(|entity| Operation::new(Command::spawn(&entity)).recording(Record::Entity(entity)))
            .collect();
        Batch::new("spawn", operations)
    }
}
