use async_trait::async_trait;
use cubewright_core::{Command, Phase};

use super::{PhaseContext, PhasePlan};
use crate::core::{Batch, Operation};
use crate::structure::Structure;

pub struct DecoratePhase;

#[async_trait]
impl PhasePlan for DecoratePhase {
    fn phase(&self) -> Phase {
        Phase::Decorate
    }

    fn applies(&self, structure: &Structure) -> bool {
        !structure.colors.is_empty()
    }

    async fn plan(&self, ctx: PhaseContext<'_>) -> Batch {
        let operations = ctx
            .structure
            .colors
            .iter()
            .map(|(name, hex)| Operation::new(Command::set_color(ctx.structure.resolve(name), hex)))
            .collect();
        Batch::new("decorate", operations)
    }
}
