use async_trait::async_trait;
use cubewright_core::{Command, Phase};

use super::{PhaseContext, PhasePlan};
use crate::core::{Batch, Operation};

/// Apply the structure's stiffen parameters to every link in the registry.
///
/// Batched mode sends one `set_joint_params` per joint. Otherwise each
/// joint gets its own group with one `set_joint_param` per parameter, so
/// the grouped strategy reuses one connection per joint.
pub struct StiffenPhase;

#[async_trait]
impl PhasePlan for StiffenPhase {
    fn phase(&self) -> Phase {
        Phase::Stiffen
    }

    async fn plan(&self, ctx: PhaseContext<'_>) -> Batch {
        let spec = &ctx.structure.stiffen;
        if spec.params.is_empty() {
            return Batch::new("stiffen", Vec::new());
        }

        let links = ctx.engine.registry().all_links();
        if spec.batched {
            let operations = links
                .iter()
                .map(|link| {
                    Operation::new(Command::set_joint_params(
                        link.joint_name.clone(),
                        spec.params.clone(),
                    ))
                })
                .collect();
            return Batch::new("stiffen", operations);
        }

        let groups = links
            .iter()
            .map(|link| {
                spec.params
                    .iter()
                    .map(|(param, value)| {
                        Operation::new(Command::set_joint_param(
                            link.joint_name.clone(),
                            param.clone(),
                            *value,
                        ))
                        .with_label(format!("set_joint_param:{}:{}", link.joint_name, param))
                    })
                    .collect()
            })
            .collect();
        Batch::grouped("stiffen", groups)
    }
}
