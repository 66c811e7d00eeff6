use async_trait::async_trait;
use cubewright_core::{Command, Phase};
use tracing::{info, warn};

use super::{PhaseContext, PhasePlan};
use crate::core::{Batch, Engine, Operation};
use crate::structure::{ActuateSpec, Structure};

/// Drive every joint touching each configured entity through one cycle:
/// enable, forward, hold, reverse, hold, stop. Each joint's cycle is one
/// group on its own connection.
pub struct ActuatePhase;

impl ActuatePhase {
    fn cycle(spec: &ActuateSpec, joint: &str) -> Vec<Operation> {
        let step = |param: &str, value: f64, tag: &str| {
            Operation::new(Command::set_joint_param(joint, param, value))
                .with_label(format!("actuate:{}:{}", joint, tag))
        };
        vec![
            step(&spec.drive_param, 1.0, "drive"),
            step(&spec.rate_param, spec.target_rate, "forward").then_wait(spec.hold()),
            step(&spec.rate_param, -spec.target_rate, "reverse").then_wait(spec.hold()),
            step(&spec.rate_param, 0.0, "stop"),
        ]
    }
}

/// Joints touching `cube_name`, asked from the server.
///
/// Falls back to the first registry link touching the entity when the query
/// fails or comes back empty.
pub async fn discover_joints(engine: &Engine, cube_name: &str) -> Vec<String> {
    match engine.connector().query_joints(cube_name).await {
        Ok(joints) if !joints.is_empty() => {
            info!(entity = cube_name, joints = joints.len(), "Discovered joints");
            return joints;
        }
        Ok(_) => {
            warn!(component = "sequencer", entity = cube_name, "Server reported no joints");
        }
        Err(e) => {
            warn!(
                component = "sequencer",
                entity = cube_name,
                kind = e.kind(),
                error = %e,
                "Joint query failed"
            );
        }
    }

    engine
        .registry()
        .find_link_touching(cube_name)
        .map(|link| vec![link.joint_name])
        .unwrap_or_default()
}

#[async_trait]
impl PhasePlan for ActuatePhase {
    fn phase(&self) -> Phase {
        Phase::Actuate
    }

    fn applies(&self, structure: &Structure) -> bool {
        !structure.actuate.is_empty()
    }

    async fn plan(&self, ctx: PhaseContext<'_>) -> Batch {
        let mut groups = Vec::new();
        for spec in &ctx.structure.actuate {
            let target = ctx.structure.resolve(&spec.entity);
            for joint in discover_joints(ctx.engine, &target).await {
                groups.push(Self::cycle(spec, &joint));
            }
        }
        Batch::grouped("actuate", groups)
    }
}
