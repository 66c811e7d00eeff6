//! Pulse: every entity lives through its whole lifecycle on one connection.
//!
//! Each entity is spawned, released, frozen again and despawned on its own
//! reused connection, with a pause after each step. All entities run in
//! parallel; a final settle follows once every one of them is done.

use cubewright_core::{Command, Entity};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

use crate::core::{Batch, BatchReport, Engine, Operation, Record, Strategy};

/// Pauses between lifecycle steps, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PulseTiming {
    pub after_spawn_ms: u64,
    pub after_release_ms: u64,
    pub after_refreeze_ms: u64,
    pub settle_ms: u64,
}

impl Default for PulseTiming {
    fn default() -> Self {
        Self {
            after_spawn_ms: 1000,
            after_release_ms: 1000,
            after_refreeze_ms: 2000,
            settle_ms: 5000,
        }
    }
}

impl PulseTiming {
    pub fn none() -> Self {
        Self {
            after_spawn_ms: 0,
            after_release_ms: 0,
            after_refreeze_ms: 0,
            settle_ms: 0,
        }
    }
}

/// The four-step lifecycle for one entity, as one group.
pub fn lifecycle(entity: Entity, timing: &PulseTiming) -> Vec<Operation> {
    let remote = entity.remote_name.clone();
    vec![
        Operation::new(Command::spawn(&entity))
            .recording(Record::Entity(entity))
            .then_wait(Duration::from_millis(timing.after_spawn_ms)),
        Operation::new(Command::freeze(remote.clone(), false))
            .with_label(format!("release:{}", remote))
            .then_wait(Duration::from_millis(timing.after_release_ms)),
        Operation::new(Command::freeze(remote.clone(), true))
            .with_label(format!("refreeze:{}", remote))
            .then_wait(Duration::from_millis(timing.after_refreeze_ms)),
        Operation::new(Command::despawn(remote)),
    ]
}

/// Pulse every entity and wait for the final settle.
pub async fn pulse(engine: &Engine, entities: Vec<Entity>, timing: &PulseTiming) -> BatchReport {
    let groups = entities
        .into_iter()
        .map(|entity| lifecycle(entity, timing))
        .collect();
    let report = engine
        .run(Batch::grouped("pulse", groups), Strategy::Grouped)
        .await;

    let settle = Duration::from_millis(timing.settle_ms);
    if !settle.is_zero() {
        info!(delay_ms = timing.settle_ms, "Settling after pulse");
        engine.sleeper().sleep(settle).await;
    }
    report
}
