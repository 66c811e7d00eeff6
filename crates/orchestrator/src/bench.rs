//! Strategy benchmark: spawn and despawn the same entities under each
//! concurrency strategy and time both batches.

use cubewright_core::{Command, Entity};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

use crate::core::{Batch, BatchReport, Engine, Operation, Strategy};

#[derive(Debug, Clone, Serialize)]
pub struct BenchResult {
    pub strategy: Strategy,
    pub spawn: BatchReport,
    pub despawn: BatchReport,
    #[serde(rename = "elapsed_ms", serialize_with = "as_millis")]
    pub elapsed: Duration,
}

fn as_millis<S: serde::Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(value.as_millis() as u64)
}

/// How each strategy is exercised.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchOptions {
    /// Pause between the spawn and despawn batches
    pub settle: Duration,
    /// Read one reply per command, timing full round-trips instead of
    /// writes alone
    pub confirm: bool,
}

impl Default for BenchOptions {
    fn default() -> Self {
        Self {
            settle: Duration::from_secs(1),
            confirm: false,
        }
    }
}

impl BenchOptions {
    fn operation(&self, command: Command) -> Operation {
        let op = Operation::new(command);
        if self.confirm {
            op.awaiting_reply()
        } else {
            op
        }
    }
}

/// Name with trailing digits removed: `head12` and `head3` share `head`.
pub fn family(name: &str) -> &str {
    name.trim_end_matches(|c: char| c.is_ascii_digit())
}

/// Operations grouped by entity family, so the grouped strategy opens one
/// connection per family.
fn grouped_by_family(entities: &[Entity], op: impl Fn(&Entity) -> Operation) -> Vec<Vec<Operation>> {
    let mut families: BTreeMap<&str, Vec<Operation>> = BTreeMap::new();
    for entity in entities {
        families.entry(family(&entity.name)).or_default().push(op(entity));
    }
    families.into_values().collect()
}

/// Run spawn then despawn under `strategy`, pausing for the settle time in
/// between. Nothing is recorded in the registry.
pub async fn bench_strategy(
    engine: &Engine,
    entities: &[Entity],
    strategy: Strategy,
    options: &BenchOptions,
) -> BenchResult {
    let started = Instant::now();

    let spawns = grouped_by_family(entities, |e| options.operation(Command::spawn(e)));
    let spawn = engine
        .run(Batch::grouped(format!("bench-spawn-{}", strategy), spawns), strategy)
        .await;

    if !options.settle.is_zero() {
        engine.sleeper().sleep(options.settle).await;
    }

    let despawns = grouped_by_family(entities, |e| {
        options.operation(Command::despawn(e.remote_name.clone()))
    });
    let despawn = engine
        .run(Batch::grouped(format!("bench-despawn-{}", strategy), despawns), strategy)
        .await;

    let result = BenchResult {
        strategy,
        spawn,
        despawn,
        elapsed: started.elapsed(),
    };
    info!(
        strategy = %strategy,
        entities = entities.len(),
        confirm = options.confirm,
        elapsed_ms = result.elapsed.as_millis() as u64,
        failed = result.spawn.failed() + result.despawn.failed(),
        "Strategy benchmarked"
    );
    result
}

/// Benchmark every strategy in turn.
pub async fn bench(engine: &Engine, entities: &[Entity], options: &BenchOptions) -> Vec<BenchResult> {
    let mut results = Vec::with_capacity(Strategy::ALL.len());
    for strategy in Strategy::ALL {
        results.push(bench_strategy(engine, entities, strategy, options).await);
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phases::test_support::offline_engine;

    #[test]
    fn test_family() {
        assert_eq!(family("head12"), "head");
        assert_eq!(family("neck"), "neck");
        assert_eq!(family("42"), "");
    }

    #[test]
    fn test_grouped_by_family() {
        let entities: Vec<Entity> = ["body1", "head1", "body2", "neck"]
            .iter()
            .map(|name| Entity::new(*name, [0.0, 0.0, 0.0]))
            .collect();
        let groups = grouped_by_family(&entities, |e| Operation::new(Command::spawn(e)));

        let sizes: Vec<usize> = groups.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![2, 1, 1]);
    }

    #[tokio::test]
    async fn test_bench_covers_every_strategy() {
        let engine = offline_engine();
        let entities = vec![
            Entity::new("a1", [0.0, 0.0, 0.0]),
            Entity::new("a2", [0.0, 0.0, 0.0]),
        ];

        let options = BenchOptions {
            settle: Duration::ZERO,
            confirm: false,
        };
        let results = bench(&engine, &entities, &options).await;
        let strategies: Vec<Strategy> = results.iter().map(|r| r.strategy).collect();
        assert_eq!(strategies, Strategy::ALL.to_vec());
        assert_eq!(results[0].spawn.units, 2);
        assert_eq!(results[1].spawn.units, 1);
        assert_eq!(results[2].spawn.units, 1);
        assert_eq!(engine.registry().entity_count(), 0);
    }

    #[test]
    fn test_confirm_reads_replies() {
        let entity = Entity::new("a1", [0.0, 0.0, 0.0]);
        let options = BenchOptions {
            confirm: true,
            ..Default::default()
        };
        assert!(options.operation(Command::spawn(&entity)).expect_reply);
        assert!(!BenchOptions::default().operation(Command::spawn(&entity)).expect_reply);
    }
}
