mod files;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use events::EventBus;
use orchestrator::{
    bench, pulse, BatchReport, BenchOptions, Config, FailurePolicy, Sequencer, SessionReport,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use files::{load_config, load_structure, write_defaults, CONFIG_FILE, STRUCTURE_FILE};

#[derive(Parser)]
#[command(name = "cubewright")]
#[command(about = "Choreograph entities on a remote simulation server", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ./cubewright.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config and an example structure
    Init {
        #[arg(long)]
        force: bool,
    },
    /// Run the full choreography for a structure
    Run {
        #[arg(short, long, default_value = STRUCTURE_FILE)]
        structure: PathBuf,

        /// Print every event as a JSON line
        #[arg(long)]
        events: bool,

        /// Print the session report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Spawn, release, refreeze and despawn every entity on its own connection
    Pulse {
        #[arg(short, long, default_value = STRUCTURE_FILE)]
        structure: PathBuf,
    },
    /// Time spawn and despawn under each concurrency strategy
    Bench {
        #[arg(short, long, default_value = STRUCTURE_FILE)]
        structure: PathBuf,

        /// Pause between spawn and despawn
        #[arg(long, default_value_t = 1000)]
        settle_ms: u64,

        /// Wait for one reply per command
        #[arg(long)]
        confirm: bool,
    },
    /// List the joints the server reports for one entity
    Joints { cube: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let cwd = std::env::current_dir()?;
    let config = || load_config(&cwd, cli.config.as_deref());

    match cli.command {
        Commands::Init { force } => init_project(&cwd, force).await,
        Commands::Run {
            ref structure,
            events,
            json,
        } => run(&config().await?, structure, events, json).await,
        Commands::Pulse { ref structure } => run_pulse(&config().await?, structure).await,
        Commands::Bench {
            ref structure,
            settle_ms,
            confirm,
        } => {
            let options = BenchOptions {
                settle: Duration::from_millis(settle_ms),
                confirm,
            };
            run_bench(&config().await?, structure, &options).await
        }
        Commands::Joints { ref cube } => joints(&config().await?, cube).await,
    }
}

async fn init_project(dir: &Path, force: bool) -> Result<()> {
    println!("Initializing cubewright in {}", dir.display());
    let written = write_defaults(dir, force).await?;

    println!();
    if written.is_empty() {
        println!("Nothing written.");
    } else {
        println!("Created:");
        for path in &written {
            println!("  {}", path.display());
        }
    }
    println!();
    println!("Next steps:");
    println!("  1. Point [session] address in {} at your server", CONFIG_FILE);
    println!("  2. Run 'cubewright run'");
    Ok(())
}

async fn run(
    config: &Config,
    structure_path: &Path,
    print_events: bool,
    json: bool,
) -> Result<()> {
    let structure = load_structure(structure_path).await?;
    let mut sequencer = Sequencer::from_config(config).context("Failed to set up session")?;

    let mut printer = None;
    if print_events {
        let bus = EventBus::new();
        let mut stream = bus.subscribe();
        printer = Some(tokio::spawn(async move {
            while let Some(envelope) = stream.next().await {
                if let Ok(line) = serde_json::to_string(&envelope) {
                    println!("{}", line);
                }
            }
            if stream.missed() > 0 {
                tracing::warn!(missed = stream.missed(), "Event printer fell behind");
            }
        }));
        sequencer = sequencer.with_event_bus(bus);
    }

    tracing::info!(
        address = %config.session.address,
        structure = %structure.name,
        entities = structure.entities.len(),
        "Starting session"
    );
    let report = sequencer.run(&structure).await;

    // Dropping the sequencer releases the last bus handle and ends the stream.
    drop(sequencer);
    if let Some(printer) = printer {
        printer.await.context("Event printer failed")?;
    }
    let report = report?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_session(&report);
    }

    if config.engine.failure_policy == FailurePolicy::Strict {
        report.ensure_not_aborted()?;
    }
    Ok(())
}

async fn run_pulse(config: &Config, structure_path: &Path) -> Result<()> {
    let structure = load_structure(structure_path).await?;
    let sequencer = Sequencer::from_config(config).context("Failed to set up session")?;

    let report = pulse(sequencer.engine(), structure.entities(), &config.pulse).await;
    println!();
    print_batch(&report);
    println!();
    Ok(())
}

async fn run_bench(config: &Config, structure_path: &Path, options: &BenchOptions) -> Result<()> {
    let structure = load_structure(structure_path).await?;
    let sequencer = Sequencer::from_config(config).context("Failed to set up session")?;

    let results = bench(sequencer.engine(), &structure.entities(), options).await;

    println!();
    println!("Benchmark - {} entities", structure.entities.len());
    println!("════════════════════════════════════════");
    for result in &results {
        println!(
            "  {:<12} {:>6} ms   spawn {}/{}  despawn {}/{}",
            result.strategy.as_str(),
            result.elapsed.as_millis(),
            result.spawn.succeeded,
            result.spawn.attempted,
            result.despawn.succeeded,
            result.despawn.attempted,
        );
    }
    println!();
    Ok(())
}

async fn joints(config: &Config, cube: &str) -> Result<()> {
    let sequencer = Sequencer::from_config(config).context("Failed to set up session")?;
    let joints = sequencer
        .engine()
        .connector()
        .query_joints(cube)
        .await
        .with_context(|| format!("Failed to query joints for {}", cube))?;

    if joints.is_empty() {
        println!("No joints touch {}.", cube);
    } else {
        println!("Joints touching {} ({}):", cube, joints.len());
        for joint in &joints {
            println!("  {}", joint);
        }
    }
    Ok(())
}

fn print_session(report: &SessionReport) {
    println!();
    println!("Session {} - {}", report.session.id, report.session.status.as_str());
    println!("════════════════════════════════════════");
    for phase in &report.phases {
        print_batch(&phase.batch);
    }
    println!();
    println!(
        "  Recorded {} entities and {} links",
        report.entities_recorded, report.links_recorded
    );
    if let Some(phase) = report.aborted_after {
        println!("  Aborted after {}", phase);
    }
    println!();
}

fn print_batch(report: &BatchReport) {
    let icon = if report.is_clean() { "●" } else { "◐" };
    println!(
        "  {} {:<10} {}/{} ok  ({} conn, {} ms)",
        icon,
        report.label,
        report.succeeded,
        report.attempted,
        report.units,
        report.elapsed.as_millis()
    );
    for failure in &report.failures {
        println!("      ✗ {} [{}] {}", failure.label, failure.kind, failure.message);
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cubewright=info,orchestrator=info,wire=info".into()),
        )
        .init();
}
