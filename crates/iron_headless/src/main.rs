//! Headless Iron RTS match runner.
//!
//! # Usage
//!
//! ```bash
//! # Run a single match and print its report
//! cargo run -p iron_headless -- run --scenario scenarios/skirmish.ron
//!
//! # Run a batch of seeds in parallel
//! cargo run -p iron_headless -- batch --count 100 --output results/
//!
//! # Check that a seed replays identically
//! cargo run -p iron_headless -- verify --seed 12345 --runs 5
//!
//! # Measure tick throughput
//! cargo run -p iron_headless -- benchmark --ticks 36000
//! ```
//!
//! Reports go to stdout as JSON; logs go to stderr. `RUST_LOG` overrides
//! the log level.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use iron_headless::{
    batch::{run_batch, BatchConfig},
    runner::{verify_determinism, MatchRunner, Snapshot},
    scenario::Scenario,
};

#[derive(Parser)]
#[command(name = "iron_headless")]
#[command(about = "Headless Iron RTS match runner")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single match to completion
    Run {
        /// Scenario file to load (RON)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Override the scenario seed
        #[arg(long)]
        seed: Option<u64>,

        /// Override the scenario tick limit
        #[arg(long)]
        max_ticks: Option<u64>,

        /// Write a JSON snapshot of the final entities here
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },

    /// Run a batch of seeds in parallel
    Batch {
        /// Scenario file to load (RON)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Number of games to run
        #[arg(short, long, default_value = "100")]
        count: u32,

        /// Maximum parallel games (0 = auto)
        #[arg(short, long, default_value = "0")]
        parallel: u32,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Starting random seed
        #[arg(long, default_value = "0")]
        seed: u64,
    },

    /// Verify determinism by running same seed multiple times
    Verify {
        /// Scenario file to load (RON)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Seed to verify
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,

        /// Ticks per run
        #[arg(short, long, default_value = "3600")]
        ticks: u64,
    },

    /// Run N ticks for benchmarking
    Benchmark {
        /// Number of ticks to run
        #[arg(short, long, default_value = "36000")]
        ticks: u64,

        /// Scenario file to load (RON)
        #[arg(short, long)]
        scenario: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the JSON reports
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(filter)
        .init();

    let result = match cli.command {
        Commands::Run {
            scenario,
            seed,
            max_ticks,
            snapshot,
        } => cmd_run(scenario.as_deref(), seed, max_ticks, snapshot.as_deref()),
        Commands::Batch {
            scenario,
            count,
            parallel,
            output,
            seed,
        } => cmd_batch(scenario.as_deref(), count, parallel, output, seed),
        Commands::Verify {
            scenario,
            seed,
            runs,
            ticks,
        } => cmd_verify(scenario.as_deref(), seed, runs, ticks),
        Commands::Benchmark { ticks, scenario } => cmd_benchmark(scenario.as_deref(), ticks),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            tracing::error!("{message}");
            ExitCode::FAILURE
        }
    }
}

type CmdResult = Result<(), String>;

fn load_scenario(path: Option<&Path>) -> Result<Scenario, String> {
    let scenario = Scenario::load_or_default(path).map_err(|e| e.to_string())?;
    tracing::info!(name = %scenario.name, seed = scenario.config.seed, "Loaded scenario");
    Ok(scenario)
}

fn print_json<T: Serialize>(value: &T) -> CmdResult {
    let json = serde_json::to_string_pretty(value).map_err(|e| e.to_string())?;
    println!("{json}");
    Ok(())
}

/// Run a single match and print its report
fn cmd_run(
    scenario: Option<&Path>,
    seed: Option<u64>,
    max_ticks: Option<u64>,
    snapshot: Option<&Path>,
) -> CmdResult {
    let mut scenario = load_scenario(scenario)?;
    if let Some(seed) = seed {
        scenario = scenario.with_seed(seed);
    }
    if let Some(max_ticks) = max_ticks {
        scenario.max_ticks = max_ticks;
    }

    let mut runner = MatchRunner::new(&scenario).map_err(|e| e.to_string())?;
    while !runner.is_finished() {
        runner.step();
    }

    if let Some(path) = snapshot {
        Snapshot::capture(runner.simulation())
            .save(path)
            .map_err(|e| format!("Failed to write snapshot {}: {e}", path.display()))?;
        tracing::info!(path = %path.display(), "Snapshot written");
    }

    print_json(&runner.report())
}

/// Run batch of games and write `batch_results.json`
fn cmd_batch(scenario: Option<&Path>, count: u32, parallel: u32, output: PathBuf, seed: u64) -> CmdResult {
    let scenario = load_scenario(scenario)?;
    std::fs::create_dir_all(&output)
        .map_err(|e| format!("Cannot create output directory '{}': {e}", output.display()))?;

    let config = BatchConfig {
        scenario,
        game_count: count,
        parallel_games: parallel,
        seed_start: seed,
        output_dir: output,
    };

    let results = run_batch(config);
    let path = results.output_path();
    results
        .save(&path)
        .map_err(|e| format!("Failed to save results to {}: {e}", path.display()))?;
    tracing::info!(path = %path.display(), "Results saved");

    if !results.errors.is_empty() {
        tracing::warn!(failed = results.errors.len(), "Some games failed");
    }
    print_json(&results.summary)
}

/// Run the same seed several times and compare per-tick hashes
fn cmd_verify(scenario: Option<&Path>, seed: u64, runs: u32, ticks: u64) -> CmdResult {
    let mut scenario = load_scenario(scenario)?;
    scenario.max_ticks = ticks;

    tracing::info!(seed, runs, ticks, "Verifying determinism");
    let report = verify_determinism(&scenario, seed, runs).map_err(|e| e.to_string())?;
    print_json(&report)?;

    match report.divergence {
        None => Ok(()),
        Some(tick) => Err(format!("Runs diverged at tick {tick}")),
    }
}

/// Time a fixed number of ticks
fn cmd_benchmark(scenario: Option<&Path>, ticks: u64) -> CmdResult {
    let scenario = load_scenario(scenario)?;
    let mut sim = scenario.build().map_err(|e| e.to_string())?;

    let start = Instant::now();
    for _ in 0..ticks {
        sim.tick();
    }
    let elapsed = start.elapsed().as_secs_f64();
    let ticks_per_second = if elapsed > 0.0 {
        ticks as f64 / elapsed
    } else {
        f64::INFINITY
    };

    tracing::info!(
        ticks,
        elapsed_seconds = elapsed,
        ticks_per_second,
        entities = sim.entities().len(),
        "Benchmark complete"
    );
    print_json(&serde_json::json!({
        "ticks": ticks,
        "elapsed_seconds": elapsed,
        "ticks_per_second": ticks_per_second,
        "final_hash": sim.state_hash(),
    }))
}
