//! Batch match runner.
//!
//! Runs a range of seeds in parallel using rayon and aggregates the win
//! counts.

use std::path::{Path, PathBuf};
use std::time::Instant;

use iron_core::factions::FactionId;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::runner::{run_match, MatchReport};
use crate::scenario::Scenario;

/// File name written into the output directory.
pub const RESULTS_FILE: &str = "batch_results.json";

/// Configuration for a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Scenario every game uses; only the seed varies
    pub scenario: Scenario,
    /// Number of games to run
    pub game_count: u32,
    /// Maximum parallel games (0 = use rayon default)
    pub parallel_games: u32,
    /// Seed of the first game
    pub seed_start: u64,
    /// Output directory for results
    pub output_dir: PathBuf,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            scenario: Scenario::skirmish_1v1(),
            game_count: 100,
            parallel_games: 0,
            seed_start: 0,
            output_dir: PathBuf::from("results"),
        }
    }
}

impl BatchConfig {
    /// Create config for a scenario
    pub fn new(scenario: Scenario, game_count: u32) -> Self {
        Self {
            scenario,
            game_count,
            ..Default::default()
        }
    }

    /// Set output directory
    pub fn with_output(mut self, dir: PathBuf) -> Self {
        self.output_dir = dir;
        self
    }

    /// Set seed start
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed_start = seed;
        self
    }
}

/// Aggregate outcome of a batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Games GDI won
    pub gdi_wins: u32,
    /// Games Nod won
    pub nod_wins: u32,
    /// Games that hit the tick limit or ended with both sides gone
    pub draws: u32,
    /// Mean match length in ticks
    pub average_ticks: f64,
}

impl BatchSummary {
    /// Tally a set of reports.
    pub fn from_games(games: &[MatchReport]) -> Self {
        let mut summary = Self::default();
        for game in games {
            match game.winner {
                Some(FactionId::Gdi) => summary.gdi_wins += 1,
                Some(FactionId::Nod) => summary.nod_wins += 1,
                None => summary.draws += 1,
            }
        }
        if !games.is_empty() {
            let total: u64 = games.iter().map(|g| g.ticks).sum();
            summary.average_ticks = total as f64 / games.len() as f64;
        }
        summary
    }
}

/// Error during batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchError {
    /// Seed used
    pub seed: u64,
    /// Error message
    pub message: String,
}

/// Results from a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResults {
    /// Configuration used
    pub config: BatchConfig,
    /// Per-game reports in seed order
    pub games: Vec<MatchReport>,
    /// Aggregate summary
    pub summary: BatchSummary,
    /// Total runtime
    pub duration_seconds: f64,
    /// Games that failed to start
    pub errors: Vec<BatchError>,
}

impl BatchResults {
    /// Save results to JSON file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Load results from JSON file
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(std::io::Error::other)
    }

    /// Where [`BatchResults::save`] puts the file for this batch.
    #[must_use]
    pub fn output_path(&self) -> PathBuf {
        self.config.output_dir.join(RESULTS_FILE)
    }
}

fn run_seeds(config: &BatchConfig) -> Vec<Result<MatchReport, BatchError>> {
    (0..config.game_count)
        .into_par_iter()
        .map(|i| {
            let seed = config.seed_start.wrapping_add(u64::from(i));
            run_match(&config.scenario, seed).map_err(|e| {
                warn!(seed, error = %e, "Game failed");
                BatchError {
                    seed,
                    message: e.to_string(),
                }
            })
        })
        .collect()
}

/// Run a batch of games
pub fn run_batch(config: BatchConfig) -> BatchResults {
    let start = Instant::now();

    info!(
        "Starting batch run: {} games of '{}'",
        config.game_count, config.scenario.name
    );

    // A dedicated pool keeps the limit local to this batch.
    let results = if config.parallel_games > 0 {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel_games as usize)
            .build()
        {
            Ok(pool) => pool.install(|| run_seeds(&config)),
            Err(e) => {
                warn!(error = %e, "Failed to build thread pool, using global pool");
                run_seeds(&config)
            }
        }
    } else {
        run_seeds(&config)
    };

    let (games, errors): (Vec<_>, Vec<_>) = results.into_iter().partition(Result::is_ok);
    let games: Vec<MatchReport> = games.into_iter().filter_map(Result::ok).collect();
    let errors: Vec<BatchError> = errors.into_iter().filter_map(Result::err).collect();

    let summary = BatchSummary::from_games(&games);
    let duration_seconds = start.elapsed().as_secs_f64();

    info!(
        "Batch complete: {} games in {:.1}s (GDI {} / Nod {} / draws {})",
        games.len(),
        duration_seconds,
        summary.gdi_wins,
        summary.nod_wins,
        summary.draws
    );

    BatchResults {
        config,
        games,
        summary,
        duration_seconds,
        errors,
    }
}
