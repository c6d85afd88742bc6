//! Headless match runner for AI-vs-AI testing and determinism checks.
//!
//! Matches run without any presentation layer:
//!
//! - **stdout**: JSON reports
//! - **stderr**: logs (human-readable)
//!
//! # Example
//!
//! ```bash
//! # Run the default skirmish
//! cargo run -p iron_headless -- run
//!
//! # Run a scenario and dump the final entities
//! cargo run -p iron_headless -- run --scenario scenarios/skirmish.ron --snapshot out/final.json
//!
//! # Verify determinism
//! cargo run -p iron_headless -- verify --seed 12345 --runs 5
//! ```

pub mod batch;
pub mod runner;
pub mod scenario;

pub use batch::{run_batch, BatchConfig, BatchResults, BatchSummary};
pub use runner::{run_match, verify_determinism, MatchReport, MatchRunner, Snapshot, VerifyReport};
pub use scenario::{Scenario, ScenarioError};
