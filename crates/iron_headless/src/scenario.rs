//! Scenario loading and configuration.
//!
//! A scenario is a [`SimConfig`] plus match limits, stored as RON.

use std::path::Path;

use iron_core::config::SimConfig;
use iron_core::error::GameError;
use iron_core::factions::FactionId;
use iron_core::simulation::Simulation;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default match length: ten minutes at 60 ticks per second.
pub const DEFAULT_MAX_TICKS: u64 = 36_000;

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// The embedded configuration is unusable.
    #[error("Invalid scenario: {0}")]
    Invalid(#[from] GameError),
}

/// A complete scenario configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Simulation setup.
    pub config: SimConfig,
    /// The match is called a draw after this many ticks.
    pub max_ticks: u64,
}

impl Default for Scenario {
    fn default() -> Self {
        Self::skirmish_1v1()
    }
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        scenario.config.validate()?;
        Ok(scenario)
    }

    /// Load `path` if given, otherwise the standard skirmish.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ScenarioError> {
        path.map_or_else(|| Ok(Self::skirmish_1v1()), Self::load)
    }

    /// Standard skirmish with the AI playing both sides.
    #[must_use]
    pub fn skirmish_1v1() -> Self {
        Self {
            name: "Standard 1v1 Skirmish".to_string(),
            description: "Both factions AI controlled on the default map".to_string(),
            config: SimConfig {
                ai_factions: FactionId::ALL.to_vec(),
                ..SimConfig::default()
            },
            max_ticks: DEFAULT_MAX_TICKS,
        }
    }

    /// Same scenario with a different seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Build the opening state.
    pub fn build(&self) -> Result<Simulation, ScenarioError> {
        Ok(Simulation::new(self.config.clone())?)
    }
}
