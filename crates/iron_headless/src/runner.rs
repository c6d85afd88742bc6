//! Single-match runner.
//!
//! Drives a [`Simulation`] until one faction has no buildings left or the
//! tick limit is reached, tallying kills from the per-tick events.

use std::path::Path;

use iron_core::components::{Entity, Projectile, ResourceNode};
use iron_core::factions::{FactionId, PerFaction};
use iron_core::simulation::{Simulation, TickEvents};
use serde::{Deserialize, Serialize};

use crate::scenario::{Scenario, ScenarioError};

/// Per-faction totals at the end of a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactionReport {
    /// Faction.
    pub faction: FactionId,
    /// Living units.
    pub units: usize,
    /// Living buildings.
    pub buildings: usize,
    /// Iron in the primary headquarters.
    pub iron: u32,
    /// Enemy units and buildings destroyed.
    pub kills: u32,
}

/// Outcome of one match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchReport {
    /// Scenario name.
    pub scenario: String,
    /// Seed the match ran with.
    pub seed: u64,
    /// Ticks simulated.
    pub ticks: u64,
    /// Winning faction; `None` for a draw or timeout.
    pub winner: Option<FactionId>,
    /// State hash after the last tick.
    pub final_hash: u64,
    /// Totals per faction.
    pub factions: Vec<FactionReport>,
}

/// Full entity dump for offline inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Tick the snapshot was taken at.
    pub tick: u64,
    /// Units and buildings in id order.
    pub entities: Vec<Entity>,
    /// Shells in flight.
    pub projectiles: Vec<Projectile>,
    /// Iron fields.
    pub resource_nodes: Vec<ResourceNode>,
}

impl Snapshot {
    /// Capture the current state of `sim`.
    #[must_use]
    pub fn capture(sim: &Simulation) -> Self {
        Self {
            tick: sim.get_tick(),
            entities: sim.entities().iter_sorted().cloned().collect(),
            projectiles: sim.projectiles().to_vec(),
            resource_nodes: sim.resource_nodes().to_vec(),
        }
    }

    /// Write as pretty JSON.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}

/// Runs one match and keeps the running tallies.
#[derive(Debug)]
pub struct MatchRunner {
    scenario_name: String,
    max_ticks: u64,
    sim: Simulation,
    kills: PerFaction<u32>,
}

impl MatchRunner {
    /// Build the scenario's opening state.
    pub fn new(scenario: &Scenario) -> Result<Self, ScenarioError> {
        Ok(Self {
            scenario_name: scenario.name.clone(),
            max_ticks: scenario.max_ticks,
            sim: scenario.build()?,
            kills: PerFaction::default(),
        })
    }

    /// The simulation being driven.
    #[must_use]
    pub fn simulation(&self) -> &Simulation {
        &self.sim
    }

    /// Whether the match has ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.sim.winner().is_some() || self.sim.get_tick() >= self.max_ticks
    }

    /// Advance one tick and update tallies.
    pub fn step(&mut self) -> TickEvents {
        let events = self.sim.tick();
        for hit in events.damage.iter().filter(|d| d.killed) {
            *self.kills.get_mut(hit.attacker_faction) += 1;
        }
        if let Some(winner) = self.sim.winner() {
            tracing::info!(?winner, tick = self.sim.get_tick(), "Match decided");
        }
        events
    }

    /// Run to completion and return the report.
    pub fn run(mut self) -> MatchReport {
        while !self.is_finished() {
            self.step();
        }
        self.report()
    }

    /// Summarise the current state.
    #[must_use]
    pub fn report(&self) -> MatchReport {
        let factions = FactionId::ALL
            .into_iter()
            .map(|faction| {
                let owned = || self.sim.entities().iter().filter(move |e| e.faction == faction);
                FactionReport {
                    faction,
                    units: owned().filter(|e| e.is_unit()).count(),
                    buildings: owned().filter(|e| e.is_building()).count(),
                    iron: self.sim.headquarters(faction).map_or(0, |hq| hq.iron),
                    kills: *self.kills.get(faction),
                }
            })
            .collect();

        MatchReport {
            scenario: self.scenario_name.clone(),
            seed: self.sim.config().seed,
            ticks: self.sim.get_tick(),
            winner: self.sim.winner(),
            final_hash: self.sim.state_hash(),
            factions,
        }
    }
}

/// Run `scenario` with `seed` to completion.
pub fn run_match(scenario: &Scenario, seed: u64) -> Result<MatchReport, ScenarioError> {
    let scenario = scenario.clone().with_seed(seed);
    let runner = MatchRunner::new(&scenario)?;
    Ok(runner.run())
}

/// Result of a determinism check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyReport {
    /// Runs compared.
    pub runs: u32,
    /// Ticks per run.
    pub ticks: u64,
    /// First tick at which some run disagreed with the first, if any.
    pub divergence: Option<u64>,
}

impl VerifyReport {
    /// Whether every run matched tick for tick.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.divergence.is_none()
    }
}

/// Run `scenario` `runs` times and compare per-tick state hashes.
///
/// Each run stops at the scenario's tick limit or when its match is
/// decided; runs of different lengths count as diverging at the first
/// missing tick.
pub fn verify_determinism(scenario: &Scenario, seed: u64, runs: u32) -> Result<VerifyReport, ScenarioError> {
    let scenario = scenario.clone().with_seed(seed);
    let mut reference: Option<Vec<u64>> = None;
    let mut divergence: Option<u64> = None;
    let mut ticks = 0;

    for run in 0..runs {
        let mut runner = MatchRunner::new(&scenario)?;
        let mut hashes = vec![runner.simulation().state_hash()];
        while !runner.is_finished() {
            runner.step();
            hashes.push(runner.simulation().state_hash());
        }
        ticks = runner.simulation().get_tick();

        match &reference {
            None => reference = Some(hashes),
            Some(expected) => {
                let first_mismatch = expected
                    .iter()
                    .zip(&hashes)
                    .position(|(a, b)| a != b)
                    .or_else(|| (expected.len() != hashes.len()).then(|| expected.len().min(hashes.len())));
                if let Some(tick) = first_mismatch {
                    let tick = tick as u64;
                    tracing::warn!(run, tick, "Run diverged");
                    divergence = Some(divergence.map_or(tick, |d| d.min(tick)));
                }
            }
        }
    }

    Ok(VerifyReport {
        runs,
        ticks,
        divergence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn short_scenario(max_ticks: u64) -> Scenario {
        Scenario {
            max_ticks,
            ..Scenario::skirmish_1v1()
        }
    }

    #[test]
    fn test_match_stops_at_tick_limit() {
        let report = run_match(&short_scenario(120), 3).unwrap();
        assert_eq!(report.ticks, 120);
        assert_eq!(report.seed, 3);
        assert_eq!(report.winner, None);
        assert_eq!(report.factions.len(), 2);
        assert!(report.factions.iter().all(|f| f.buildings >= 1));
    }

    #[test]
    fn test_same_seed_same_report() {
        let a = run_match(&short_scenario(300), 17).unwrap();
        let b = run_match(&short_scenario(300), 17).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_verify_reports_no_divergence() {
        let report = verify_determinism(&short_scenario(200), 5, 3).unwrap();
        assert!(report.is_deterministic());
        assert_eq!(report.ticks, 200);
    }

    #[test]
    fn test_snapshot_written_as_json() {
        let runner = MatchRunner::new(&short_scenario(10)).unwrap();
        let snapshot = Snapshot::capture(runner.simulation());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("snapshot.json");
        snapshot.save(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let loaded: Snapshot = serde_json::from_str(&text).unwrap();
        assert_eq!(loaded.entities.len(), snapshot.entities.len());
        assert_eq!(loaded.resource_nodes.len(), 40);
    }
}
