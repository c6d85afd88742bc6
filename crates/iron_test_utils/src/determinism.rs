//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the simulation produces identical
//! results given identical inputs.
//!
//! # Testing Strategy
//!
//! Sources of non-determinism this harness is meant to catch:
//!
//! - **Floating-point math**: we use fixed-point arithmetic via
//!   [`iron_core::math::Fixed`] throughout.
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   Order-sensitive passes iterate in sorted entity ID order.
//!
//! - **Unseeded randomness**: the world and every AI controller draw from
//!   ChaCha streams derived from the configured seed.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use iron_core::simulation::Simulation;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for deterministic simulation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the simulation was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the simulation produced different hashes across runs.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a simulation multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run the simulation
/// * `ticks` - Number of ticks to simulate per run
/// * `setup` - Function to create initial simulation state
/// * `step` - Function to advance simulation by one tick
/// * `hash` - Function to compute state hash
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..ticks {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Run two identical simulations and compare their final state hashes.
pub fn verify_simulation_determinism<F>(setup_fn: F, num_ticks: u64) -> bool
where
    F: Fn() -> Simulation,
{
    let result = verify_determinism(
        2,
        num_ticks,
        &setup_fn,
        |sim| {
            sim.tick();
        },
        Simulation::state_hash,
    );
    result.is_deterministic
}

/// Run N simulations on scoped threads and collect final hashes.
///
/// # Panics
///
/// Panics if a simulation thread panics.
pub fn run_parallel_simulations<F>(setup_fn: F, num_sims: usize, num_ticks: u64) -> Vec<u64>
where
    F: Fn() -> Simulation + Sync,
{
    thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                s.spawn(|| {
                    let mut sim = setup_fn();
                    for _ in 0..num_ticks {
                        sim.tick();
                    }
                    sim.state_hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().expect("simulation thread panicked"))
            .collect()
    })
}

/// Compare two simulation runs tick-by-tick, finding first divergence.
///
/// # Returns
///
/// `None` if simulations are deterministic, `Some(tick)` if they diverge
/// at that tick.
pub fn find_first_divergence<F>(setup_fn: F, num_ticks: u64) -> Option<u64>
where
    F: Fn() -> Simulation,
{
    let mut sim1 = setup_fn();
    let mut sim2 = setup_fn();

    if sim1.state_hash() != sim2.state_hash() {
        return Some(0);
    }

    for tick in 1..=num_ticks {
        sim1.tick();
        sim2.tick();

        if sim1.state_hash() != sim2.state_hash() {
            return Some(tick);
        }
    }

    None
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for simulation inputs.
pub mod strategies {
    use iron_core::components::{BuildingKind, ProducibleKind, UnitKind};
    use iron_core::factions::FactionId;
    use iron_core::math::Vec2Fixed;
    use proptest::prelude::*;

    /// A point on the default 1600x800 map.
    pub fn arb_map_position() -> impl Strategy<Value = Vec2Fixed> {
        (0i32..1600, 0i32..800).prop_map(|(x, y)| Vec2Fixed::from_ints(x, y))
    }

    /// Either faction.
    pub fn arb_faction() -> impl Strategy<Value = FactionId> {
        prop_oneof![Just(FactionId::Gdi), Just(FactionId::Nod)]
    }

    /// Any unit kind.
    pub fn arb_unit_kind() -> impl Strategy<Value = UnitKind> {
        prop_oneof![
            Just(UnitKind::Infantry),
            Just(UnitKind::Tank),
            Just(UnitKind::Harvester),
        ]
    }

    /// Any building kind.
    pub fn arb_building_kind() -> impl Strategy<Value = BuildingKind> {
        proptest::sample::select(BuildingKind::ALL.to_vec())
    }

    /// Any producible item.
    pub fn arb_producible() -> impl Strategy<Value = ProducibleKind> {
        prop_oneof![
            arb_unit_kind().prop_map(ProducibleKind::Unit),
            arb_building_kind().prop_map(ProducibleKind::Building),
        ]
    }

    /// A match seed.
    pub fn arb_seed() -> impl Strategy<Value = u64> {
        any::<u64>()
    }

    /// Parameters for spawning a test unit.
    #[derive(Debug, Clone)]
    pub struct TestUnitParams {
        /// Unit kind.
        pub kind: UnitKind,
        /// Owning faction.
        pub faction: FactionId,
        /// Centre position.
        pub position: Vec2Fixed,
    }

    /// Generate parameters for a test unit.
    pub fn arb_unit_params() -> impl Strategy<Value = TestUnitParams> {
        (arb_unit_kind(), arb_faction(), arb_map_position()).prop_map(|(kind, faction, position)| {
            TestUnitParams {
                kind,
                faction,
                position,
            }
        })
    }

    /// Generate a list of unit spawn parameters.
    pub fn arb_unit_list(max_units: usize) -> impl Strategy<Value = Vec<TestUnitParams>> {
        proptest::collection::vec(arb_unit_params(), 1..max_units)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{ai_vs_ai_config, bases_only, skirmish_battle};
    use iron_core::commands::Command;
    use iron_core::config::SimConfig;
    use iron_core::factions::FactionId;
    use proptest::prelude::*;

    // =========================================================================
    // Harness tests
    // =========================================================================

    #[test]
    fn test_verify_determinism_simple() {
        let result = verify_determinism(3, 100, || 0u64, |n| *n += 1, |n| *n);

        assert!(result.is_deterministic);
        assert_eq!(result.hashes, vec![100, 100, 100]);
    }

    #[test]
    fn test_non_determinism_is_reported() {
        let result = DeterminismResult {
            is_deterministic: false,
            hashes: vec![1, 2, 1],
            ticks: 10,
        };
        assert_eq!(result.unique_hashes(), vec![1, 2]);
    }

    #[test]
    fn test_compute_hash_is_stable() {
        assert_eq!(compute_hash(&(1u32, "iron")), compute_hash(&(1u32, "iron")));
    }

    // =========================================================================
    // Simulation determinism
    // =========================================================================

    #[test]
    fn test_empty_simulation_determinism() {
        assert!(verify_simulation_determinism(|| bases_only(3), 100));
    }

    #[test]
    fn test_battle_determinism() {
        assert!(verify_simulation_determinism(|| skirmish_battle(11, 12), 400));
    }

    #[test]
    fn test_ai_vs_ai_has_no_divergence() {
        let divergence = find_first_divergence(
            || Simulation::new(ai_vs_ai_config(21)).expect("valid config"),
            600,
        );
        assert!(divergence.is_none(), "diverged at tick {divergence:?}");
    }

    #[test]
    fn test_parallel_simulations_match() {
        let hashes = run_parallel_simulations(
            || Simulation::new(SimConfig::default().with_seed(5)).expect("valid config"),
            4,
            300,
        );
        assert_eq!(hashes.len(), 4);
        assert!(hashes.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_commands_replay_identically() {
        let setup = || {
            let mut sim = skirmish_battle(2, 4);
            let gdi: Vec<_> = sim
                .entities()
                .iter_sorted()
                .filter(|e| e.faction == FactionId::Gdi && e.is_unit())
                .map(|e| e.id)
                .collect();
            let _ = sim.apply_command(&Command::Move {
                faction: FactionId::Gdi,
                units: gdi,
                destination: crate::fixtures::pos(900, 400),
            });
            sim
        };
        let result = verify_determinism(3, 250, setup, |s| {
            s.tick();
        }, Simulation::state_hash);
        result.assert_deterministic();
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(12))]

        /// Random unit layouts replay identically.
        #[test]
        fn prop_random_battles_are_deterministic(units in strategies::arb_unit_list(20)) {
            let setup = || {
                let mut sim = bases_only(9);
                for unit in &units {
                    sim.spawn_unit(unit.kind, unit.faction, unit.position);
                }
                sim
            };
            let result = verify_determinism(2, 150, setup, |s| { s.tick(); }, Simulation::state_hash);
            prop_assert!(result.is_deterministic);
        }

        /// The AI takes the same decisions for the same seed.
        #[test]
        fn prop_seeded_matches_are_deterministic(seed in strategies::arb_seed()) {
            let setup = || Simulation::new(ai_vs_ai_config(seed)).expect("valid config");
            let result = verify_determinism(2, 200, setup, |s| { s.tick(); }, Simulation::state_hash);
            prop_assert!(result.is_deterministic);
        }
    }
}
