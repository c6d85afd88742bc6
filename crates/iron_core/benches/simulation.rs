//! Simulation benchmarks for iron_core.
//!
//! Run with: `cargo bench -p iron_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use iron_core::simulation::Simulation;
use iron_test_utils::fixtures::{ai_vs_ai_config, skirmish_battle};

/// Full-tick throughput for an AI match and a large brawl.
pub fn simulation_benchmark(c: &mut Criterion) {
    c.bench_function("ai_vs_ai_100_ticks", |b| {
        b.iter_batched(
            || Simulation::new(ai_vs_ai_config(42)).expect("valid config"),
            |mut sim| {
                for _ in 0..100 {
                    black_box(sim.tick());
                }
                sim
            },
            BatchSize::SmallInput,
        );
    });

    c.bench_function("battle_60_units_tick", |b| {
        b.iter_batched(
            || skirmish_battle(42, 20),
            |mut sim| black_box(sim.tick()),
            BatchSize::SmallInput,
        );
    });

    c.bench_function("state_hash", |b| {
        let sim = Simulation::new(ai_vs_ai_config(42)).expect("valid config");
        b.iter(|| black_box(sim.state_hash()));
    });
}

criterion_group!(benches, simulation_benchmark);
criterion_main!(benches);
