//! Test fixtures and helpers.
//!
//! Pre-built configurations and battle setups for consistent testing.

use fixed::types::I32F32;
use iron_core::components::{BuildingKind, UnitKind};
use iron_core::config::SimConfig;
use iron_core::factions::FactionId;
use iron_core::math::Vec2Fixed;
use iron_core::simulation::Simulation;

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a position from integer coordinates.
#[must_use]
pub fn pos(x: i32, y: i32) -> Vec2Fixed {
    Vec2Fixed::from_ints(x, y)
}

/// Default configuration with no AI and the given seed.
#[must_use]
pub fn sandbox_config(seed: u64) -> SimConfig {
    SimConfig {
        seed,
        ai_factions: Vec::new(),
        ..SimConfig::default()
    }
}

/// Default configuration with the AI driving both factions.
#[must_use]
pub fn ai_vs_ai_config(seed: u64) -> SimConfig {
    SimConfig {
        seed,
        ai_factions: FactionId::ALL.to_vec(),
        ..SimConfig::default()
    }
}

/// Empty map with both headquarters at their configured corners.
///
/// # Panics
///
/// Panics if the default configuration fails validation.
#[must_use]
pub fn bases_only(seed: u64) -> Simulation {
    let mut sim = Simulation::empty(sandbox_config(seed)).expect("default config is valid");
    for faction in FactionId::ALL {
        let origin = sim.config().hq_position(faction);
        sim.spawn_building(BuildingKind::Headquarters, faction, origin);
    }
    sim
}

/// Two opposing squads a short walk apart in the middle of the map.
///
/// Each side fields `per_side` infantry and half as many tanks.
#[must_use]
pub fn skirmish_battle(seed: u64, per_side: i32) -> Simulation {
    let mut sim = bases_only(seed);
    for i in 0..per_side {
        let row = 300 + (i % 10) * 25;
        let column = (i / 10) * 25;
        sim.spawn_unit(UnitKind::Infantry, FactionId::Gdi, pos(600 - column, row));
        sim.spawn_unit(UnitKind::Infantry, FactionId::Nod, pos(1000 + column, row));
        if i % 2 == 0 {
            sim.spawn_unit(UnitKind::Tank, FactionId::Gdi, pos(520 - column, row));
            sim.spawn_unit(UnitKind::Tank, FactionId::Nod, pos(1080 + column, row));
        }
    }
    sim
}
