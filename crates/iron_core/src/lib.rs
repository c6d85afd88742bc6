//! # Iron Core
//!
//! Deterministic simulation and decision engine for a two-faction RTS
//! skirmish fought over iron fields.
//!
//! This crate contains **only** simulation logic:
//! - No rendering
//! - No IO beyond parsing configuration text it is handed
//! - No system randomness (seeded ChaCha streams only)
//! - No floating-point math (uses fixed-point)
//!
//! Hosts drive it one tick at a time, issue [`commands::Command`]s on
//! behalf of players, and read back entity state, fog of war and economy
//! counters for display.
//!
//! ## Crate Structure
//!
//! - [`components`] - Entity record and variant payloads
//! - [`world`] - Entity rosters and damage application
//! - [`movement`] - Movement, formations and soft collision
//! - [`combat`] - Targeting, melee, projectiles and particles
//! - [`economy`] - Harvesters and iron fields
//! - [`production`] - Power, build queues, placement and selling
//! - [`fog`] - Per-faction fog of war
//! - [`ai`] - Strategic AI controller
//! - [`simulation`] - Core simulation loop

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod ai;
pub mod buildings;
pub mod combat;
pub mod commands;
pub mod components;
pub mod config;
pub mod economy;
pub mod error;
pub mod factions;
pub mod fog;
pub mod math;
pub mod movement;
pub mod production;
pub mod simulation;
pub mod stats;
pub mod world;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::ai::{AiController, AiState, Tactic};
    pub use crate::commands::Command;
    pub use crate::components::*;
    pub use crate::config::SimConfig;
    pub use crate::economy::{EconomyEvent, Harvester, HarvesterState};
    pub use crate::error::{CommandError, GameError, Result};
    pub use crate::factions::FactionId;
    pub use crate::fog::FogOfWar;
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::production::{Headquarters, ProductionEvent, ProductionQueue};
    pub use crate::simulation::{Simulation, TickEvents};
}
