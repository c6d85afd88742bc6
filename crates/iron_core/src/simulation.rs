//! Core simulation loop.
//!
//! [`Simulation`] owns the world, both factions' fog grids and the AI
//! controllers, and advances them one fixed tick at a time.
//!
//! # Determinism
//!
//! A run is a pure function of its [`SimConfig`] and the commands issued:
//! - No floating-point math (uses fixed-point via [`Fixed`])
//! - All randomness comes from ChaCha streams seeded by the config
//! - Entities are always visited in id order
//!
//! # Example
//!
//! ```
//! use iron_core::config::SimConfig;
//! use iron_core::simulation::Simulation;
//!
//! let mut sim = Simulation::new(SimConfig::default()).unwrap();
//! let events = sim.tick();
//! assert_eq!(sim.get_tick(), 1);
//! assert!(events.deaths.is_empty());
//! ```

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::ai::{AiController, AiState};
use crate::buildings::construction_system;
use crate::combat::{
    cooldown_system, particle_system, projectile_system, turret_system, unit_combat_system, ShotEvent,
};
use crate::commands::{apply_command, Command};
use crate::components::{
    BuildingKind, Entity, EntityId, EntityKind, Particle, Projectile, ResourceNode, UnitKind,
};
use crate::config::SimConfig;
use crate::economy::{harvester_system, resource_regen_system, EconomyEvent};
use crate::error::{CommandError, Result};
use crate::factions::{FactionId, PerFaction};
use crate::fog::{fog_system, FogOfWar};
use crate::math::{Fixed, Vec2Fixed};
use crate::movement::{collision_system, movement_system};
use crate::production::{primary_headquarters, production_system, Headquarters, ProductionEvent};
use crate::stats::CONSTRUCTION_TIME;
use crate::world::{DamageEvent, EntityStorage, World};

/// Ticks per second the host is expected to drive.
pub const TICK_RATE: u32 = 60;

/// Events generated during a single tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickEvents {
    /// Every application of damage.
    pub damage: Vec<DamageEvent>,
    /// Units and buildings removed.
    pub deaths: Vec<EntityId>,
    /// Buildings sold.
    pub sold: Vec<EntityId>,
    /// Weapon discharges.
    pub shots: Vec<ShotEvent>,
    /// Harvester activity.
    pub economy: Vec<EconomyEvent>,
    /// Spawns, finished buildings, stalls and placements.
    pub production: Vec<ProductionEvent>,
}

/// The core game simulation.
///
/// # System Execution Order
///
/// Each tick, systems run in this order:
/// 1. **Construction and cooldowns**
/// 2. **Movement and collision**
/// 3. **Per-entity update**: unit combat, turrets, harvesters, field
///    regeneration, production
/// 4. **Projectiles and particles**
/// 5. **AI** decision step for each AI faction
/// 6. **Fog of war** refresh and building discovery
/// 7. **Damage flags** cleared
#[derive(Debug, Clone)]
pub struct Simulation {
    config: SimConfig,
    world: World,
    fog: PerFaction<FogOfWar>,
    ai: Vec<AiController>,
    tick: u64,
}

impl Simulation {
    /// Build the standard skirmish described by `config`.
    ///
    /// Each faction starts with a headquarters, three infantry and one
    /// harvester; iron fields are scattered at random inside the margins.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: SimConfig) -> Result<Self> {
        let mut sim = Self::empty(config)?;

        for faction in FactionId::ALL {
            let origin = sim.config.hq_position(faction);
            let hq = sim.spawn_building(BuildingKind::Headquarters, faction, origin);
            let starting_iron = sim.config.starting_iron;
            if let Some(stockpile) = sim.headquarters_mut(hq) {
                stockpile.iron = starting_iron;
            }
            for i in 0..3 {
                sim.spawn_unit(UnitKind::Infantry, faction, origin + Vec2Fixed::from_ints(50 + 20 * i, 0));
            }
            sim.spawn_unit(UnitKind::Harvester, faction, origin + Vec2Fixed::from_ints(100, 100));
        }

        let margin = sim.config.iron_field_margin;
        let (max_x, max_y) = (sim.config.map_width - margin, sim.config.map_height - margin);
        for _ in 0..sim.config.iron_field_count {
            let x = sim.world.rng.gen_range(margin..=max_x);
            let y = sim.world.rng.gen_range(margin..=max_y);
            sim.spawn_resource_node(Vec2Fixed::from_ints(x, y));
        }

        // Starting units see their surroundings before the first tick.
        fog_system(&mut sim.world, &mut sim.fog);

        tracing::info!(
            seed = sim.config.seed,
            fields = sim.world.resource_nodes.len(),
            ai = ?sim.config.ai_factions,
            "Skirmish created"
        );
        Ok(sim)
    }

    /// Create a simulation with an empty map.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn empty(config: SimConfig) -> Result<Self> {
        config.validate()?;
        let world = World::new(ChaCha8Rng::seed_from_u64(config.seed));
        let fog = PerFaction::from_fn(|_| FogOfWar::new(&config));
        let ai = FactionId::ALL
            .into_iter()
            .filter(|f| config.is_ai(*f))
            .map(|f| AiController::new(f, config.seed))
            .collect();
        Ok(Self {
            config,
            world,
            fog,
            ai,
            tick: 0,
        })
    }

    /// Get the current tick number.
    #[must_use]
    pub const fn get_tick(&self) -> u64 {
        self.tick
    }

    /// Configuration the match was built from.
    #[must_use]
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Read-only access to every roster.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    // ========================================================================
    // Spawning
    // ========================================================================

    /// Spawn a unit centred on `position`.
    pub fn spawn_unit(&mut self, kind: UnitKind, faction: FactionId, position: Vec2Fixed) -> EntityId {
        self.world.spawn(Entity::new_unit(kind, faction, position))
    }

    /// Spawn a finished building with its top-left corner at `top_left`.
    pub fn spawn_building(&mut self, kind: BuildingKind, faction: FactionId, top_left: Vec2Fixed) -> EntityId {
        let mut entity = Entity::new_building(kind, faction, top_left);
        if let EntityKind::Building(building) = &mut entity.kind {
            building.construction_progress = CONSTRUCTION_TIME;
        }
        self.world.spawn(entity)
    }

    /// Spawn a full iron field with its top-left corner at `top_left`.
    pub fn spawn_resource_node(&mut self, top_left: Vec2Fixed) -> EntityId {
        self.world.spawn_resource_node(ResourceNode::new(top_left))
    }

    fn headquarters_mut(&mut self, id: EntityId) -> Option<&mut Headquarters> {
        self.world
            .entities
            .get_mut(id)
            .and_then(|e| e.as_building_mut())
            .and_then(|b| b.headquarters.as_mut())
    }

    // ========================================================================
    // Commands and ticking
    // ========================================================================

    /// Validate and execute a player command.
    ///
    /// A rejected command leaves the simulation unchanged.
    ///
    /// # Errors
    ///
    /// Returns the reason the command was rejected.
    pub fn apply_command(&mut self, command: &Command) -> std::result::Result<(), CommandError> {
        let result = apply_command(&mut self.world, &self.config, command);
        if let Err(error) = &result {
            tracing::debug!(?command, %error, "Command rejected");
        }
        result
    }

    /// Advance the simulation by one tick and return what happened.
    pub fn tick(&mut self) -> TickEvents {
        let map = self.config.map_bounds();

        construction_system(&mut self.world);
        cooldown_system(&mut self.world);

        movement_system(&mut self.world, map);
        collision_system(&mut self.world, map);

        unit_combat_system(&mut self.world);
        turret_system(&mut self.world);
        let economy = harvester_system(&mut self.world);
        self.world.events.economy.extend(economy);
        resource_regen_system(&mut self.world.resource_nodes);
        let production = production_system(&mut self.world);
        self.world.events.production.extend(production);

        projectile_system(&mut self.world);
        particle_system(&mut self.world.particles);

        self.run_ai();

        fog_system(&mut self.world, &mut self.fog);

        for id in self.world.entities.sorted_ids() {
            if let Some(entity) = self.world.entities.get_mut(id) {
                entity.under_attack = false;
            }
        }

        self.tick += 1;

        #[cfg(any(debug_assertions, feature = "debug-validation"))]
        {
            let hash = self.state_hash();
            tracing::trace!(tick = self.tick, state_hash = hash, "Simulation state hash");
        }

        std::mem::take(&mut self.world.events)
    }

    fn run_ai(&mut self) {
        for controller in &mut self.ai {
            let faction = controller.faction();
            let commands = controller.update(&self.world, &self.config, self.fog.get(faction));
            for command in commands {
                if let Err(error) = apply_command(&mut self.world, &self.config, &command) {
                    tracing::debug!(?faction, ?command, %error, "AI command rejected");
                }
            }
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// All units and buildings.
    #[must_use]
    pub fn entities(&self) -> &EntityStorage {
        &self.world.entities
    }

    /// One unit or building.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.world.entities.get(id)
    }

    /// Shells in flight.
    #[must_use]
    pub fn projectiles(&self) -> &[Projectile] {
        &self.world.projectiles
    }

    /// Iron fields.
    #[must_use]
    pub fn resource_nodes(&self) -> &[ResourceNode] {
        &self.world.resource_nodes
    }

    /// Cosmetic particles.
    #[must_use]
    pub fn particles(&self) -> &[Particle] {
        &self.world.particles
    }

    /// Economy state of a faction's primary headquarters.
    #[must_use]
    pub fn headquarters(&self, faction: FactionId) -> Option<&Headquarters> {
        primary_headquarters(&self.world, faction)
    }

    /// A faction's fog grid.
    #[must_use]
    pub fn fog(&self, faction: FactionId) -> &FogOfWar {
        self.fog.get(faction)
    }

    /// Whether `faction` currently sees `point`.
    #[must_use]
    pub fn is_visible(&self, faction: FactionId, point: Vec2Fixed) -> bool {
        self.fog.get(faction).is_visible(point)
    }

    /// Whether `faction` has ever seen `point`.
    #[must_use]
    pub fn is_explored(&self, faction: FactionId, point: Vec2Fixed) -> bool {
        self.fog.get(faction).is_explored(point)
    }

    /// Controller driving `faction`, if it is AI controlled.
    #[must_use]
    pub fn ai_controller(&self, faction: FactionId) -> Option<&AiController> {
        self.ai.iter().find(|c| c.faction() == faction)
    }

    /// Current AI state of `faction`, if it is AI controlled.
    #[must_use]
    pub fn ai_state(&self, faction: FactionId) -> Option<AiState> {
        self.ai_controller(faction).map(AiController::state)
    }

    /// The faction still holding buildings once the other has none.
    ///
    /// `None` while both stand, and also when neither does.
    #[must_use]
    pub fn winner(&self) -> Option<FactionId> {
        let standing = |faction: FactionId| {
            self.world
                .entities
                .iter()
                .any(|e| e.faction == faction && e.is_building())
        };
        match (standing(FactionId::Gdi), standing(FactionId::Nod)) {
            (true, false) => Some(FactionId::Gdi),
            (false, true) => Some(FactionId::Nod),
            _ => None,
        }
    }

    /// Calculate a hash of the gameplay state.
    ///
    /// Cosmetic particles are excluded. Two simulations with identical
    /// state produce identical hashes.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.tick.hash(&mut hasher);

        self.world.entities.len().hash(&mut hasher);
        for entity in self.world.entities.iter_sorted() {
            entity.id.hash(&mut hasher);
            entity.faction.hash(&mut hasher);
            entity.position.hash(&mut hasher);
            entity.health.hash(&mut hasher);
            match &entity.kind {
                EntityKind::Unit(unit) => {
                    unit.kind.hash(&mut hasher);
                    unit.move_target.hash(&mut hasher);
                    unit.formation_target.hash(&mut hasher);
                    unit.target_unit.hash(&mut hasher);
                    unit.cooldown.hash(&mut hasher);
                    if let Some(harvester) = &unit.harvester {
                        harvester.cargo.hash(&mut hasher);
                    }
                }
                EntityKind::Building(building) => {
                    building.kind.hash(&mut hasher);
                    building.cooldown.hash(&mut hasher);
                    building.target_unit.hash(&mut hasher);
                    if let Some(hq) = &building.headquarters {
                        hq.iron.hash(&mut hasher);
                        hq.production_timer.map(Fixed::to_bits).hash(&mut hasher);
                        hq.pending_building.hash(&mut hasher);
                        for item in hq.queue.iter() {
                            item.hash(&mut hasher);
                        }
                    }
                }
            }
        }

        for projectile in &self.world.projectiles {
            projectile.id.hash(&mut hasher);
            projectile.position.hash(&mut hasher);
            projectile.target.hash(&mut hasher);
        }
        for node in &self.world.resource_nodes {
            node.id.hash(&mut hasher);
            node.position.hash(&mut hasher);
            node.remaining.hash(&mut hasher);
        }

        hasher.finish()
    }
}
