//! Strategic AI controller.
//!
//! One controller drives one faction. Every tick it reclassifies its
//! situation, sends scouts, and on its own cadences picks production and
//! launches attack waves. It never touches the world directly: every
//! decision comes out as a [`Command`] that the simulation validates and
//! applies like a human player's input.
//!
//! The controller perceives enemy force sizes through its own fog of war
//! (visible units, discovered buildings). Threat detection and target
//! selection use the true roster.

use std::collections::{BTreeSet, VecDeque};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::buildings::{snap_to_grid, validate_placement};
use crate::commands::Command;
use crate::components::{BuildingKind, Entity, EntityId, ProducibleKind, UnitKind};
use crate::config::SimConfig;
use crate::economy::income_rate;
use crate::factions::FactionId;
use crate::fog::FogOfWar;
use crate::math::{directions_20_deg, Fixed, Vec2Fixed};
use crate::production::{primary_headquarters, Headquarters};
use crate::world::World;

/// Ticks between production decisions.
pub const ACTION_INTERVAL: u32 = 50;

/// Largest attack wave.
pub const MAX_WAVE_SIZE: usize = 25;

/// Ticks between scouting rounds.
pub const SCOUT_INTERVAL: u32 = 200;

/// Enemy units closer than this to the headquarters put the AI on alert.
pub const THREAT_RANGE: i32 = 500;

/// Ticks the AI stays in defensive mode after taking damage.
pub const DEFENSE_COOLDOWN: u32 = 180;

/// Minimum ticks between surprise attacks.
pub const SURPRISE_COOLDOWN: u32 = 300;

/// Per-tick chance of a surprise attack when the gate is open.
const SURPRISE_CHANCE: f64 = 0.1;

/// Surprise attacks only happen while enemy military is below this.
const SURPRISE_MILITARY_LIMIT: usize = 5;

/// Wave interval bounds, inclusive.
const WAVE_INTERVAL_RANGE: (u32, u32) = (150, 250);

/// Iron below which the AI considers itself broke.
const BROKE_IRON: u32 = 300;

/// Income estimate below which the AI considers itself broke.
const LOW_INCOME: i32 = 50;

/// Distance from an existing building at which placements are tried.
const PLACEMENT_OFFSET: i32 = 120;

/// Placements farther than this from the home field are skipped.
const PLACEMENT_FIELD_RANGE: i32 = 600;

/// Priority targets beyond this distance are ignored.
const PRIORITY_TARGET_RANGE: i32 = 250;

/// Scouts dispatched per round.
const SCOUTS_PER_ROUND: usize = 3;

/// Quota scale, in percent.
const QUOTA_SCALE_PERCENT: u32 = 180;

// ============================================================================
// State
// ============================================================================

/// Situation classification, recomputed every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AiState {
    /// Low iron or low income.
    Broke,
    /// Headquarters badly damaged or recently under fire.
    Attacked,
    /// Enemy units near the headquarters.
    Threatened,
    /// Strong enough to press the enemy.
    Aggressive,
    /// Default: grow the base.
    #[default]
    BuildUp,
}

/// How an attack wave is employed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tactic {
    /// Infantry-heavy mix on a priority target.
    Balanced,
    /// Two groups converging on the enemy headquarters.
    Flank,
    /// Everything on one priority target.
    AllIn,
    /// Fall back around the own headquarters.
    Defensive,
}

/// Unit and building quotas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quotas {
    /// Desired harvesters.
    pub harvesters: usize,
    /// Desired infantry.
    pub infantry: usize,
    /// Desired tanks.
    pub tanks: usize,
    /// Desired turrets.
    pub turrets: usize,
}

impl Quotas {
    /// Base ratios scaled by the quota multiplier and truncated.
    #[must_use]
    pub fn scaled() -> Self {
        let scale = |ratio: u32| (ratio * QUOTA_SCALE_PERCENT / 100) as usize;
        Self {
            harvesters: scale(4),
            infantry: scale(6),
            tanks: scale(3),
            turrets: scale(3),
        }
    }
}

/// What the controller knows about the enemy's forces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct EnemyIntel {
    harvesters: usize,
    infantry: usize,
    tanks: usize,
    turrets: usize,
    units: usize,
    buildings: usize,
}

impl EnemyIntel {
    fn gather(world: &World, faction: FactionId, fog: &FogOfWar) -> Self {
        let mut intel = Self::default();
        for entity in world.entities.iter().filter(|e| e.faction != faction) {
            if let Some(kind) = entity.unit_kind() {
                if !fog.is_visible(entity.position) {
                    continue;
                }
                intel.units += 1;
                match kind {
                    UnitKind::Harvester => intel.harvesters += 1,
                    UnitKind::Infantry => intel.infantry += 1,
                    UnitKind::Tank => intel.tanks += 1,
                }
            } else if let Some(building) = entity.as_building() {
                if !building.discovered {
                    continue;
                }
                intel.buildings += 1;
                if building.kind == BuildingKind::Turret {
                    intel.turrets += 1;
                }
            }
        }
        intel
    }

    fn military(&self) -> usize {
        self.tanks + self.infantry + self.turrets
    }
}

/// Own force counts used by the production policy.
#[derive(Debug, Clone, Copy)]
struct OwnForces {
    harvesters: usize,
    infantry: usize,
    tanks: usize,
    turrets: usize,
    power_plants: usize,
    /// Living plus queued.
    barracks: usize,
    /// Living plus queued.
    war_factories: usize,
    living_barracks: bool,
    living_war_factory: bool,
}

impl OwnForces {
    fn count(world: &World, faction: FactionId, hq: &Headquarters) -> Self {
        let queued = |kind| hq.queue.count(ProducibleKind::Building(kind));
        let living_barracks = world.count_buildings(faction, BuildingKind::Barracks);
        let living_war_factories = world.count_buildings(faction, BuildingKind::WarFactory);
        Self {
            harvesters: world.count_units(faction, UnitKind::Harvester),
            infantry: world.count_units(faction, UnitKind::Infantry),
            tanks: world.count_units(faction, UnitKind::Tank),
            turrets: world.count_buildings(faction, BuildingKind::Turret),
            power_plants: world.count_buildings(faction, BuildingKind::PowerPlant),
            barracks: living_barracks + queued(BuildingKind::Barracks),
            war_factories: living_war_factories + queued(BuildingKind::WarFactory),
            living_barracks: living_barracks > 0,
            living_war_factory: living_war_factories > 0,
        }
    }

    fn military(&self) -> usize {
        self.infantry + self.tanks + self.turrets
    }

    fn desired_power_plants(&self) -> usize {
        ((self.harvesters + 1) / 2).max(1)
    }
}

// ============================================================================
// Controller
// ============================================================================

/// Strategic controller for one faction.
#[derive(Debug, Clone)]
pub struct AiController {
    faction: FactionId,
    rng: ChaCha8Rng,
    state: AiState,
    action_timer: u32,
    wave_timer: u32,
    wave_interval: u32,
    waves_launched: u32,
    defense_cooldown: u32,
    surprise_cooldown: u32,
    scout_timer: u32,
    scout_targets: VecDeque<Vec2Fixed>,
    income_rate: Fixed,
    last_tactic: Option<Tactic>,
}

/// Per-faction RNG stream derived from the match seed.
#[must_use]
pub fn controller_seed(seed: u64, faction: FactionId) -> u64 {
    seed ^ 0x9E37_79B9_7F4A_7C15_u64.wrapping_mul(faction.index() as u64 + 1)
}

impl AiController {
    /// Create a controller for `faction` seeded from the match seed.
    #[must_use]
    pub fn new(faction: FactionId, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(controller_seed(seed, faction));
        let wave_interval = rng.gen_range(WAVE_INTERVAL_RANGE.0..=WAVE_INTERVAL_RANGE.1);
        Self {
            faction,
            rng,
            state: AiState::default(),
            action_timer: 0,
            wave_timer: 0,
            wave_interval,
            waves_launched: 0,
            defense_cooldown: 0,
            surprise_cooldown: 0,
            scout_timer: 0,
            scout_targets: VecDeque::new(),
            income_rate: Fixed::ZERO,
            last_tactic: None,
        }
    }

    /// Faction this controller drives.
    #[must_use]
    pub fn faction(&self) -> FactionId {
        self.faction
    }

    /// State computed on the last update.
    #[must_use]
    pub fn state(&self) -> AiState {
        self.state
    }

    /// Attack waves launched so far, surprises included.
    #[must_use]
    pub fn waves_launched(&self) -> u32 {
        self.waves_launched
    }

    /// Tactic of the most recent wave.
    #[must_use]
    pub fn last_tactic(&self) -> Option<Tactic> {
        self.last_tactic
    }

    /// Income estimate computed on the last update.
    #[must_use]
    pub fn income_rate(&self) -> Fixed {
        self.income_rate
    }

    /// Run one decision step and return the commands to issue.
    ///
    /// `fog` is this faction's own fog of war.
    pub fn update(&mut self, world: &World, config: &SimConfig, fog: &FogOfWar) -> Vec<Command> {
        let mut commands = Vec::new();
        let Some(hq_id) = world.primary_hq(self.faction) else {
            return commands;
        };

        self.action_timer += 1;
        self.wave_timer += 1;
        self.surprise_cooldown = self.surprise_cooldown.saturating_sub(1);
        self.defense_cooldown = self.defense_cooldown.saturating_sub(1);
        if world
            .entities
            .iter()
            .any(|e| e.faction == self.faction && e.under_attack)
        {
            self.defense_cooldown = DEFENSE_COOLDOWN;
        }

        let intel = EnemyIntel::gather(world, self.faction, fog);
        self.state = self.evaluate_state(world, hq_id, &intel);

        let mut assigned = BTreeSet::new();
        self.scout(world, config, fog, &mut assigned, &mut commands);

        if self.action_timer >= ACTION_INTERVAL {
            self.action_timer = 0;
            self.produce(world, config, &intel, &mut commands);
        }

        if self.surprise_cooldown == 0
            && intel.military() < SURPRISE_MILITARY_LIMIT
            && self.rng.gen_bool(SURPRISE_CHANCE)
        {
            self.coordinate_attack(world, true, &assigned, &mut commands);
            self.surprise_cooldown = SURPRISE_COOLDOWN;
        } else if self.wave_timer >= self.wave_interval {
            self.coordinate_attack(world, false, &assigned, &mut commands);
        }

        commands
    }

    fn evaluate_state(&mut self, world: &World, hq_id: EntityId, intel: &EnemyIntel) -> AiState {
        let Some(hq_entity) = world.entities.get(hq_id) else {
            return AiState::BuildUp;
        };
        let iron = primary_headquarters(world, self.faction).map_or(0, |hq| hq.iron);
        self.income_rate = income_rate(world, self.faction);

        let health = hq_entity.health;
        let badly_damaged = u64::from(health.current) * 10 < u64::from(health.max) * 6;
        let threat_sq = Fixed::from_num(THREAT_RANGE) * Fixed::from_num(THREAT_RANGE);
        let threatened = world.entities.iter().any(|e| {
            e.faction != self.faction && e.is_unit() && e.position.distance_squared(hq_entity.position) < threat_sq
        });

        if iron < BROKE_IRON || self.income_rate < Fixed::from_num(LOW_INCOME) {
            AiState::Broke
        } else if badly_damaged || self.defense_cooldown > 0 {
            AiState::Attacked
        } else if threatened {
            AiState::Threatened
        } else if self.waves_launched >= 2 || intel.units + intel.buildings > 8 {
            AiState::Aggressive
        } else {
            AiState::BuildUp
        }
    }

    // ========================================================================
    // Scouting
    // ========================================================================

    fn scout(
        &mut self,
        world: &World,
        config: &SimConfig,
        fog: &FogOfWar,
        assigned: &mut BTreeSet<EntityId>,
        commands: &mut Vec<Command>,
    ) {
        if self.scout_timer > 0 {
            self.scout_timer -= 1;
            return;
        }
        self.scout_timer = SCOUT_INTERVAL;

        if self.scout_targets.is_empty() {
            self.scout_targets.extend(world.resource_nodes.iter().map(|n| n.position));
            self.scout_targets.push_back(config.map_center());
            let enemy_hq = world
                .primary_hq(self.faction.opponent())
                .and_then(|id| world.entities.get(id))
                .map(|e| e.position)
                .filter(|p| fog.is_explored(*p));
            if let Some(position) = enemy_hq {
                self.scout_targets.push_back(position);
            }
        }

        let scouts: Vec<EntityId> = self
            .idle_units(world, &[UnitKind::Infantry], assigned)
            .into_iter()
            .take(SCOUTS_PER_ROUND)
            .collect();
        for unit in scouts {
            let Some(destination) = self.scout_targets.pop_front() else {
                break;
            };
            assigned.insert(unit);
            commands.push(Command::Order {
                faction: self.faction,
                unit,
                destination: Some(destination),
                target: None,
            });
        }
    }

    fn idle_units(&self, world: &World, kinds: &[UnitKind], exclude: &BTreeSet<EntityId>) -> Vec<EntityId> {
        world
            .entities
            .iter_sorted()
            .filter(|e| e.faction == self.faction && !exclude.contains(&e.id))
            .filter(|e| {
                e.as_unit()
                    .is_some_and(|u| kinds.contains(&u.kind) && u.is_idle())
            })
            .map(|e| e.id)
            .collect()
    }

    // ========================================================================
    // Production
    // ========================================================================

    fn produce(&mut self, world: &World, config: &SimConfig, intel: &EnemyIntel, commands: &mut Vec<Command>) {
        let Some(hq) = primary_headquarters(world, self.faction) else {
            return;
        };

        if let Some(kind) = hq.pending_building {
            let point = self.find_building_position(world, config, kind);
            commands.push(Command::PlaceBuilding {
                faction: self.faction,
                point,
            });
        }

        if hq.queue.is_full() {
            return;
        }
        let forces = OwnForces::count(world, self.faction, hq);
        if let Some(item) = self.choose_production(hq.iron, hq.has_enough_power(), &forces, intel) {
            tracing::debug!(faction = ?self.faction, state = ?self.state, ?item, iron = hq.iron, "AI production");
            commands.push(Command::Enqueue {
                faction: self.faction,
                item,
            });
        }
    }

    /// Pick at most one item to enqueue.
    fn choose_production(
        &mut self,
        iron: u32,
        powered: bool,
        forces: &OwnForces,
        intel: &EnemyIntel,
    ) -> Option<ProducibleKind> {
        use ProducibleKind::{Building, Unit};

        let quotas = Quotas::scaled();
        let affordable = |item: ProducibleKind| iron >= item.cost();
        let harvester_cap = quotas.harvesters.min(intel.harvesters + 1);
        let low_income = self.income_rate < Fixed::from_num(LOW_INCOME);

        if forces.barracks == 0 && affordable(Building(BuildingKind::Barracks)) {
            return Some(Building(BuildingKind::Barracks));
        }
        if forces.war_factories == 0 && affordable(Building(BuildingKind::WarFactory)) {
            return Some(Building(BuildingKind::WarFactory));
        }
        if powered
            && affordable(Building(BuildingKind::PowerPlant))
            && forces.power_plants < forces.desired_power_plants()
        {
            return Some(Building(BuildingKind::PowerPlant));
        }
        if (forces.harvesters < harvester_cap || low_income)
            && forces.living_war_factory
            && affordable(Unit(UnitKind::Harvester))
        {
            return Some(Unit(UnitKind::Harvester));
        }
        if iron == 0 {
            tracing::debug!(faction = ?self.faction, "AI production halted, no iron");
            return None;
        }

        let infantry_ok = forces.living_barracks
            && affordable(Unit(UnitKind::Infantry))
            && forces.infantry < quotas.infantry;
        let tank_ok = forces.living_war_factory && affordable(Unit(UnitKind::Tank)) && forces.tanks < quotas.tanks;
        let turret_ok = affordable(Building(BuildingKind::Turret)) && forces.turrets < quotas.turrets;
        let power_ok =
            affordable(Building(BuildingKind::PowerPlant)) && forces.power_plants < forces.desired_power_plants();

        let mut options = Vec::new();
        match self.state {
            AiState::BuildUp | AiState::Aggressive => {
                let military = forces.military();
                if military < 6 && infantry_ok {
                    options.push(Unit(UnitKind::Infantry));
                }
                if military < 6 && tank_ok {
                    options.push(Unit(UnitKind::Tank));
                }
                if turret_ok {
                    options.push(Building(BuildingKind::Turret));
                }
                if infantry_ok {
                    options.push(Unit(UnitKind::Infantry));
                }
                if tank_ok {
                    options.push(Unit(UnitKind::Tank));
                }
                if forces.harvesters < quotas.harvesters
                    && forces.living_war_factory
                    && affordable(Unit(UnitKind::Harvester))
                {
                    options.push(Unit(UnitKind::Harvester));
                }
                if power_ok {
                    options.push(Building(BuildingKind::PowerPlant));
                }
                if forces.barracks < 2 && military >= 6 && affordable(Building(BuildingKind::Barracks)) {
                    options.push(Building(BuildingKind::Barracks));
                }
                if forces.war_factories < 2 && military >= 6 && affordable(Building(BuildingKind::WarFactory)) {
                    options.push(Building(BuildingKind::WarFactory));
                }
                if forces.harvesters >= 2 && affordable(Building(BuildingKind::Headquarters)) {
                    options.push(Building(BuildingKind::Headquarters));
                }
            }
            AiState::Attacked | AiState::Threatened => {
                if turret_ok {
                    options.push(Building(BuildingKind::Turret));
                }
                if tank_ok {
                    options.push(Unit(UnitKind::Tank));
                }
                if infantry_ok {
                    options.push(Unit(UnitKind::Infantry));
                }
                if forces.harvesters < harvester_cap
                    && forces.living_war_factory
                    && affordable(Unit(UnitKind::Harvester))
                {
                    options.push(Unit(UnitKind::Harvester));
                }
                if power_ok {
                    options.push(Building(BuildingKind::PowerPlant));
                }
            }
            AiState::Broke => {
                if forces.harvesters < harvester_cap
                    && forces.living_war_factory
                    && affordable(Unit(UnitKind::Harvester))
                {
                    options.push(Unit(UnitKind::Harvester));
                }
            }
        }

        if options.is_empty() {
            return None;
        }
        let pick = self.rng.gen_range(0..options.len());
        Some(options[pick])
    }

    /// Radial search for a valid spot for a `kind` building.
    ///
    /// Candidates are tried around each living friendly building in id
    /// order. With iron fields on the map, only spots near the field
    /// closest to the headquarters are accepted. Falls back to the
    /// headquarters' own tile, which placement will reject.
    fn find_building_position(&self, world: &World, config: &SimConfig, kind: BuildingKind) -> Vec2Fixed {
        let hq_position = world
            .primary_hq(self.faction)
            .and_then(|id| world.entities.get(id))
            .map_or(Vec2Fixed::ZERO, |e| e.position);
        let home_field = world
            .resource_nodes
            .iter()
            .min_by_key(|n| (hq_position.distance_squared(n.position).to_bits(), n.id))
            .map(|n| n.position);
        let field_range_sq = Fixed::from_num(PLACEMENT_FIELD_RANGE) * Fixed::from_num(PLACEMENT_FIELD_RANGE);
        let offset = Fixed::from_num(PLACEMENT_OFFSET);

        let anchors = world
            .entities
            .iter_sorted()
            .filter(|e| e.faction == self.faction && e.is_building());
        for anchor in anchors {
            for direction in directions_20_deg() {
                let candidate = snap_to_grid(anchor.position + direction.scale(offset), config.tile_size);
                if !validate_placement(world, config, self.faction, kind, candidate).is_valid() {
                    continue;
                }
                match home_field {
                    Some(field) if candidate.distance_squared(field) < field_range_sq => return candidate,
                    None => return candidate,
                    Some(_) => {}
                }
            }
        }
        snap_to_grid(hq_position, config.tile_size)
    }

    // ========================================================================
    // Attacks
    // ========================================================================

    fn coordinate_attack(
        &mut self,
        world: &World,
        surprise: bool,
        assigned: &BTreeSet<EntityId>,
        commands: &mut Vec<Command>,
    ) {
        self.wave_timer = 0;
        self.waves_launched += 1;
        let n = self.waves_launched as usize;
        let wave_size = if surprise {
            (12 + n).min(MAX_WAVE_SIZE)
        } else {
            (8 + 2 * n).min(MAX_WAVE_SIZE)
        };
        self.wave_interval = self.rng.gen_range(WAVE_INTERVAL_RANGE.0..=WAVE_INTERVAL_RANGE.1);

        let combat_units = self.idle_units(world, &[UnitKind::Infantry, UnitKind::Tank], assigned);
        if combat_units.is_empty() {
            return;
        }

        let pool: &[Tactic] = match self.state {
            _ if surprise => &[Tactic::Balanced, Tactic::Flank, Tactic::AllIn],
            AiState::Threatened | AiState::Attacked => &[Tactic::AllIn, Tactic::Defensive],
            _ => &[Tactic::Balanced, Tactic::Flank, Tactic::AllIn],
        };
        let tactic = pool[self.rng.gen_range(0..pool.len())];
        self.last_tactic = Some(tactic);

        let orders_before = commands.len();
        match tactic {
            Tactic::Balanced => {
                let of_kind = |kind: UnitKind, limit: usize| {
                    combat_units
                        .iter()
                        .copied()
                        .filter(|id| world.entities.get(*id).and_then(Entity::unit_kind) == Some(kind))
                        .take(limit)
                        .collect::<Vec<_>>()
                };
                let mut wave = of_kind(UnitKind::Infantry, wave_size * 6 / 10);
                wave.extend(of_kind(UnitKind::Tank, wave_size * 4 / 10));
                self.strike_priority_target(world, &wave, commands);
            }
            Tactic::AllIn => {
                let wave: Vec<EntityId> = combat_units.iter().copied().take(wave_size).collect();
                self.strike_priority_target(world, &wave, commands);
            }
            Tactic::Flank => {
                let wave: Vec<EntityId> = combat_units.iter().copied().take(wave_size).collect();
                let enemy_hq = world
                    .primary_hq(self.faction.opponent())
                    .and_then(|id| world.entities.get(id).map(|e| (id, e.position)));
                if let Some((hq, hq_position)) = enemy_hq {
                    let group_size = wave.len() / 2;
                    for (i, unit) in wave.into_iter().enumerate() {
                        let dx = self.uniform(80, 120);
                        let dy = self.uniform(80, 120);
                        let offset = Vec2Fixed::new(dx, dy);
                        let destination = if i < group_size {
                            hq_position + offset
                        } else {
                            hq_position - offset
                        };
                        commands.push(Command::Order {
                            faction: self.faction,
                            unit,
                            destination: Some(destination),
                            target: Some(hq),
                        });
                    }
                }
            }
            Tactic::Defensive => {
                let home = world
                    .primary_hq(self.faction)
                    .and_then(|id| world.entities.get(id))
                    .map(|e| e.position);
                if let Some(home) = home {
                    for unit in combat_units.into_iter().take(wave_size) {
                        let destination = home + Vec2Fixed::new(self.uniform(-50, 50), self.uniform(-50, 50));
                        commands.push(Command::Order {
                            faction: self.faction,
                            unit,
                            destination: Some(destination),
                            target: None,
                        });
                    }
                }
            }
        }

        tracing::info!(
            faction = ?self.faction,
            wave = self.waves_launched,
            ?tactic,
            surprise,
            units = commands.len() - orders_before,
            "AI attack wave"
        );
    }

    fn strike_priority_target(&mut self, world: &World, wave: &[EntityId], commands: &mut Vec<Command>) {
        let Some(leader) = wave.first().and_then(|id| world.entities.get(*id)) else {
            return;
        };
        let Some(target) = priority_target(world, self.faction, leader.position) else {
            return;
        };
        let Some(target_position) = world.entities.get(target).map(|e| e.position) else {
            return;
        };
        for &unit in wave {
            let jitter = Vec2Fixed::new(self.uniform(-20, 20), self.uniform(-20, 20));
            commands.push(Command::Order {
                faction: self.faction,
                unit,
                destination: Some(target_position + jitter),
                target: Some(target),
            });
        }
    }

    /// Uniform fixed-point value in `[lo, hi]`.
    fn uniform(&mut self, lo: i32, hi: i32) -> Fixed {
        let lo = Fixed::from_num(lo).to_bits();
        let hi = Fixed::from_num(hi).to_bits();
        Fixed::from_bits(self.rng.gen_range(lo..=hi))
    }
}

/// Weight of an enemy as an attack target; higher is more attractive.
///
/// Only units gain weight from low health.
fn target_weight(entity: &Entity) -> Fixed {
    let low_health = u64::from(entity.health.current) * 10 < u64::from(entity.health.max) * 3;
    match (entity.unit_kind(), entity.building_kind()) {
        (Some(UnitKind::Harvester), _) => Fixed::from_num(3),
        (_, Some(BuildingKind::Headquarters)) => Fixed::from_num(2.5),
        (_, Some(BuildingKind::Turret)) => Fixed::from_num(2),
        (Some(_), _) if low_health => Fixed::from_num(1.5),
        _ => Fixed::ONE,
    }
}

/// Best enemy of `faction` to attack from `from`.
///
/// Candidates are scored by distance divided by their weight; the best
/// score wins, ties going to the lower id. The winner is only returned
/// when it is close enough to engage.
#[must_use]
pub fn priority_target(world: &World, faction: FactionId, from: Vec2Fixed) -> Option<EntityId> {
    let mut best: Option<(Fixed, Fixed, EntityId)> = None;
    for entity in world.entities.iter_sorted().filter(|e| e.faction != faction) {
        let distance = from.distance(entity.position);
        let score = distance / target_weight(entity);
        if best.map_or(true, |(s, _, _)| score < s) {
            best = Some((score, distance, entity.id));
        }
    }
    best.filter(|(_, distance, _)| *distance < Fixed::from_num(PRIORITY_TARGET_RANGE))
        .map(|(_, _, id)| id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::apply_command;
    use crate::components::ResourceNode;
    use crate::production::production_system;

    fn vec2(x: i32, y: i32) -> Vec2Fixed {
        Vec2Fixed::from_ints(x, y)
    }

    fn setup() -> (World, SimConfig, FogOfWar) {
        let config = SimConfig::default();
        let mut world = World::new(ChaCha8Rng::seed_from_u64(4));
        world.spawn(Entity::new_building(BuildingKind::Headquarters, FactionId::Nod, vec2(1300, 500)));
        world.spawn(Entity::new_building(BuildingKind::Headquarters, FactionId::Gdi, vec2(300, 300)));
        let fog = FogOfWar::new(&config);
        (world, config, fog)
    }

    fn nod_hq(world: &mut World) -> &mut Headquarters {
        let id = world.primary_hq(FactionId::Nod).unwrap();
        world
            .entities
            .get_mut(id)
            .and_then(|e| e.as_building_mut())
            .and_then(|b| b.headquarters.as_mut())
            .unwrap()
    }

    /// Advance the controller to its next production decision.
    fn run_to_decision(ai: &mut AiController, world: &World, config: &SimConfig, fog: &FogOfWar) -> Vec<Command> {
        let mut all = Vec::new();
        for _ in 0..ACTION_INTERVAL {
            all.extend(ai.update(world, config, fog));
        }
        all
    }

    fn enqueued(commands: &[Command]) -> Vec<ProducibleKind> {
        commands
            .iter()
            .filter_map(|c| match c {
                Command::Enqueue { item, .. } => Some(*item),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_quotas_scale_and_truncate() {
        let quotas = Quotas::scaled();
        assert_eq!(quotas.harvesters, 7);
        assert_eq!(quotas.infantry, 10);
        assert_eq!(quotas.tanks, 5);
        assert_eq!(quotas.turrets, 5);
    }

    #[test]
    fn test_controller_streams_differ_per_faction() {
        assert_ne!(controller_seed(42, FactionId::Gdi), controller_seed(42, FactionId::Nod));
        assert_eq!(controller_seed(7, FactionId::Nod), controller_seed(7, FactionId::Nod));
    }

    #[test]
    fn test_broke_without_barracks_builds_barracks() {
        let (mut world, config, fog) = setup();
        nod_hq(&mut world).iron = 600;
        let mut ai = AiController::new(FactionId::Nod, 1);

        let commands = run_to_decision(&mut ai, &world, &config, &fog);

        assert_eq!(ai.state(), AiState::Broke);
        assert_eq!(
            enqueued(&commands),
            vec![ProducibleKind::Building(BuildingKind::Barracks)]
        );
    }

    #[test]
    fn test_queued_barracks_counts_as_owned() {
        let (mut world, config, fog) = setup();
        apply_command(
            &mut world,
            &config,
            &Command::Enqueue {
                faction: FactionId::Nod,
                item: ProducibleKind::Building(BuildingKind::Barracks),
            },
        )
        .unwrap();
        let mut ai = AiController::new(FactionId::Nod, 1);

        let commands = run_to_decision(&mut ai, &world, &config, &fog);

        assert_eq!(
            enqueued(&commands),
            vec![ProducibleKind::Building(BuildingKind::WarFactory)]
        );
    }

    #[test]
    fn test_nothing_affordable_enqueues_nothing() {
        let (mut world, config, fog) = setup();
        nod_hq(&mut world).iron = 50;
        let mut ai = AiController::new(FactionId::Nod, 1);
        let commands = run_to_decision(&mut ai, &world, &config, &fog);
        assert!(enqueued(&commands).is_empty());
    }

    #[test]
    fn test_threatened_when_enemy_near_hq() {
        let (mut world, config, fog) = setup();
        nod_hq(&mut world).iron = 5000;
        // A loaded harvester keeps the income estimate healthy.
        let harvester = world.spawn(Entity::new_unit(UnitKind::Harvester, FactionId::Nod, vec2(1200, 700)));
        world
            .entities
            .get_mut(harvester)
            .and_then(|e| e.as_unit_mut())
            .and_then(|u| u.harvester.as_mut())
            .unwrap()
            .cargo = 100;
        world.spawn(Entity::new_unit(UnitKind::Tank, FactionId::Gdi, vec2(1000, 540)));

        let mut ai = AiController::new(FactionId::Nod, 1);
        ai.update(&world, &config, &fog);
        assert_eq!(ai.state(), AiState::Threatened);
    }

    #[test]
    fn test_damage_triggers_attacked_state() {
        let (mut world, config, fog) = setup();
        nod_hq(&mut world).iron = 5000;
        let harvester = world.spawn(Entity::new_unit(UnitKind::Harvester, FactionId::Nod, vec2(1200, 700)));
        world
            .entities
            .get_mut(harvester)
            .and_then(|e| e.as_unit_mut())
            .and_then(|u| u.harvester.as_mut())
            .unwrap()
            .cargo = 100;
        world.entities.get_mut(harvester).unwrap().under_attack = true;

        let mut ai = AiController::new(FactionId::Nod, 1);
        ai.update(&world, &config, &fog);
        assert_eq!(ai.state(), AiState::Attacked);

        world.entities.get_mut(harvester).unwrap().under_attack = false;
        for _ in 0..DEFENSE_COOLDOWN - 1 {
            ai.update(&world, &config, &fog);
        }
        assert_eq!(ai.state(), AiState::Attacked);
        ai.update(&world, &config, &fog);
        assert_ne!(ai.state(), AiState::Attacked);
    }

    #[test]
    fn test_pending_building_is_placed_near_home_field() {
        let (mut world, config, fog) = setup();
        world.spawn_resource_node(ResourceNode::new(vec2(1100, 700)));
        nod_hq(&mut world).pending_building = Some(BuildingKind::PowerPlant);
        nod_hq(&mut world).iron = 0;
        let mut ai = AiController::new(FactionId::Nod, 1);

        let commands = run_to_decision(&mut ai, &world, &config, &fog);
        let placement = commands.iter().find_map(|c| match c {
            Command::PlaceBuilding { point, .. } => Some(*point),
            _ => None,
        });
        let point = placement.unwrap();
        assert!(validate_placement(&world, &config, FactionId::Nod, BuildingKind::PowerPlant, point).is_valid());

        for command in &commands {
            let _ = apply_command(&mut world, &config, command);
        }
        assert_eq!(world.count_buildings(FactionId::Nod, BuildingKind::PowerPlant), 1);
        assert_eq!(nod_hq(&mut world).pending_building, None);
    }

    #[test]
    fn test_priority_target_prefers_harvesters() {
        let (mut world, _, _) = setup();
        let infantry = world.spawn(Entity::new_unit(UnitKind::Infantry, FactionId::Gdi, vec2(700, 400)));
        let harvester = world.spawn(Entity::new_unit(UnitKind::Harvester, FactionId::Gdi, vec2(800, 400)));
        // Infantry at 100 scores 100; harvester at 200 scores 66.
        assert_eq!(priority_target(&world, FactionId::Nod, vec2(600, 400)), Some(harvester));
        world.destroy(harvester);
        assert_eq!(priority_target(&world, FactionId::Nod, vec2(600, 400)), Some(infantry));
    }

    #[test]
    fn test_priority_target_respects_engagement_range() {
        let (mut world, _, _) = setup();
        world.spawn(Entity::new_unit(UnitKind::Infantry, FactionId::Gdi, vec2(700, 400)));
        // Infantry scores 300, the headquarters 265 but sits 662 away.
        assert_eq!(priority_target(&world, FactionId::Nod, vec2(1000, 400)), None);
    }

    #[test]
    fn test_priority_target_prefers_badly_damaged_units() {
        let (mut world, _, _) = setup();
        let near = world.spawn(Entity::new_unit(UnitKind::Infantry, FactionId::Gdi, vec2(1150, 400)));
        let wounded = world.spawn(Entity::new_unit(UnitKind::Infantry, FactionId::Gdi, vec2(800, 400)));
        assert_eq!(priority_target(&world, FactionId::Nod, vec2(1000, 400)), Some(near));

        // At 10% health the unit 200 away scores 133 against 150.
        world.entities.get_mut(wounded).unwrap().health.current = 10;
        assert_eq!(priority_target(&world, FactionId::Nod, vec2(1000, 400)), Some(wounded));
    }

    #[test]
    fn test_damaged_buildings_keep_base_weight() {
        let (mut world, _, _) = setup();
        let infantry = world.spawn(Entity::new_unit(UnitKind::Infantry, FactionId::Gdi, vec2(1150, 400)));
        // Barracks centre (800, 400), 200 away.
        let barracks = world.spawn(Entity::new_building(BuildingKind::Barracks, FactionId::Gdi, vec2(770, 370)));
        world.entities.get_mut(barracks).unwrap().health.current = 1;
        assert_eq!(priority_target(&world, FactionId::Nod, vec2(1000, 400)), Some(infantry));
    }

    #[test]
    fn test_wave_orders_only_idle_combat_units() {
        let (mut world, config, _) = setup();
        let gdi_hq = world.primary_hq(FactionId::Gdi).unwrap();
        let idle: Vec<_> = (0..4)
            .map(|i| world.spawn(Entity::new_unit(UnitKind::Tank, FactionId::Nod, vec2(500 + 10 * i, 340))))
            .collect();
        let busy = world.spawn(Entity::new_unit(UnitKind::Tank, FactionId::Nod, vec2(520, 380)));
        world.entities.get_mut(busy).unwrap().as_unit_mut().unwrap().move_target = Some(vec2(0, 0));
        world.spawn(Entity::new_unit(UnitKind::Harvester, FactionId::Nod, vec2(1300, 700)));

        let mut ai = AiController::new(FactionId::Nod, 3);
        let mut commands = Vec::new();
        let assigned = BTreeSet::new();
        ai.coordinate_attack(&world, false, &assigned, &mut commands);

        assert_eq!(ai.waves_launched(), 1);
        let ordered: BTreeSet<EntityId> = commands
            .iter()
            .filter_map(|c| match c {
                Command::Order { unit, .. } => Some(*unit),
                _ => None,
            })
            .collect();
        assert!(!ordered.contains(&busy));
        assert!(ordered.iter().all(|id| idle.contains(id)));
        // The enemy headquarters is in range of the leader for every tactic.
        assert_eq!(ordered.len(), idle.len());
        if ai.last_tactic() != Some(Tactic::Defensive) {
            assert!(commands.iter().all(|c| matches!(c, Command::Order { target: Some(t), .. } if *t == gdi_hq)));
        }
        for command in &commands {
            apply_command(&mut world, &config, command).unwrap();
        }
    }

    #[test]
    fn test_scouts_visit_fields_then_center() {
        let (mut world, config, fog) = setup();
        world.spawn_resource_node(ResourceNode::new(vec2(700, 100)));
        let field_position = world.resource_nodes[0].position;
        let scouts: Vec<_> = (0..2)
            .map(|i| world.spawn(Entity::new_unit(UnitKind::Infantry, FactionId::Nod, vec2(1200 + 20 * i, 450))))
            .collect();
        let mut ai = AiController::new(FactionId::Nod, 5);
        let commands = ai.update(&world, &config, &fog);

        let destinations: Vec<_> = commands
            .iter()
            .filter_map(|c| match c {
                Command::Order {
                    unit, destination, ..
                } if scouts.contains(unit) => *destination,
                _ => None,
            })
            .collect();
        assert_eq!(destinations[0], field_position);
        assert_eq!(destinations[1], config.map_center());
    }

    #[test]
    fn test_ai_production_runs_through_queue() {
        let (mut world, config, fog) = setup();
        let mut ai = AiController::new(FactionId::Nod, 9);
        for _ in 0..ACTION_INTERVAL {
            for command in ai.update(&world, &config, &fog) {
                let _ = apply_command(&mut world, &config, &command);
            }
            production_system(&mut world);
        }
        let hq = primary_headquarters(&world, FactionId::Nod).unwrap();
        assert_eq!(hq.queue.front(), Some(ProducibleKind::Building(BuildingKind::Barracks)));
        assert_eq!(hq.iron, 1000);
    }
}
