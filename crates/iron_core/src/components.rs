//! Entity model: the common entity record and its variant payloads.
//!
//! Every combatant (unit or building) is an [`Entity`]: identity, faction,
//! position, footprint, health and a transient damage flag. Variant data
//! lives in [`EntityKind`]. Projectiles, iron fields and particles carry
//! only the subset of that record they need and live in their own rosters.

use serde::{Deserialize, Serialize};

use crate::economy::Harvester;
use crate::factions::FactionId;
use crate::math::{fixed_serde, Fixed, Rect, Vec2Fixed};
use crate::production::Headquarters;
use crate::stats::{self, building_stats, unit_stats, WeaponStats};

/// Unique identifier for entities.
///
/// Ids are handed out from one counter per simulation and never reused.
pub type EntityId = u64;

// ============================================================================
// Health
// ============================================================================

/// Health component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Health {
    /// Current health points.
    pub current: u32,
    /// Maximum health points.
    pub max: u32,
}

impl Health {
    /// Create a new health component at full health.
    #[must_use]
    pub const fn new(max: u32) -> Self {
        Self { current: max, max }
    }

    /// Apply damage, saturating at zero.
    pub fn apply_damage(&mut self, amount: u32) {
        self.current = self.current.saturating_sub(amount);
    }

    /// Whether health has reached zero.
    #[must_use]
    pub const fn is_dead(&self) -> bool {
        self.current == 0
    }

    /// Health as a fraction of max, in fixed-point.
    #[must_use]
    pub fn ratio(&self) -> Fixed {
        if self.max == 0 {
            return Fixed::ZERO;
        }
        Fixed::from_num(self.current) / Fixed::from_num(self.max)
    }
}

// ============================================================================
// Kinds
// ============================================================================

/// Mobile unit kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitKind {
    /// Cheap melee foot soldier.
    Infantry,
    /// Ranged armoured unit firing projectiles.
    Tank,
    /// Resource collector that defends itself against infantry.
    Harvester,
}

impl UnitKind {
    /// All unit kinds.
    pub const ALL: [UnitKind; 3] = [UnitKind::Infantry, UnitKind::Tank, UnitKind::Harvester];

    /// Building that must exist to produce and spawn this unit.
    #[must_use]
    pub const fn produced_at(self) -> BuildingKind {
        match self {
            Self::Infantry => BuildingKind::Barracks,
            Self::Tank | Self::Harvester => BuildingKind::WarFactory,
        }
    }
}

/// Static building kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuildingKind {
    /// Stores iron, runs production, computes power balance.
    Headquarters,
    /// Enables and speeds up infantry production.
    Barracks,
    /// Enables and speeds up tank and harvester production.
    WarFactory,
    /// Generates power.
    PowerPlant,
    /// Static defense firing projectiles at enemy units.
    Turret,
}

impl BuildingKind {
    /// All building kinds.
    pub const ALL: [BuildingKind; 5] = [
        BuildingKind::Headquarters,
        BuildingKind::Barracks,
        BuildingKind::WarFactory,
        BuildingKind::PowerPlant,
        BuildingKind::Turret,
    ];
}

/// Anything a headquarters can put in its production queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProducibleKind {
    /// A unit, spawned next to its production building.
    Unit(UnitKind),
    /// A building, which becomes pending until placed.
    Building(BuildingKind),
}

impl ProducibleKind {
    /// Iron cost. Identical for both factions.
    #[must_use]
    pub fn cost(self) -> u32 {
        match self {
            Self::Unit(kind) => unit_stats(kind, FactionId::Gdi).cost,
            Self::Building(kind) => building_stats(kind).cost,
        }
    }

    /// Support building required to enqueue this item, if any.
    #[must_use]
    pub const fn requirement(self) -> Option<BuildingKind> {
        match self {
            Self::Unit(kind) => Some(kind.produced_at()),
            Self::Building(_) => None,
        }
    }
}

// ============================================================================
// Unit and building payloads
// ============================================================================

/// Mobile unit payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    /// Unit kind.
    pub kind: UnitKind,
    /// Distance moved per tick.
    #[serde(with = "fixed_serde")]
    pub speed: Fixed,
    /// Plain move-order destination.
    pub move_target: Option<Vec2Fixed>,
    /// Formation slot destination; takes precedence over `move_target`.
    pub formation_target: Option<Vec2Fixed>,
    /// Entity being pursued and attacked.
    pub target_unit: Option<EntityId>,
    /// Ticks until the weapon can fire again.
    pub cooldown: u32,
    /// Harvesting state, present only on harvesters.
    pub harvester: Option<Harvester>,
}

impl Unit {
    /// Whether the unit has no orders of its own.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.move_target.is_none() && self.formation_target.is_none() && self.target_unit.is_none()
    }

    /// Drop every movement and attack order.
    pub fn clear_orders(&mut self) {
        self.move_target = None;
        self.formation_target = None;
        self.target_unit = None;
    }
}

/// Building payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Building {
    /// Building kind.
    pub kind: BuildingKind,
    /// Ticks of construction completed. Cosmetic only.
    pub construction_progress: u32,
    /// Ticks until a turret can fire again.
    pub cooldown: u32,
    /// Current turret target.
    pub target_unit: Option<EntityId>,
    /// Whether the opposing faction has ever explored this building's tile.
    pub discovered: bool,
    /// Economy state, present only on headquarters.
    pub headquarters: Option<Headquarters>,
}

impl Building {
    /// Whether construction has finished.
    #[must_use]
    pub fn is_constructed(&self) -> bool {
        self.construction_progress >= stats::CONSTRUCTION_TIME
    }

    /// Construction progress in percent, for opacity rendering.
    #[must_use]
    pub fn construction_percentage(&self) -> u32 {
        (self.construction_progress.min(stats::CONSTRUCTION_TIME) * 100) / stats::CONSTRUCTION_TIME
    }
}

/// Variant payload of an [`Entity`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityKind {
    /// A mobile unit.
    Unit(Unit),
    /// A static building.
    Building(Building),
}

// ============================================================================
// Entity
// ============================================================================

/// A combatant: unit or building.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique identifier.
    pub id: EntityId,
    /// Owning faction.
    pub faction: FactionId,
    /// Centre of the bounding box.
    pub position: Vec2Fixed,
    /// Bounding box size.
    pub size: Vec2Fixed,
    /// Health.
    pub health: Health,
    /// Set when damage lands, cleared at the end of every tick.
    pub under_attack: bool,
    /// Variant payload.
    pub kind: EntityKind,
}

impl Entity {
    /// Create a unit with its kind's stats for `faction`, centred on `position`.
    #[must_use]
    pub fn new_unit(kind: UnitKind, faction: FactionId, position: Vec2Fixed) -> Self {
        let stats = unit_stats(kind, faction);
        Self {
            id: 0,
            faction,
            position,
            size: stats.size,
            health: Health::new(stats.health),
            under_attack: false,
            kind: EntityKind::Unit(Unit {
                kind,
                speed: stats.speed,
                move_target: None,
                formation_target: None,
                target_unit: None,
                cooldown: 0,
                harvester: (kind == UnitKind::Harvester).then(Harvester::new),
            }),
        }
    }

    /// Create a building whose footprint's top-left corner is `top_left`.
    #[must_use]
    pub fn new_building(kind: BuildingKind, faction: FactionId, top_left: Vec2Fixed) -> Self {
        let stats = building_stats(kind);
        let footprint = Rect::from_top_left(top_left, stats.size);
        Self {
            id: 0,
            faction,
            position: footprint.center(),
            size: stats.size,
            health: Health::new(stats.health),
            under_attack: false,
            kind: EntityKind::Building(Building {
                kind,
                construction_progress: 0,
                cooldown: 0,
                target_unit: None,
                discovered: false,
                headquarters: (kind == BuildingKind::Headquarters).then(Headquarters::default),
            }),
        }
    }

    /// Axis-aligned bounding box.
    #[must_use]
    pub fn bounds(&self) -> Rect {
        Rect::from_center(self.position, self.size)
    }

    /// Whether the entity still has health left.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        !self.health.is_dead()
    }

    /// Unit payload, if this is a unit.
    #[must_use]
    pub fn as_unit(&self) -> Option<&Unit> {
        match &self.kind {
            EntityKind::Unit(unit) => Some(unit),
            EntityKind::Building(_) => None,
        }
    }

    /// Mutable unit payload, if this is a unit.
    pub fn as_unit_mut(&mut self) -> Option<&mut Unit> {
        match &mut self.kind {
            EntityKind::Unit(unit) => Some(unit),
            EntityKind::Building(_) => None,
        }
    }

    /// Building payload, if this is a building.
    #[must_use]
    pub fn as_building(&self) -> Option<&Building> {
        match &self.kind {
            EntityKind::Building(building) => Some(building),
            EntityKind::Unit(_) => None,
        }
    }

    /// Mutable building payload, if this is a building.
    pub fn as_building_mut(&mut self) -> Option<&mut Building> {
        match &mut self.kind {
            EntityKind::Building(building) => Some(building),
            EntityKind::Unit(_) => None,
        }
    }

    /// Unit kind, if this is a unit.
    #[must_use]
    pub fn unit_kind(&self) -> Option<UnitKind> {
        self.as_unit().map(|u| u.kind)
    }

    /// Building kind, if this is a building.
    #[must_use]
    pub fn building_kind(&self) -> Option<BuildingKind> {
        self.as_building().map(|b| b.kind)
    }

    /// Whether this is a unit.
    #[must_use]
    pub fn is_unit(&self) -> bool {
        matches!(self.kind, EntityKind::Unit(_))
    }

    /// Whether this is a building.
    #[must_use]
    pub fn is_building(&self) -> bool {
        matches!(self.kind, EntityKind::Building(_))
    }

    /// The production item this entity comes from.
    #[must_use]
    pub fn producible_kind(&self) -> ProducibleKind {
        match &self.kind {
            EntityKind::Unit(unit) => ProducibleKind::Unit(unit.kind),
            EntityKind::Building(building) => ProducibleKind::Building(building.kind),
        }
    }

    /// Power drawn by this entity.
    #[must_use]
    pub fn power_usage(&self) -> u32 {
        match &self.kind {
            EntityKind::Unit(unit) => unit_stats(unit.kind, self.faction).power_usage,
            EntityKind::Building(building) => building_stats(building.kind).power_usage,
        }
    }

    /// Weapon stats, if this entity can attack.
    #[must_use]
    pub fn weapon(&self) -> Option<WeaponStats> {
        match &self.kind {
            EntityKind::Unit(unit) => Some(unit_stats(unit.kind, self.faction).weapon),
            EntityKind::Building(building) => building_stats(building.kind).weapon,
        }
    }
}

// ============================================================================
// Projectiles, resource nodes, particles
// ============================================================================

/// A shell in flight toward a target entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projectile {
    /// Unique identifier.
    pub id: EntityId,
    /// Faction that fired it.
    pub faction: FactionId,
    /// Centre position.
    pub position: Vec2Fixed,
    /// Entity it homes in on.
    pub target: EntityId,
    /// Damage applied on impact.
    pub damage: u32,
    /// Ticks until the next trail particle.
    pub trail_timer: u32,
}

impl Projectile {
    /// Bounding box used for contact checks.
    #[must_use]
    pub fn bounds(&self) -> Rect {
        let (w, h) = stats::PROJECTILE_SIZE;
        Rect::from_center(self.position, Vec2Fixed::from_ints(w, h))
    }
}

/// An iron field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceNode {
    /// Unique identifier.
    pub id: EntityId,
    /// Centre position.
    pub position: Vec2Fixed,
    /// Iron left, within `0..=RESOURCE_NODE_MAX`.
    pub remaining: u32,
    /// Ticks until the next regeneration pulse.
    pub regen_timer: u32,
}

impl ResourceNode {
    /// Create a full field whose top-left corner is `top_left`.
    #[must_use]
    pub fn new(top_left: Vec2Fixed) -> Self {
        let size = Vec2Fixed::from_ints(stats::RESOURCE_NODE_SIZE, stats::RESOURCE_NODE_SIZE);
        Self {
            id: 0,
            position: Rect::from_top_left(top_left, size).center(),
            remaining: stats::RESOURCE_NODE_MAX,
            regen_timer: stats::RESOURCE_NODE_REGEN_PERIOD,
        }
    }

    /// Remove up to `amount` iron, returning what was taken.
    pub fn extract(&mut self, amount: u32) -> u32 {
        let taken = self.remaining.min(amount);
        self.remaining -= taken;
        taken
    }

    /// Whether the field has run dry.
    #[must_use]
    pub fn is_depleted(&self) -> bool {
        self.remaining == 0
    }
}

/// Visual effect category, for renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParticleKind {
    /// Grey puff at a weapon muzzle.
    Smoke,
    /// Spark from a melee hit.
    Spark,
    /// Trail behind a projectile.
    Trail,
    /// Projectile impact.
    Explosion,
    /// Debris from a destroyed building.
    Debris,
}

/// Cosmetic particle with no gameplay effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Particle {
    /// Unique identifier.
    pub id: EntityId,
    /// Effect category.
    pub kind: ParticleKind,
    /// Centre position.
    pub position: Vec2Fixed,
    /// Displacement per tick.
    pub velocity: Vec2Fixed,
    /// Ticks left before removal.
    pub lifetime: u32,
    /// Lifetime at creation, for fading.
    pub initial_lifetime: u32,
}
