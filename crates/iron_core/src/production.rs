//! Production system: power balance, build queue, spawning and placement.
//!
//! Each headquarters owns its faction's iron stockpile and a FIFO queue of
//! units and buildings. Commands act on the faction's primary headquarters
//! (lowest living id).

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::buildings::{snap_to_grid, validate_placement};
use crate::components::{BuildingKind, Entity, EntityId, ProducibleKind, UnitKind};
use crate::config::SimConfig;
use crate::error::CommandError;
use crate::factions::FactionId;
use crate::math::{option_fixed_serde, Fixed, Vec2Fixed};
use crate::stats::building_stats;
use crate::world::World;

/// Power every headquarters provides on its own.
pub const BASE_POWER: u32 = 300;

/// Ticks to produce any item before support-building speedups.
pub const BASE_PRODUCTION_TIME: i32 = 180;

/// Default maximum production queue size.
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 5;

/// Iron a fresh headquarters holds.
pub const DEFAULT_STARTING_IRON: u32 = 1500;

/// Gap between a production building's right edge and a fresh unit.
const SPAWN_OFFSET: i32 = 20;

// ============================================================================
// Production queue
// ============================================================================

/// FIFO queue of items awaiting production.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionQueue {
    /// Items in production order. The front is in progress.
    items: VecDeque<ProducibleKind>,
    /// Maximum number of items in the queue.
    max_queue_size: usize,
}

impl Default for ProductionQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl ProductionQueue {
    /// Create an empty queue with the default size limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_size(DEFAULT_MAX_QUEUE_SIZE)
    }

    /// Create an empty queue with a custom size limit.
    #[must_use]
    pub fn with_max_size(max_queue_size: usize) -> Self {
        Self {
            items: VecDeque::new(),
            max_queue_size,
        }
    }

    /// Append an item.
    pub fn add(&mut self, item: ProducibleKind) -> Result<(), CommandError> {
        if self.is_full() {
            return Err(CommandError::QueueFull {
                capacity: self.max_queue_size,
            });
        }
        self.items.push_back(item);
        Ok(())
    }

    /// Item currently in production.
    #[must_use]
    pub fn front(&self) -> Option<ProducibleKind> {
        self.items.front().copied()
    }

    /// Remove the item in production.
    pub fn pop_front(&mut self) -> Option<ProducibleKind> {
        self.items.pop_front()
    }

    /// Whether no more items fit.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.items.len() >= self.max_queue_size
    }

    /// Number of items queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of queued items equal to `item`.
    #[must_use]
    pub fn count(&self, item: ProducibleKind) -> usize {
        self.items.iter().filter(|i| **i == item).count()
    }

    /// Iterate items in production order.
    pub fn iter(&self) -> impl Iterator<Item = &ProducibleKind> {
        self.items.iter()
    }
}

// ============================================================================
// Headquarters state
// ============================================================================

/// Economy state owned by a headquarters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headquarters {
    /// Iron stockpile.
    pub iron: u32,
    /// Production queue.
    pub queue: ProductionQueue,
    /// Ticks left on the queue head; `None` until armed.
    #[serde(with = "option_fixed_serde")]
    pub production_timer: Option<Fixed>,
    /// Completed building awaiting placement.
    pub pending_building: Option<BuildingKind>,
    /// Power generated, recomputed every tick.
    pub power_output: u32,
    /// Power drawn, recomputed every tick.
    pub power_usage: u32,
    /// Set when the queue head finished but cannot spawn for lack of a
    /// production building.
    pub stalled: bool,
}

impl Default for Headquarters {
    fn default() -> Self {
        Self {
            iron: DEFAULT_STARTING_IRON,
            queue: ProductionQueue::new(),
            production_timer: None,
            pending_building: None,
            power_output: BASE_POWER,
            power_usage: 0,
            stalled: false,
        }
    }
}

impl Headquarters {
    /// Whether generation covers consumption.
    #[must_use]
    pub fn has_enough_power(&self) -> bool {
        self.power_output >= self.power_usage
    }

    /// Whether the stockpile covers `cost`.
    #[must_use]
    pub fn can_afford(&self, cost: u32) -> bool {
        self.iron >= cost
    }

    /// Add iron to the stockpile.
    pub fn deposit(&mut self, amount: u32) {
        self.iron = self.iron.saturating_add(amount);
    }

    /// Timer decrement for one tick at the current power balance.
    #[must_use]
    pub fn timer_step(&self) -> Fixed {
        if self.has_enough_power() {
            Fixed::ONE
        } else {
            Fixed::from_num(0.5)
        }
    }
}

/// Events generated by the production system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductionEvent {
    /// A unit left its production building.
    UnitSpawned {
        /// Producing headquarters.
        headquarters: EntityId,
        /// New unit.
        unit: EntityId,
        /// Unit kind.
        kind: UnitKind,
    },
    /// A building finished and awaits placement.
    BuildingReady {
        /// Producing headquarters.
        headquarters: EntityId,
        /// Building kind.
        kind: BuildingKind,
    },
    /// The queue head cannot spawn for lack of a production building.
    Stalled {
        /// Producing headquarters.
        headquarters: EntityId,
        /// Stuck unit kind.
        kind: UnitKind,
    },
    /// A pending building was placed on the map.
    BuildingPlaced {
        /// Owning faction.
        faction: FactionId,
        /// New building.
        building: EntityId,
        /// Building kind.
        kind: BuildingKind,
    },
}

// ============================================================================
// Systems
// ============================================================================

/// Production time for `item` given the number of living support buildings.
///
/// Each Barracks speeds Infantry and each WarFactory speeds Tanks and
/// Harvesters by a compounding factor of 0.9. Buildings always take the
/// base time.
#[must_use]
pub fn production_time(item: ProducibleKind, support_buildings: usize) -> Fixed {
    let base = Fixed::from_num(BASE_PRODUCTION_TIME);
    match item {
        ProducibleKind::Unit(_) => {
            let factor = Fixed::from_num(0.9);
            (0..support_buildings).fold(base, |time, _| time * factor)
        }
        ProducibleKind::Building(_) => base,
    }
}

/// Power generated and drawn by `faction`, excluding `hq` itself.
#[must_use]
pub fn power_balance(world: &World, faction: FactionId, hq: EntityId) -> (u32, u32) {
    let plants = world.count_buildings(faction, BuildingKind::PowerPlant) as u32;
    let output = BASE_POWER + plants * building_stats(BuildingKind::PowerPlant).power_output;
    let usage = world
        .entities
        .iter()
        .filter(|e| e.faction == faction && e.id != hq)
        .map(Entity::power_usage)
        .sum();
    (output, usage)
}

/// Production building a fresh `kind` unit leaves from: the living
/// building of the right type nearest to the headquarters.
fn spawn_building(world: &World, faction: FactionId, kind: UnitKind, hq_position: Vec2Fixed) -> Option<&Entity> {
    let needed = kind.produced_at();
    world
        .entities
        .iter()
        .filter(|e| e.faction == faction && e.building_kind() == Some(needed))
        .min_by_key(|e| (hq_position.distance_squared(e.position).to_bits(), e.id))
}

/// Recompute power and advance every headquarters' queue by one tick.
pub fn production_system(world: &mut World) -> Vec<ProductionEvent> {
    let mut events = Vec::new();

    let hq_ids: Vec<EntityId> = world
        .entities
        .iter_sorted()
        .filter(|e| e.building_kind() == Some(BuildingKind::Headquarters))
        .map(|e| e.id)
        .collect();

    for hq_id in hq_ids {
        let Some(entity) = world.entities.get(hq_id) else {
            continue;
        };
        let faction = entity.faction;
        let hq_position = entity.position;
        let Some(mut hq) = entity.as_building().and_then(|b| b.headquarters.clone()) else {
            continue;
        };

        let (output, usage) = power_balance(world, faction, hq_id);
        hq.power_output = output;
        hq.power_usage = usage;

        if hq.pending_building.is_none() {
            if let Some(head) = hq.queue.front() {
                advance_queue_head(world, &mut hq, hq_id, faction, hq_position, head, &mut events);
            }
        }

        if let Some(slot) = world
            .entities
            .get_mut(hq_id)
            .and_then(|e| e.as_building_mut())
            .and_then(|b| b.headquarters.as_mut())
        {
            *slot = hq;
        }
    }

    events
}

fn advance_queue_head(
    world: &mut World,
    hq: &mut Headquarters,
    hq_id: EntityId,
    faction: FactionId,
    hq_position: Vec2Fixed,
    head: ProducibleKind,
    events: &mut Vec<ProductionEvent>,
) {
    let timer = match hq.production_timer {
        Some(timer) => timer,
        None => {
            let support = head
                .requirement()
                .map_or(0, |kind| world.count_buildings(faction, kind));
            production_time(head, support)
        }
    };
    let timer = if hq.stalled {
        timer
    } else {
        (timer - hq.timer_step()).max(Fixed::ZERO)
    };
    hq.production_timer = Some(timer);
    if timer > Fixed::ZERO {
        return;
    }

    match head {
        ProducibleKind::Building(kind) => {
            hq.queue.pop_front();
            hq.pending_building = Some(kind);
            hq.production_timer = None;
            events.push(ProductionEvent::BuildingReady {
                headquarters: hq_id,
                kind,
            });
            tracing::debug!(?faction, ?kind, "Building ready for placement");
        }
        ProducibleKind::Unit(kind) => {
            let Some(spawn_point) = spawn_building(world, faction, kind, hq_position).map(|b| {
                let bounds = b.bounds();
                Vec2Fixed::new(bounds.right() + Fixed::from_num(SPAWN_OFFSET), b.position.y)
            }) else {
                if !hq.stalled {
                    hq.stalled = true;
                    events.push(ProductionEvent::Stalled {
                        headquarters: hq_id,
                        kind,
                    });
                    tracing::debug!(?faction, ?kind, "Production stalled, no production building");
                }
                return;
            };

            hq.queue.pop_front();
            hq.production_timer = None;
            hq.stalled = false;

            let mut unit = Entity::new_unit(kind, faction, spawn_point);
            if let Some(payload) = unit.as_unit_mut() {
                payload.formation_target = Some(spawn_point);
            }
            let unit = world.spawn(unit);
            events.push(ProductionEvent::UnitSpawned {
                headquarters: hq_id,
                unit,
                kind,
            });
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

fn primary_hq_mut(world: &mut World, faction: FactionId) -> Result<(EntityId, &mut Headquarters), CommandError> {
    let id = world
        .primary_hq(faction)
        .ok_or(CommandError::NoHeadquarters(faction))?;
    world
        .entities
        .get_mut(id)
        .and_then(|e| e.as_building_mut())
        .and_then(|b| b.headquarters.as_mut())
        .map(|hq| (id, hq))
        .ok_or(CommandError::NoHeadquarters(faction))
}

/// Headquarters state of `faction`'s primary headquarters.
#[must_use]
pub fn primary_headquarters(world: &World, faction: FactionId) -> Option<&Headquarters> {
    world
        .primary_hq(faction)
        .and_then(|id| world.entities.get(id))
        .and_then(|e| e.as_building())
        .and_then(|b| b.headquarters.as_ref())
}

/// Queue `item` at `faction`'s primary headquarters, paying for it now.
pub fn enqueue(world: &mut World, faction: FactionId, item: ProducibleKind) -> Result<(), CommandError> {
    if let Some(requires) = item.requirement() {
        if world.count_buildings(faction, requires) == 0 {
            return Err(CommandError::MissingRequirement { item, requires });
        }
    }

    let (_, hq) = primary_hq_mut(world, faction)?;
    let cost = item.cost();
    if hq.queue.is_full() {
        return Err(CommandError::QueueFull {
            capacity: DEFAULT_MAX_QUEUE_SIZE,
        });
    }
    if !hq.can_afford(cost) {
        return Err(CommandError::InsufficientIron {
            required: cost,
            available: hq.iron,
        });
    }
    hq.queue.add(item)?;
    hq.iron -= cost;
    Ok(())
}

/// Place `faction`'s pending building with its footprint's top-left at the
/// grid tile containing `point`.
pub fn place_pending_building(
    world: &mut World,
    config: &SimConfig,
    faction: FactionId,
    point: Vec2Fixed,
) -> Result<EntityId, CommandError> {
    let (_, hq) = primary_hq_mut(world, faction)?;
    let kind = hq.pending_building.ok_or(CommandError::NoPendingBuilding)?;

    let top_left = snap_to_grid(point, config.tile_size);
    let result = validate_placement(world, config, faction, kind, top_left);
    if !result.is_valid() {
        return Err(CommandError::InvalidPlacement(result));
    }

    let building = world.spawn(Entity::new_building(kind, faction, top_left));
    let (_, hq) = primary_hq_mut(world, faction)?;
    hq.pending_building = None;
    world.events.production.push(ProductionEvent::BuildingPlaced {
        faction,
        building,
        kind,
    });
    tracing::info!(?faction, ?kind, building, "Building placed");
    Ok(building)
}

/// Discard `faction`'s pending building without refund.
pub fn cancel_pending_building(world: &mut World, faction: FactionId) -> Result<BuildingKind, CommandError> {
    let (_, hq) = primary_hq_mut(world, faction)?;
    hq.pending_building.take().ok_or(CommandError::NoPendingBuilding)
}

/// Sell one of `faction`'s buildings for half its cost.
///
/// Returns the refund.
pub fn sell_building(world: &mut World, faction: FactionId, building: EntityId) -> Result<u32, CommandError> {
    let entity = world
        .entities
        .get(building)
        .ok_or(CommandError::EntityNotFound(building))?;
    if entity.faction != faction {
        return Err(CommandError::NotOwned {
            entity: building,
            faction,
        });
    }
    let kind = entity
        .building_kind()
        .ok_or(CommandError::NotABuilding(building))?;
    if kind == BuildingKind::Headquarters && world.count_buildings(faction, kind) < 2 {
        return Err(CommandError::LastHeadquarters);
    }
    let refund = entity.producible_kind().cost() / 2;

    world.entities.remove(building);
    let (_, hq) = primary_hq_mut(world, faction)?;
    hq.deposit(refund);
    world.events.sold.push(building);
    world.clear_stale_targets();
    tracing::debug!(?faction, ?kind, building, refund, "Building sold");
    Ok(refund)
}
