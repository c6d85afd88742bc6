//! Economy system for iron harvesting.
//!
//! Harvesters cycle between iron fields and their faction's headquarters:
//! drive to a field, fill up, drive home, deposit. Fields slowly regrow.

use serde::{Deserialize, Serialize};

use crate::components::{EntityId, ResourceNode};
use crate::factions::FactionId;
use crate::math::{Fixed, Vec2Fixed};
use crate::production::Headquarters;
use crate::stats::{
    HARVESTER_CAPACITY, HARVEST_TIME, RESOURCE_NODE_MAX, RESOURCE_NODE_REGEN_AMOUNT,
    RESOURCE_NODE_REGEN_PERIOD,
};
use crate::world::World;

/// Distance within which iron can be loaded or delivered.
pub const IRON_TRANSFER_RANGE: i32 = 30;

/// Fields at or above this amount are preferred over nearer, poorer ones.
pub const RICH_FIELD_THRESHOLD: u32 = 1000;

// ============================================================================
// Harvester
// ============================================================================

/// State machine for harvester behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HarvesterState {
    /// Heading to a field; `None` until one is picked.
    MovingToField {
        /// Field being approached.
        node: Option<EntityId>,
    },
    /// Loading at a field.
    Harvesting {
        /// Field being harvested.
        node: EntityId,
        /// Ticks left before the load is taken.
        remaining_ticks: u32,
    },
    /// Carrying cargo home.
    ReturningToHq,
}

/// Harvester component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Harvester {
    /// Maximum cargo.
    pub capacity: u32,
    /// Iron currently carried.
    pub cargo: u32,
    /// Current behavior state.
    pub state: HarvesterState,
}

impl Harvester {
    /// Create an empty harvester looking for a field.
    #[must_use]
    pub fn new() -> Self {
        Self {
            capacity: HARVESTER_CAPACITY,
            cargo: 0,
            state: HarvesterState::MovingToField { node: None },
        }
    }

    /// Whether cargo is at capacity.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.cargo >= self.capacity
    }
}

impl Default for Harvester {
    fn default() -> Self {
        Self::new()
    }
}

/// Economy events produced by harvesters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EconomyEvent {
    /// Harvester arrived at a field and started loading.
    HarvestStarted {
        /// Harvester entity.
        harvester: EntityId,
        /// Field entity.
        node: EntityId,
    },
    /// Harvester finished loading.
    Loaded {
        /// Harvester entity.
        harvester: EntityId,
        /// Iron taken from the field.
        amount: u32,
    },
    /// Harvester delivered its cargo.
    Deposited {
        /// Harvester entity.
        harvester: EntityId,
        /// Receiving headquarters.
        headquarters: EntityId,
        /// Iron delivered.
        amount: u32,
    },
}

/// Pick the field a harvester at `from` should head to.
///
/// Prefers the nearest field holding at least [`RICH_FIELD_THRESHOLD`];
/// otherwise the nearest field with any iron left.
#[must_use]
pub fn select_field(nodes: &[ResourceNode], from: Vec2Fixed) -> Option<EntityId> {
    let nearest = |min_remaining: u32| {
        nodes
            .iter()
            .filter(|n| n.remaining >= min_remaining)
            .min_by_key(|n| (from.distance_squared(n.position).to_bits(), n.id))
            .map(|n| n.id)
    };
    nearest(RICH_FIELD_THRESHOLD).or_else(|| nearest(1))
}

fn node_position(nodes: &[ResourceNode], id: EntityId) -> Option<(Vec2Fixed, u32)> {
    nodes.iter().find(|n| n.id == id).map(|n| (n.position, n.remaining))
}

/// Advance every harvester's state machine by one tick.
pub fn harvester_system(world: &mut World) -> Vec<EconomyEvent> {
    let mut events = Vec::new();
    let transfer_range_sq = Fixed::from_num(IRON_TRANSFER_RANGE * IRON_TRANSFER_RANGE);

    for id in world.entities.sorted_ids() {
        let Some(entity) = world.entities.get(id) else {
            continue;
        };
        let Some(harvester) = entity.as_unit().and_then(|u| u.harvester.clone()) else {
            continue;
        };
        let position = entity.position;
        let faction = entity.faction;

        let mut harvester = harvester;
        let mut move_target = entity.as_unit().and_then(|u| u.move_target);

        match harvester.state {
            HarvesterState::MovingToField { node } => {
                let node = node
                    .filter(|n| node_position(&world.resource_nodes, *n).is_some_and(|(_, r)| r > 0))
                    .or_else(|| select_field(&world.resource_nodes, position));
                harvester.state = HarvesterState::MovingToField { node };
                move_target = None;
                let target = node.and_then(|n| node_position(&world.resource_nodes, n).map(|(p, _)| (n, p)));
                if let Some((node, node_pos)) = target {
                    move_target = Some(node_pos);
                    if position.distance_squared(node_pos) < transfer_range_sq {
                        harvester.state = HarvesterState::Harvesting {
                            node,
                            remaining_ticks: HARVEST_TIME,
                        };
                        move_target = None;
                        events.push(EconomyEvent::HarvestStarted { harvester: id, node });
                    }
                }
            }
            HarvesterState::Harvesting {
                node,
                remaining_ticks,
            } => {
                if remaining_ticks > 0 {
                    harvester.state = HarvesterState::Harvesting {
                        node,
                        remaining_ticks: remaining_ticks - 1,
                    };
                } else {
                    let room = harvester.capacity.saturating_sub(harvester.cargo);
                    let amount = world
                        .resource_nodes
                        .iter_mut()
                        .find(|n| n.id == node)
                        .map_or(0, |n| n.extract(room));
                    harvester.cargo += amount;
                    harvester.state = HarvesterState::ReturningToHq;
                    move_target = world
                        .primary_hq(faction)
                        .and_then(|hq| world.entities.get(hq))
                        .map(|hq| hq.position);
                    events.push(EconomyEvent::Loaded { harvester: id, amount });
                }
            }
            HarvesterState::ReturningToHq => {
                let hq = world
                    .primary_hq(faction)
                    .and_then(|hq| world.entities.get(hq).map(|e| (hq, e.position)));
                move_target = hq.map(|(_, pos)| pos);
                if let Some((hq_id, hq_pos)) = hq {
                    if position.distance_squared(hq_pos) < transfer_range_sq {
                        let amount = harvester.cargo;
                        if let Some(stockpile) = headquarters_mut(world, hq_id) {
                            stockpile.deposit(amount);
                        }
                        harvester.cargo = 0;
                        harvester.state = HarvesterState::MovingToField { node: None };
                        move_target = None;
                        events.push(EconomyEvent::Deposited {
                            harvester: id,
                            headquarters: hq_id,
                            amount,
                        });
                        tracing::trace!(harvester = id, amount, ?faction, "Iron deposited");
                    }
                }
            }
        }

        if let Some(unit) = world.entities.get_mut(id).and_then(|e| e.as_unit_mut()) {
            unit.move_target = move_target;
            unit.harvester = Some(harvester);
        }
    }

    events
}

fn headquarters_mut(world: &mut World, id: EntityId) -> Option<&mut Headquarters> {
    world
        .entities
        .get_mut(id)
        .and_then(|e| e.as_building_mut())
        .and_then(|b| b.headquarters.as_mut())
}

/// Regrow iron fields by a fixed amount every regeneration period.
pub fn resource_regen_system(nodes: &mut [ResourceNode]) {
    for node in nodes {
        if node.regen_timer > 0 {
            node.regen_timer -= 1;
        } else {
            node.remaining = (node.remaining + RESOURCE_NODE_REGEN_AMOUNT).min(RESOURCE_NODE_MAX);
            node.regen_timer = RESOURCE_NODE_REGEN_PERIOD;
        }
    }
}

/// Average iron carried per harvester of `faction`, scaled to a per-trip
/// income estimate.
#[must_use]
pub fn income_rate(world: &World, faction: FactionId) -> Fixed {
    let (total, count) = world
        .entities
        .iter()
        .filter(|e| e.faction == faction)
        .filter_map(|e| e.as_unit().and_then(|u| u.harvester.as_ref()))
        .fold((0u32, 0u32), |(total, count), h| (total + h.cargo, count + 1));
    Fixed::from_num(total) / Fixed::from_num(count.max(1)) * Fixed::from_num(60) / Fixed::from_num(40)
}
