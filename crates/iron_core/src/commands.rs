//! Player and AI commands.
//!
//! Every order that changes the simulation from outside the tick loop is a
//! [`Command`]. Commands are validated up front; a rejected command leaves
//! the world exactly as it was.

use serde::{Deserialize, Serialize};

use crate::components::{EntityId, ProducibleKind};
use crate::config::SimConfig;
use crate::error::CommandError;
use crate::factions::FactionId;
use crate::math::Vec2Fixed;
use crate::movement::{centroid, formation_positions};
use crate::production;
use crate::world::World;

/// An order issued on behalf of a faction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Move a group to a point in formation.
    Move {
        /// Issuing faction.
        faction: FactionId,
        /// Units to move, in slot order.
        units: Vec<EntityId>,
        /// Formation anchor.
        destination: Vec2Fixed,
    },
    /// Send a group after an entity.
    Attack {
        /// Issuing faction.
        faction: FactionId,
        /// Attacking units.
        units: Vec<EntityId>,
        /// Entity to pursue.
        target: EntityId,
    },
    /// Replace a single unit's orders.
    Order {
        /// Issuing faction.
        faction: FactionId,
        /// Unit receiving the order.
        unit: EntityId,
        /// Point to move to.
        destination: Option<Vec2Fixed>,
        /// Entity to pursue.
        target: Option<EntityId>,
    },
    /// Queue an item at the primary headquarters.
    Enqueue {
        /// Issuing faction.
        faction: FactionId,
        /// Item to produce.
        item: ProducibleKind,
    },
    /// Place the pending building at the tile containing `point`.
    PlaceBuilding {
        /// Issuing faction.
        faction: FactionId,
        /// Requested top-left point, snapped to the grid.
        point: Vec2Fixed,
    },
    /// Discard the pending building.
    CancelPending {
        /// Issuing faction.
        faction: FactionId,
    },
    /// Sell a building for half its cost.
    Sell {
        /// Issuing faction.
        faction: FactionId,
        /// Building to sell.
        building: EntityId,
    },
}

impl Command {
    /// Faction the command acts for.
    #[must_use]
    pub fn faction(&self) -> FactionId {
        match self {
            Self::Move { faction, .. }
            | Self::Attack { faction, .. }
            | Self::Order { faction, .. }
            | Self::Enqueue { faction, .. }
            | Self::PlaceBuilding { faction, .. }
            | Self::CancelPending { faction }
            | Self::Sell { faction, .. } => *faction,
        }
    }
}

/// Check that every id is a unit owned by `faction`.
fn validate_units(world: &World, faction: FactionId, units: &[EntityId]) -> Result<(), CommandError> {
    for &id in units {
        let entity = world.entities.get(id).ok_or(CommandError::EntityNotFound(id))?;
        if entity.faction != faction {
            return Err(CommandError::NotOwned { entity: id, faction });
        }
        if !entity.is_unit() {
            return Err(CommandError::NotAUnit(id));
        }
    }
    Ok(())
}

fn validate_target(world: &World, target: EntityId) -> Result<(), CommandError> {
    if world.entities.contains(target) {
        Ok(())
    } else {
        Err(CommandError::EntityNotFound(target))
    }
}

/// Validate and execute `command`.
pub fn apply_command(world: &mut World, config: &SimConfig, command: &Command) -> Result<(), CommandError> {
    match command {
        Command::Move {
            faction,
            units,
            destination,
        } => {
            validate_units(world, *faction, units)?;
            let positions: Vec<Vec2Fixed> = units
                .iter()
                .filter_map(|id| world.entities.get(*id).map(|e| e.position))
                .collect();
            let slots = formation_positions(centroid(&positions), *destination, units.len());
            for (id, slot) in units.iter().zip(slots) {
                if let Some(unit) = world.entities.get_mut(*id).and_then(|e| e.as_unit_mut()) {
                    unit.clear_orders();
                    unit.formation_target = Some(slot);
                }
            }
            Ok(())
        }
        Command::Attack {
            faction,
            units,
            target,
        } => {
            validate_units(world, *faction, units)?;
            validate_target(world, *target)?;
            for id in units {
                if let Some(unit) = world.entities.get_mut(*id).and_then(|e| e.as_unit_mut()) {
                    unit.clear_orders();
                    unit.target_unit = Some(*target);
                }
            }
            Ok(())
        }
        Command::Order {
            faction,
            unit,
            destination,
            target,
        } => {
            validate_units(world, *faction, std::slice::from_ref(unit))?;
            if let Some(target) = target {
                validate_target(world, *target)?;
            }
            if let Some(payload) = world.entities.get_mut(*unit).and_then(|e| e.as_unit_mut()) {
                payload.clear_orders();
                payload.move_target = *destination;
                payload.target_unit = *target;
            }
            Ok(())
        }
        Command::Enqueue { faction, item } => production::enqueue(world, *faction, *item),
        Command::PlaceBuilding { faction, point } => {
            production::place_pending_building(world, config, *faction, *point).map(|_| ())
        }
        Command::CancelPending { faction } => production::cancel_pending_building(world, *faction).map(|_| ()),
        Command::Sell { faction, building } => production::sell_building(world, *faction, *building).map(|_| ()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{BuildingKind, Entity, UnitKind};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn vec2(x: i32, y: i32) -> Vec2Fixed {
        Vec2Fixed::from_ints(x, y)
    }

    fn world() -> World {
        World::new(ChaCha8Rng::seed_from_u64(2))
    }

    #[test]
    fn test_group_move_assigns_distinct_slots() {
        let mut world = world();
        let config = SimConfig::default();
        let units: Vec<_> = (0..3)
            .map(|i| world.spawn(Entity::new_unit(UnitKind::Infantry, FactionId::Gdi, vec2(100 + 20 * i, 100))))
            .collect();
        let command = Command::Move {
            faction: FactionId::Gdi,
            units: units.clone(),
            destination: vec2(600, 100),
        };
        apply_command(&mut world, &config, &command).unwrap();

        let slots: Vec<_> = units
            .iter()
            .map(|id| world.entities.get(*id).unwrap().as_unit().unwrap().formation_target.unwrap())
            .collect();
        assert_eq!(slots, vec![vec2(630, 60), vec2(630, 80), vec2(630, 100)]);
    }

    #[test]
    fn test_foreign_unit_rejects_whole_group() {
        let mut world = world();
        let config = SimConfig::default();
        let own = world.spawn(Entity::new_unit(UnitKind::Tank, FactionId::Gdi, vec2(100, 100)));
        let foreign = world.spawn(Entity::new_unit(UnitKind::Tank, FactionId::Nod, vec2(300, 100)));
        let command = Command::Attack {
            faction: FactionId::Gdi,
            units: vec![own, foreign],
            target: foreign,
        };
        assert_eq!(
            apply_command(&mut world, &config, &command),
            Err(CommandError::NotOwned {
                entity: foreign,
                faction: FactionId::Gdi
            })
        );
        assert!(world.entities.get(own).unwrap().as_unit().unwrap().is_idle());
    }

    #[test]
    fn test_attack_sets_target() {
        let mut world = world();
        let config = SimConfig::default();
        let own = world.spawn(Entity::new_unit(UnitKind::Tank, FactionId::Gdi, vec2(100, 100)));
        let enemy = world.spawn(Entity::new_building(BuildingKind::Barracks, FactionId::Nod, vec2(300, 100)));
        let command = Command::Attack {
            faction: FactionId::Gdi,
            units: vec![own],
            target: enemy,
        };
        apply_command(&mut world, &config, &command).unwrap();
        assert_eq!(world.entities.get(own).unwrap().as_unit().unwrap().target_unit, Some(enemy));
    }

    #[test]
    fn test_order_rejects_buildings_and_missing_targets() {
        let mut world = world();
        let config = SimConfig::default();
        let barracks = world.spawn(Entity::new_building(BuildingKind::Barracks, FactionId::Gdi, vec2(300, 100)));
        let infantry = world.spawn(Entity::new_unit(UnitKind::Infantry, FactionId::Gdi, vec2(100, 100)));

        let order = |unit, target| Command::Order {
            faction: FactionId::Gdi,
            unit,
            destination: Some(vec2(50, 50)),
            target,
        };
        assert_eq!(
            apply_command(&mut world, &config, &order(barracks, None)),
            Err(CommandError::NotAUnit(barracks))
        );
        assert_eq!(
            apply_command(&mut world, &config, &order(infantry, Some(77))),
            Err(CommandError::EntityNotFound(77))
        );
        apply_command(&mut world, &config, &order(infantry, None)).unwrap();
        assert_eq!(
            world.entities.get(infantry).unwrap().as_unit().unwrap().move_target,
            Some(vec2(50, 50))
        );
    }

    #[test]
    fn test_production_commands_route_to_headquarters() {
        let mut world = world();
        let config = SimConfig::default();
        world.spawn(Entity::new_building(BuildingKind::Headquarters, FactionId::Nod, vec2(1300, 500)));
        let enqueue = Command::Enqueue {
            faction: FactionId::Nod,
            item: ProducibleKind::Building(BuildingKind::PowerPlant),
        };
        assert_eq!(enqueue.faction(), FactionId::Nod);
        apply_command(&mut world, &config, &enqueue).unwrap();
        let hq = production::primary_headquarters(&world, FactionId::Nod).unwrap();
        assert_eq!(hq.iron, 1200);
        assert_eq!(
            apply_command(&mut world, &config, &Command::CancelPending { faction: FactionId::Nod }),
            Err(CommandError::NoPendingBuilding)
        );
    }
}
