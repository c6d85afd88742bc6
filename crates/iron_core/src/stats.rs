//! Fixed tuning tables for every unit and building kind.
//!
//! These values define the balance of the game. They are plain constants
//! rather than loaded data: the simulation is meant to be reproducible from
//! a [`SimConfig`](crate::config::SimConfig) alone.

use crate::components::{BuildingKind, UnitKind};
use crate::factions::FactionId;
use crate::math::{Fixed, Vec2Fixed};

/// How a weapon delivers damage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeaponKind {
    /// Damage applied instantly on the attack tick.
    Melee,
    /// Damage carried by a spawned projectile.
    Ranged,
}

/// Offensive stats shared by units and turrets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeaponStats {
    /// Damage per hit.
    pub damage: u32,
    /// Maximum distance at which an attack can start.
    pub range: Fixed,
    /// Ticks between attacks.
    pub cooldown: u32,
    /// Melee or ranged delivery.
    pub kind: WeaponKind,
}

/// Per-kind unit stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitStats {
    /// Iron cost.
    pub cost: u32,
    /// Power drawn while alive.
    pub power_usage: u32,
    /// Starting and maximum health.
    pub health: u32,
    /// Distance moved per tick.
    pub speed: Fixed,
    /// Bounding box size.
    pub size: Vec2Fixed,
    /// Weapon.
    pub weapon: WeaponStats,
    /// Leash distance for an assigned `target_unit`, if the kind leashes.
    pub targeting_range: Option<Fixed>,
}

/// Per-kind building stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildingStats {
    /// Iron cost.
    pub cost: u32,
    /// Power drawn while alive.
    pub power_usage: u32,
    /// Power generated while alive.
    pub power_output: u32,
    /// Starting and maximum health.
    pub health: u32,
    /// Footprint size. The footprint's top-left is the placement point.
    pub size: Vec2Fixed,
    /// Weapon, for defensive structures.
    pub weapon: Option<WeaponStats>,
}

/// Ticks for a building to finish its (purely cosmetic) construction.
pub const CONSTRUCTION_TIME: u32 = 50;

/// Harvester cargo capacity.
pub const HARVESTER_CAPACITY: u32 = 100;

/// Ticks a harvester spends filling up at a field.
pub const HARVEST_TIME: u32 = 40;

/// Projectile travel per tick.
pub const PROJECTILE_SPEED: i32 = 6;

/// Distance at which a projectile counts as having reached its target.
pub const PROJECTILE_HIT_RADIUS: i32 = 3;

/// Projectile bounding box.
pub const PROJECTILE_SIZE: (i32, i32) = (10, 5);

/// Iron field footprint.
pub const RESOURCE_NODE_SIZE: i32 = 40;

/// Maximum (and starting) iron in a field.
pub const RESOURCE_NODE_MAX: u32 = 5000;

/// Iron regenerated per regeneration period.
pub const RESOURCE_NODE_REGEN_AMOUNT: u32 = 15;

/// Ticks between regeneration pulses.
pub const RESOURCE_NODE_REGEN_PERIOD: u32 = 500;

fn size(w: i32, h: i32) -> Vec2Fixed {
    Vec2Fixed::from_ints(w, h)
}

/// Stats for a unit kind fielded by `faction`.
#[must_use]
pub fn unit_stats(kind: UnitKind, faction: FactionId) -> UnitStats {
    let gdi = faction == FactionId::Gdi;
    match kind {
        UnitKind::Infantry => UnitStats {
            cost: 100,
            power_usage: 5,
            health: if gdi { 100 } else { 60 },
            speed: if gdi {
                Fixed::from_num(3.5)
            } else {
                Fixed::from_num(4)
            },
            size: size(16, 16),
            weapon: WeaponStats {
                damage: 8,
                range: Fixed::from_num(50),
                cooldown: 25,
                kind: WeaponKind::Melee,
            },
            targeting_range: Some(Fixed::from_num(200)),
        },
        UnitKind::Tank => UnitStats {
            cost: 500,
            power_usage: 15,
            health: if gdi { 200 } else { 120 },
            speed: if gdi {
                Fixed::from_num(2.5)
            } else {
                Fixed::from_num(3)
            },
            size: size(30, 20),
            weapon: WeaponStats {
                damage: if gdi { 20 } else { 15 },
                range: Fixed::from_num(200),
                cooldown: 50,
                kind: WeaponKind::Ranged,
            },
            targeting_range: Some(Fixed::from_num(250)),
        },
        UnitKind::Harvester => UnitStats {
            cost: 800,
            power_usage: 20,
            health: 300,
            speed: Fixed::from_num(2.5),
            size: size(50, 30),
            weapon: WeaponStats {
                damage: 10,
                range: Fixed::from_num(50),
                cooldown: 30,
                kind: WeaponKind::Melee,
            },
            targeting_range: None,
        },
    }
}

/// Stats for a building kind.
#[must_use]
pub fn building_stats(kind: BuildingKind) -> BuildingStats {
    let base = BuildingStats {
        cost: 0,
        power_usage: 0,
        power_output: 0,
        health: 0,
        size: size(60, 60),
        weapon: None,
    };
    match kind {
        BuildingKind::Headquarters => BuildingStats {
            cost: 2000,
            health: 1200,
            size: size(80, 80),
            ..base
        },
        BuildingKind::Barracks => BuildingStats {
            cost: 500,
            power_usage: 25,
            health: 600,
            ..base
        },
        BuildingKind::WarFactory => BuildingStats {
            cost: 1000,
            power_usage: 35,
            health: 800,
            ..base
        },
        BuildingKind::PowerPlant => BuildingStats {
            cost: 300,
            power_output: 100,
            health: 500,
            ..base
        },
        BuildingKind::Turret => BuildingStats {
            cost: 600,
            power_usage: 25,
            health: 500,
            size: size(50, 50),
            weapon: Some(WeaponStats {
                damage: 15,
                range: Fixed::from_num(180),
                cooldown: 25,
                kind: WeaponKind::Ranged,
            }),
            ..base
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_faction_variants_differ() {
        let gdi = unit_stats(UnitKind::Infantry, FactionId::Gdi);
        let nod = unit_stats(UnitKind::Infantry, FactionId::Nod);
        assert!(gdi.health > nod.health);
        assert!(gdi.speed < nod.speed);
        assert_eq!(gdi.cost, nod.cost);
    }

    #[test]
    fn test_only_tanks_and_turrets_fire_projectiles() {
        for faction in FactionId::ALL {
            assert_eq!(
                unit_stats(UnitKind::Tank, faction).weapon.kind,
                WeaponKind::Ranged
            );
            assert_eq!(
                unit_stats(UnitKind::Infantry, faction).weapon.kind,
                WeaponKind::Melee
            );
        }
        let turret = building_stats(BuildingKind::Turret);
        assert_eq!(turret.weapon.map(|w| w.kind), Some(WeaponKind::Ranged));
        assert!(building_stats(BuildingKind::Barracks).weapon.is_none());
    }

    #[test]
    fn test_only_power_plants_generate_power() {
        let producers: Vec<_> = BuildingKind::ALL
            .into_iter()
            .filter(|k| building_stats(*k).power_output > 0)
            .collect();
        assert_eq!(producers, vec![BuildingKind::PowerPlant]);
    }
}
