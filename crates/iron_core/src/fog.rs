//! Fog of war.
//!
//! Each faction owns a grid with two layers: `explored` only ever turns on,
//! `visible` is rebuilt every tick from that faction's units and buildings.

use serde::{Deserialize, Serialize};

use crate::config::SimConfig;
use crate::factions::{FactionId, PerFaction};
use crate::math::{Fixed, Vec2Fixed};
use crate::world::World;

/// Sight radius of a unit.
pub const UNIT_REVEAL_RADIUS: i32 = 150;

/// Sight radius of a building.
pub const BUILDING_REVEAL_RADIUS: i32 = 200;

/// Visibility grid for one faction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FogOfWar {
    columns: i32,
    rows: i32,
    tile_size: i32,
    explored: Vec<bool>,
    visible: Vec<bool>,
}

impl FogOfWar {
    /// Create a fully hidden grid covering the configured map.
    #[must_use]
    pub fn new(config: &SimConfig) -> Self {
        Self::with_dimensions(config.map_width, config.map_height, config.tile_size)
    }

    /// Create a fully hidden grid for a `width` x `height` map.
    #[must_use]
    pub fn with_dimensions(width: i32, height: i32, tile_size: i32) -> Self {
        let tile_size = tile_size.max(1);
        let columns = (width / tile_size).max(0);
        let rows = (height / tile_size).max(0);
        let cells = (columns * rows) as usize;
        Self {
            columns,
            rows,
            tile_size,
            explored: vec![false; cells],
            visible: vec![false; cells],
        }
    }

    /// Grid size in tiles.
    #[must_use]
    pub fn dimensions(&self) -> (i32, i32) {
        (self.columns, self.rows)
    }

    /// Hide every tile. Explored state is kept.
    pub fn clear_visible(&mut self) {
        self.visible.fill(false);
    }

    /// Mark every tile whose centre lies within `radius` of `center` as
    /// visible and explored.
    pub fn reveal(&mut self, center: Vec2Fixed, radius: i32) {
        let tile = Fixed::from_num(self.tile_size);
        let half = tile / 2;
        let radius_fixed = Fixed::from_num(radius);
        let radius_sq = radius_fixed * radius_fixed;

        let to_tile = |v: Fixed| (v / tile).floor().to_num::<i32>();
        let min_col = to_tile(center.x - radius_fixed).max(0);
        let max_col = to_tile(center.x + radius_fixed).min(self.columns - 1);
        let min_row = to_tile(center.y - radius_fixed).max(0);
        let max_row = to_tile(center.y + radius_fixed).min(self.rows - 1);

        for row in min_row..=max_row {
            for col in min_col..=max_col {
                let tile_center = Vec2Fixed::new(
                    Fixed::from_num(col) * tile + half,
                    Fixed::from_num(row) * tile + half,
                );
                if tile_center.distance_squared(center) <= radius_sq {
                    let index = (row * self.columns + col) as usize;
                    self.visible[index] = true;
                    self.explored[index] = true;
                }
            }
        }
    }

    /// Rebuild visibility from `faction`'s entities.
    pub fn update(&mut self, world: &World, faction: FactionId) {
        self.clear_visible();
        for entity in world.entities.iter_sorted().filter(|e| e.faction == faction) {
            let radius = if entity.is_building() {
                BUILDING_REVEAL_RADIUS
            } else {
                UNIT_REVEAL_RADIUS
            };
            self.reveal(entity.position, radius);
        }
    }

    fn tile_index(&self, point: Vec2Fixed) -> Option<usize> {
        if point.x < Fixed::ZERO || point.y < Fixed::ZERO {
            return None;
        }
        let tile = Fixed::from_num(self.tile_size);
        let col = (point.x / tile).floor().to_num::<i32>();
        let row = (point.y / tile).floor().to_num::<i32>();
        (col < self.columns && row < self.rows).then(|| (row * self.columns + col) as usize)
    }

    /// Whether `point` is currently in sight. False off the map.
    #[must_use]
    pub fn is_visible(&self, point: Vec2Fixed) -> bool {
        self.tile_index(point).is_some_and(|i| self.visible[i])
    }

    /// Whether `point` has ever been in sight. False off the map.
    #[must_use]
    pub fn is_explored(&self, point: Vec2Fixed) -> bool {
        self.tile_index(point).is_some_and(|i| self.explored[i])
    }

    /// Number of explored tiles.
    #[must_use]
    pub fn explored_count(&self) -> usize {
        self.explored.iter().filter(|e| **e).count()
    }

    /// Number of visible tiles.
    #[must_use]
    pub fn visible_count(&self) -> usize {
        self.visible.iter().filter(|v| **v).count()
    }
}

/// Refresh both factions' grids and mark newly explored enemy buildings
/// as discovered.
pub fn fog_system(world: &mut World, fog: &mut PerFaction<FogOfWar>) {
    for faction in FactionId::ALL {
        fog.get_mut(faction).update(world, faction);
    }

    for id in world.entities.sorted_ids() {
        let Some(entity) = world.entities.get_mut(id) else {
            continue;
        };
        let observer = fog.get(entity.faction.opponent());
        let position = entity.position;
        if let Some(building) = entity.as_building_mut() {
            if !building.discovered && observer.is_explored(position) {
                building.discovered = true;
                tracing::debug!(building = id, kind = ?building.kind, "Enemy building discovered");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{BuildingKind, Entity, UnitKind};
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn vec2(x: i32, y: i32) -> Vec2Fixed {
        Vec2Fixed::from_ints(x, y)
    }

    fn fog() -> FogOfWar {
        FogOfWar::new(&SimConfig::default())
    }

    #[test]
    fn test_default_grid_dimensions() {
        assert_eq!(fog().dimensions(), (50, 25));
    }

    #[test]
    fn test_reveal_is_circular() {
        let mut fog = fog();
        fog.reveal(vec2(800, 400), 150);
        assert!(fog.is_visible(vec2(800, 400)));
        assert!(fog.is_visible(vec2(940, 400)));
        // The corner of the bounding square lies outside the disc.
        assert!(!fog.is_visible(vec2(930, 530)));
        assert!(!fog.is_visible(vec2(960, 400)));
    }

    #[test]
    fn test_out_of_bounds_queries_are_false() {
        let mut fog = fog();
        fog.reveal(vec2(10, 10), 200);
        assert!(fog.is_explored(vec2(0, 0)));
        assert!(!fog.is_explored(vec2(-1, 5)));
        assert!(!fog.is_visible(vec2(1600, 5)));
        assert!(!fog.is_visible(vec2(5, 800)));
    }

    #[test]
    fn test_visible_resets_but_explored_persists() {
        let mut fog = fog();
        fog.reveal(vec2(800, 400), 150);
        fog.clear_visible();
        assert!(!fog.is_visible(vec2(800, 400)));
        assert!(fog.is_explored(vec2(800, 400)));
        assert_eq!(fog.visible_count(), 0);
    }

    #[test]
    fn test_update_uses_own_entities_only() {
        let mut world = World::new(ChaCha8Rng::seed_from_u64(1));
        world.spawn(Entity::new_unit(UnitKind::Infantry, FactionId::Gdi, vec2(200, 200)));
        world.spawn(Entity::new_building(BuildingKind::Barracks, FactionId::Nod, vec2(1200, 400)));
        let mut fog = fog();
        fog.update(&world, FactionId::Gdi);
        assert!(fog.is_visible(vec2(200, 200)));
        assert!(fog.is_visible(vec2(200, 340)));
        assert!(!fog.is_visible(vec2(1230, 430)));
    }

    #[test]
    fn test_buildings_see_further_than_units() {
        let mut world = World::new(ChaCha8Rng::seed_from_u64(1));
        // Power plant centre (830, 430).
        world.spawn(Entity::new_building(BuildingKind::PowerPlant, FactionId::Gdi, vec2(800, 400)));
        let mut fog = fog();
        fog.update(&world, FactionId::Gdi);
        assert!(fog.is_visible(vec2(1010, 430)));
    }

    #[test]
    fn test_discovery_persists() {
        let mut world = World::new(ChaCha8Rng::seed_from_u64(1));
        let scout = world.spawn(Entity::new_unit(UnitKind::Infantry, FactionId::Gdi, vec2(1150, 430)));
        let barracks = world.spawn(Entity::new_building(BuildingKind::Barracks, FactionId::Nod, vec2(1200, 400)));
        let mut fog = PerFaction::from_fn(|_| FogOfWar::new(&SimConfig::default()));

        fog_system(&mut world, &mut fog);
        let discovered = |world: &World| world.entities.get(barracks).unwrap().as_building().unwrap().discovered;
        assert!(discovered(&world));

        world.destroy(scout);
        fog_system(&mut world, &mut fog);
        assert!(!fog.gdi.is_visible(vec2(1230, 430)));
        assert!(discovered(&world));
    }

    proptest! {
        #[test]
        fn prop_explored_is_monotonic(
            reveals in prop::collection::vec((0i32..1600, 0i32..800, 50i32..250), 1..20)
        ) {
            let mut fog = fog();
            let mut explored_before = fog.explored.clone();
            for (x, y, radius) in reveals {
                fog.clear_visible();
                fog.reveal(vec2(x, y), radius);
                for (before, after) in explored_before.iter().zip(fog.explored.iter()) {
                    prop_assert!(!*before || *after);
                }
                prop_assert!(fog.visible_count() <= fog.explored_count());
                explored_before = fog.explored.clone();
            }
        }
    }
}
