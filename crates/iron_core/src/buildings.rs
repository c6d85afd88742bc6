//! Building placement validation and construction progress.
//!
//! Placement coordinates are the top-left corner of the footprint, snapped
//! to the tile grid. A placement is valid when the footprint lies inside
//! the map, is within construction range of a living friendly building,
//! and overlaps no living building of either faction.

use serde::{Deserialize, Serialize};

use crate::components::{BuildingKind, EntityId};
use crate::config::SimConfig;
use crate::factions::FactionId;
use crate::math::{Fixed, Rect, Vec2Fixed};
use crate::stats::{building_stats, CONSTRUCTION_TIME};
use crate::world::World;

/// Result of a placement check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlacementResult {
    /// Placement is valid.
    Valid,
    /// Footprint would extend past the map edge.
    OutOfBounds,
    /// No living friendly building within construction range.
    TooFarFromBase,
    /// Footprint overlaps an existing building.
    Blocked {
        /// First overlapping building, in id order.
        building: EntityId,
    },
}

impl PlacementResult {
    /// Check if placement is valid.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, PlacementResult::Valid)
    }
}

/// Snap a point to the top-left corner of the tile containing it.
#[must_use]
pub fn snap_to_grid(pos: Vec2Fixed, tile_size: i32) -> Vec2Fixed {
    let tile = Fixed::from_num(tile_size);
    Vec2Fixed::new((pos.x / tile).floor() * tile, (pos.y / tile).floor() * tile)
}

/// Footprint of a building of `kind` placed at `top_left`.
#[must_use]
pub fn footprint(kind: BuildingKind, top_left: Vec2Fixed) -> Rect {
    Rect::from_top_left(top_left, building_stats(kind).size)
}

/// Check whether `faction` may place a `kind` building at `top_left`.
///
/// The three conditions are checked in order: map bounds, construction
/// range, overlap. The first failing condition is reported.
#[must_use]
pub fn validate_placement(
    world: &World,
    config: &SimConfig,
    faction: FactionId,
    kind: BuildingKind,
    top_left: Vec2Fixed,
) -> PlacementResult {
    let rect = footprint(kind, top_left);
    if !config.map_bounds().contains_rect(&rect) {
        return PlacementResult::OutOfBounds;
    }

    let range = Fixed::from_num(config.construction_range);
    let range_sq = range * range;
    let near_base = world.entities.iter().any(|e| {
        e.faction == faction && e.is_building() && top_left.distance_squared(e.position) < range_sq
    });
    if !near_base {
        return PlacementResult::TooFarFromBase;
    }

    let blocker = world
        .entities
        .iter_sorted()
        .find(|e| e.is_building() && rect.intersects(&e.bounds()));
    if let Some(blocker) = blocker {
        return PlacementResult::Blocked {
            building: blocker.id,
        };
    }

    PlacementResult::Valid
}

/// Advance cosmetic construction progress on every building.
pub fn construction_system(world: &mut World) {
    for id in world.entities.sorted_ids() {
        if let Some(building) = world.entities.get_mut(id).and_then(|e| e.as_building_mut()) {
            if building.construction_progress < CONSTRUCTION_TIME {
                building.construction_progress += 1;
            }
        }
    }
}
