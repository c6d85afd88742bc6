//! Unit movement, soft collision and group formations.
//!
//! Movement resolves each unit's effective destination in priority order:
//! a living `target_unit` still out of weapon range, then the formation
//! slot, then the plain move order.

use crate::components::{EntityId, UnitKind};
use crate::math::{Fixed, Rect, Vec2Fixed};
use crate::stats::unit_stats;
use crate::world::World;

/// Distance at which a destination counts as reached.
pub const ARRIVAL_RADIUS: i32 = 5;

/// Columns in a formation grid.
pub const FORMATION_COLUMNS: usize = 5;

/// Rows in a formation grid.
pub const FORMATION_ROWS: usize = 4;

/// Gap between neighbouring formation slots.
pub const FORMATION_SPACING: i32 = 20;

fn collision_push() -> Fixed {
    Fixed::from_num(0.5)
}

fn harvester_push() -> Fixed {
    Fixed::from_num(0.3)
}

/// Where a unit is heading this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Destination {
    Pursue(Vec2Fixed),
    Formation(Vec2Fixed),
    Move(Vec2Fixed),
    Hold,
}

/// Advance every unit one step toward its destination and keep it on the map.
pub fn movement_system(world: &mut World, map: Rect) {
    let arrival_sq = Fixed::from_num(ARRIVAL_RADIUS * ARRIVAL_RADIUS);

    for id in world.entities.sorted_ids() {
        let Some(entity) = world.entities.get(id) else {
            continue;
        };
        let Some(unit) = entity.as_unit() else {
            continue;
        };
        let stats = unit_stats(unit.kind, entity.faction);
        let position = entity.position;

        // Pursuit takes precedence over every point order.
        let mut drop_target = false;
        let mut in_range = false;
        let mut pursue = None;
        if let Some(target) = unit.target_unit {
            match world.entities.get(target) {
                None => drop_target = true,
                Some(target) => {
                    let dist_sq = position.distance_squared(target.position);
                    let leashed = stats
                        .targeting_range
                        .is_some_and(|leash| dist_sq > leash * leash);
                    let range = stats.weapon.range;
                    if leashed {
                        drop_target = true;
                    } else if dist_sq > range * range {
                        pursue = Some(target.position);
                    } else {
                        in_range = true;
                    }
                }
            }
        }

        let destination = if in_range {
            Destination::Hold
        } else if let Some(point) = pursue {
            Destination::Pursue(point)
        } else if let Some(point) = unit.formation_target {
            Destination::Formation(point)
        } else if let Some(point) = unit.move_target {
            Destination::Move(point)
        } else {
            Destination::Hold
        };

        let size = entity.size;
        let speed = unit.speed;
        let Some(entity) = world.entities.get_mut(id) else {
            continue;
        };
        let Some(unit) = entity.as_unit_mut() else {
            continue;
        };
        if drop_target {
            unit.target_unit = None;
        }

        let point = match destination {
            Destination::Hold => {
                if in_range {
                    unit.move_target = None;
                    unit.formation_target = None;
                }
                entity.position = map.clamp_center(entity.position, size);
                continue;
            }
            Destination::Pursue(point) | Destination::Formation(point) | Destination::Move(point) => point,
        };

        if position.distance_squared(point) <= arrival_sq {
            match destination {
                Destination::Formation(_) => unit.formation_target = None,
                Destination::Move(_) => unit.move_target = None,
                Destination::Pursue(_) | Destination::Hold => {}
            }
        } else {
            entity.position = position + position.step_toward(point, speed);
        }
        entity.position = map.clamp_center(entity.position, size);
    }
}

/// Push overlapping units apart.
///
/// Every pair of units whose boxes overlap is separated along the line
/// between their centres. Two harvesters push more gently so they can
/// bunch up at a field.
pub fn collision_system(world: &mut World, map: Rect) {
    let units: Vec<(EntityId, bool)> = world
        .entities
        .iter_sorted()
        .filter_map(|e| e.unit_kind().map(|kind| (e.id, kind == UnitKind::Harvester)))
        .collect();

    for (i, &(a, a_harvester)) in units.iter().enumerate() {
        for &(b, b_harvester) in &units[i + 1..] {
            let (Some(first), Some(second)) = (world.entities.get(a), world.entities.get(b)) else {
                continue;
            };
            if !first.bounds().intersects(&second.bounds()) {
                continue;
            }
            let mut direction = (first.position - second.position).normalize();
            if direction == Vec2Fixed::ZERO {
                direction = Vec2Fixed::new(Fixed::ONE, Fixed::ZERO);
            }
            let push = if a_harvester && b_harvester {
                harvester_push()
            } else {
                collision_push()
            };
            let offset = direction.scale(push);

            if let Some(first) = world.entities.get_mut(a) {
                first.position = map.clamp_center(first.position + offset, first.size);
            }
            if let Some(second) = world.entities.get_mut(b) {
                second.position = map.clamp_center(second.position - offset, second.size);
            }
        }
    }
}

/// Formation slots for `count` units travelling from `origin` to `destination`.
///
/// Slots form a grid of [`FORMATION_COLUMNS`] by [`FORMATION_ROWS`] centred
/// on the destination and rotated to face the direction of travel. The
/// first row leads. Units past the last slot share the destination itself.
#[must_use]
pub fn formation_positions(origin: Vec2Fixed, destination: Vec2Fixed, count: usize) -> Vec<Vec2Fixed> {
    let mut forward = (destination - origin).normalize();
    if forward == Vec2Fixed::ZERO {
        forward = Vec2Fixed::new(Fixed::ONE, Fixed::ZERO);
    }
    let right = Vec2Fixed::new(-forward.y, forward.x);
    let spacing = Fixed::from_num(FORMATION_SPACING);
    let center_column = Fixed::from_num(FORMATION_COLUMNS as i32 - 1) / 2;
    let center_row = Fixed::from_num(FORMATION_ROWS as i32 - 1) / 2;

    (0..count)
        .map(|slot| {
            if slot >= FORMATION_COLUMNS * FORMATION_ROWS {
                return destination;
            }
            let column = Fixed::from_num((slot % FORMATION_COLUMNS) as i32) - center_column;
            let row = Fixed::from_num((slot / FORMATION_COLUMNS) as i32) - center_row;
            destination + right.scale(column * spacing) - forward.scale(row * spacing)
        })
        .collect()
}

/// Centroid of a set of points; the origin when empty.
#[must_use]
pub fn centroid(points: &[Vec2Fixed]) -> Vec2Fixed {
    if points.is_empty() {
        return Vec2Fixed::ZERO;
    }
    let sum = points.iter().fold(Vec2Fixed::ZERO, |acc, p| acc + *p);
    let n = Fixed::from_num(points.len() as i32);
    Vec2Fixed::new(sum.x / n, sum.y / n)
}
