//! Combat resolution: target acquisition, melee hits, projectiles.
//!
//! Infantry and tanks engage any enemy unit or building in weapon range.
//! Harvesters only swat enemy infantry that come close. Turrets engage
//! enemy units only. Ranged weapons spawn homing projectiles; melee
//! weapons deal damage on the spot.

use serde::{Deserialize, Serialize};

use crate::components::{EntityId, Particle, ParticleKind, UnitKind};
use crate::factions::FactionId;
use crate::math::{Fixed, Vec2Fixed};
use crate::stats::{WeaponKind, WeaponStats, PROJECTILE_HIT_RADIUS, PROJECTILE_SPEED};
use crate::world::World;

/// Muzzle smoke particles per ranged shot.
const SMOKE_PARTICLES: u32 = 5;

/// Spark particles per melee hit.
const SPARK_PARTICLES: u32 = 3;

/// Explosion particles per projectile impact.
const EXPLOSION_PARTICLES: u32 = 5;

/// Ticks between trail particles behind a projectile.
const TRAIL_INTERVAL: u32 = 2;

/// A weapon discharge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShotEvent {
    /// Unit or turret that fired.
    pub shooter: EntityId,
    /// Entity aimed at.
    pub target: EntityId,
    /// Projectile spawned, for ranged weapons.
    pub projectile: Option<EntityId>,
}

/// Which enemies an attacker may pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TargetFilter {
    /// Any enemy unit or building.
    Any,
    /// Enemy units only.
    Units,
    /// Enemy infantry only.
    Infantry,
}

impl TargetFilter {
    fn accepts(self, unit_kind: Option<UnitKind>) -> bool {
        match self {
            Self::Any => true,
            Self::Units => unit_kind.is_some(),
            Self::Infantry => unit_kind == Some(UnitKind::Infantry),
        }
    }
}

// ============================================================================
// Target acquisition
// ============================================================================

/// Nearest enemy of `faction` within `range` of `from`, in id order on ties.
///
/// With `strict` the distance must be below the range, otherwise at most
/// the range.
fn nearest_enemy(
    world: &World,
    faction: FactionId,
    from: Vec2Fixed,
    range: Fixed,
    filter: TargetFilter,
    strict: bool,
) -> Option<EntityId> {
    let range_sq = range * range;
    let mut best: Option<(Fixed, EntityId)> = None;
    for entity in world.entities.iter_sorted() {
        if entity.faction == faction || !filter.accepts(entity.unit_kind()) {
            continue;
        }
        let dist_sq = from.distance_squared(entity.position);
        let in_range = if strict { dist_sq < range_sq } else { dist_sq <= range_sq };
        if in_range && best.map_or(true, |(d, _)| dist_sq < d) {
            best = Some((dist_sq, entity.id));
        }
    }
    best.map(|(_, id)| id)
}

/// Keep `current` if it is still a valid enemy in range, else find the nearest.
fn acquire_target(
    world: &World,
    faction: FactionId,
    from: Vec2Fixed,
    current: Option<EntityId>,
    range: Fixed,
    filter: TargetFilter,
    strict: bool,
) -> Option<EntityId> {
    let range_sq = range * range;
    let keep = current.filter(|id| {
        world.entities.get(*id).is_some_and(|target| {
            let dist_sq = from.distance_squared(target.position);
            target.faction != faction
                && filter.accepts(target.unit_kind())
                && if strict { dist_sq < range_sq } else { dist_sq <= range_sq }
        })
    });
    keep.or_else(|| nearest_enemy(world, faction, from, range, filter, strict))
}

/// Fire `weapon` from `shooter` at `target`.
///
/// Returns whether the target died.
fn discharge(
    world: &mut World,
    shooter: EntityId,
    faction: FactionId,
    origin: Vec2Fixed,
    target: EntityId,
    weapon: WeaponStats,
) -> bool {
    let Some(target_position) = world.entities.get(target).map(|e| e.position) else {
        return false;
    };
    match weapon.kind {
        WeaponKind::Ranged => {
            let projectile = world.spawn_projectile(faction, origin, target, weapon.damage);
            world.spawn_particles(ParticleKind::Smoke, origin, SMOKE_PARTICLES, Fixed::ONE, 20);
            world.events.shots.push(ShotEvent {
                shooter,
                target,
                projectile: Some(projectile),
            });
            false
        }
        WeaponKind::Melee => {
            world.events.shots.push(ShotEvent {
                shooter,
                target,
                projectile: None,
            });
            world.spawn_particles(
                ParticleKind::Spark,
                target_position,
                SPARK_PARTICLES,
                Fixed::from_num(2),
                10,
            );
            world.apply_damage(faction, target, weapon.damage)
        }
    }
}

// ============================================================================
// Systems
// ============================================================================

/// Count every weapon cooldown down by one tick, floored at zero.
pub fn cooldown_system(world: &mut World) {
    for id in world.entities.sorted_ids() {
        let Some(entity) = world.entities.get_mut(id) else {
            continue;
        };
        if let Some(unit) = entity.as_unit_mut() {
            unit.cooldown = unit.cooldown.saturating_sub(1);
        } else if let Some(building) = entity.as_building_mut() {
            building.cooldown = building.cooldown.saturating_sub(1);
        }
    }
}

/// Let every ready unit attack.
///
/// Infantry and tanks fire at their assigned target while it stays in
/// range, else at the nearest enemy in range, adopting it as their target
/// when they had none. Harvesters defend against infantry only.
pub fn unit_combat_system(world: &mut World) {
    for id in world.entities.sorted_ids() {
        let Some(entity) = world.entities.get(id) else {
            continue;
        };
        let Some(unit) = entity.as_unit() else {
            continue;
        };
        if unit.cooldown > 0 {
            continue;
        }
        let Some(weapon) = entity.weapon() else {
            continue;
        };
        let faction = entity.faction;
        let position = entity.position;
        let is_harvester = unit.kind == UnitKind::Harvester;

        let target = if is_harvester {
            nearest_enemy(world, faction, position, weapon.range, TargetFilter::Infantry, false)
        } else {
            let assigned = unit
                .target_unit
                .filter(|t| world.entities.contains(*t));
            acquire_target(world, faction, position, assigned, weapon.range, TargetFilter::Any, false)
        };
        let Some(target) = target else {
            continue;
        };

        if let Some(unit) = world.entities.get_mut(id).and_then(|e| e.as_unit_mut()) {
            unit.cooldown = weapon.cooldown;
            if !is_harvester {
                unit.target_unit = Some(target);
            }
        }

        let killed = discharge(world, id, faction, position, target, weapon);
        if killed && !is_harvester {
            if let Some(unit) = world.entities.get_mut(id).and_then(|e| e.as_unit_mut()) {
                unit.target_unit = None;
                unit.move_target = None;
            }
        }
    }
    world.clear_stale_targets();
}

/// Let every ready turret fire at the nearest enemy unit in range.
pub fn turret_system(world: &mut World) {
    for id in world.entities.sorted_ids() {
        let Some(entity) = world.entities.get(id) else {
            continue;
        };
        let Some(building) = entity.as_building() else {
            continue;
        };
        let Some(weapon) = entity.weapon() else {
            continue;
        };
        let faction = entity.faction;
        let position = entity.position;

        let target = acquire_target(
            world,
            faction,
            position,
            building.target_unit,
            weapon.range,
            TargetFilter::Units,
            true,
        );
        let ready = building.cooldown == 0;

        if let Some(building) = world.entities.get_mut(id).and_then(|e| e.as_building_mut()) {
            building.target_unit = target;
            if ready && target.is_some() {
                building.cooldown = weapon.cooldown;
            }
        }
        if let (true, Some(target)) = (ready, target) {
            discharge(world, id, faction, position, target, weapon);
        }
    }
}

/// Fly every projectile one step and resolve impacts.
///
/// A projectile re-aims at its target's current position each tick. It is
/// removed without effect once its target is gone. Otherwise the first
/// living enemy its box overlaps, in id order, takes the damage; reaching
/// the hit radius without overlap damages the target itself. Either way
/// the projectile is removed, so damage lands at most once.
pub fn projectile_system(world: &mut World) {
    let speed = Fixed::from_num(PROJECTILE_SPEED);
    let hit_radius_sq = Fixed::from_num(PROJECTILE_HIT_RADIUS * PROJECTILE_HIT_RADIUS);
    let projectiles = std::mem::take(&mut world.projectiles);
    let mut survivors = Vec::with_capacity(projectiles.len());

    for mut projectile in projectiles {
        let Some(target_position) = world.entities.get(projectile.target).map(|e| e.position) else {
            continue;
        };

        if projectile.position.distance_squared(target_position) <= speed * speed {
            projectile.position = target_position;
        } else {
            projectile.position += projectile.position.step_toward(target_position, speed);
        }

        if projectile.trail_timer == 0 {
            world.spawn_particle(ParticleKind::Trail, projectile.position, Vec2Fixed::ZERO, 15);
            projectile.trail_timer = TRAIL_INTERVAL;
        } else {
            projectile.trail_timer -= 1;
        }

        let bounds = projectile.bounds();
        let struck = world
            .entities
            .iter_sorted()
            .find(|e| e.faction != projectile.faction && e.is_alive() && e.bounds().intersects(&bounds))
            .map(|e| e.id);
        let struck = struck.or_else(|| {
            (projectile.position.distance_squared(target_position) <= hit_radius_sq).then_some(projectile.target)
        });

        match struck {
            Some(victim) => {
                world.spawn_particles(
                    ParticleKind::Explosion,
                    projectile.position,
                    EXPLOSION_PARTICLES,
                    Fixed::from_num(2),
                    20,
                );
                world.apply_damage(projectile.faction, victim, projectile.damage);
            }
            None => survivors.push(projectile),
        }
    }

    world.projectiles = survivors;
    world.clear_stale_targets();
}

/// Move and age cosmetic particles, dropping expired ones.
pub fn particle_system(particles: &mut Vec<Particle>) {
    particles.retain_mut(|particle| {
        particle.position += particle.velocity;
        particle.lifetime = particle.lifetime.saturating_sub(1);
        particle.lifetime > 0
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{BuildingKind, Entity};
    use crate::stats::unit_stats;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn vec2(x: i32, y: i32) -> Vec2Fixed {
        Vec2Fixed::from_ints(x, y)
    }

    fn world() -> World {
        World::new(ChaCha8Rng::seed_from_u64(11))
    }

    #[test]
    fn test_tank_fires_projectile_and_resets_cooldown() {
        let mut world = world();
        let tank = world.spawn(Entity::new_unit(UnitKind::Tank, FactionId::Gdi, vec2(100, 100)));
        let infantry = world.spawn(Entity::new_unit(UnitKind::Infantry, FactionId::Nod, vec2(250, 100)));

        unit_combat_system(&mut world);

        assert_eq!(world.projectiles.len(), 1);
        let projectile = &world.projectiles[0];
        assert_eq!(projectile.target, infantry);
        assert_eq!(projectile.damage, 20);
        let unit = world.entities.get(tank).unwrap().as_unit().unwrap();
        assert_eq!(unit.cooldown, unit_stats(UnitKind::Tank, FactionId::Gdi).weapon.cooldown);
        assert_eq!(unit.target_unit, Some(infantry));
        assert_eq!(
            world.particles.iter().filter(|p| p.kind == ParticleKind::Smoke).count(),
            5
        );
        assert_eq!(world.events.shots.len(), 1);
    }

    #[test]
    fn test_no_attack_while_cooling_down() {
        let mut world = world();
        let tank = world.spawn(Entity::new_unit(UnitKind::Tank, FactionId::Gdi, vec2(100, 100)));
        world.spawn(Entity::new_unit(UnitKind::Infantry, FactionId::Nod, vec2(150, 100)));
        world.entities.get_mut(tank).unwrap().as_unit_mut().unwrap().cooldown = 3;

        unit_combat_system(&mut world);
        assert!(world.projectiles.is_empty());

        for _ in 0..3 {
            cooldown_system(&mut world);
        }
        unit_combat_system(&mut world);
        assert_eq!(world.projectiles.len(), 1);
    }

    #[test]
    fn test_targets_nearest_enemy_in_range() {
        let mut world = world();
        let infantry = world.spawn(Entity::new_unit(UnitKind::Infantry, FactionId::Gdi, vec2(100, 100)));
        let far = world.spawn(Entity::new_unit(UnitKind::Infantry, FactionId::Nod, vec2(145, 100)));
        let near = world.spawn(Entity::new_unit(UnitKind::Infantry, FactionId::Nod, vec2(100, 130)));

        unit_combat_system(&mut world);

        let unit = world.entities.get(infantry).unwrap().as_unit().unwrap();
        assert_eq!(unit.target_unit, Some(near));
        assert_eq!(world.entities.get(near).unwrap().health.current, 52);
        assert_eq!(world.entities.get(far).unwrap().health.current, 60);
    }

    #[test]
    fn test_out_of_range_assignment_switches_to_engaged_enemy() {
        let mut world = world();
        let tank = world.spawn(Entity::new_unit(UnitKind::Tank, FactionId::Gdi, vec2(100, 100)));
        let far = world.spawn(Entity::new_unit(UnitKind::Infantry, FactionId::Nod, vec2(900, 700)));
        let near = world.spawn(Entity::new_unit(UnitKind::Infantry, FactionId::Nod, vec2(200, 100)));
        world.entities.get_mut(tank).unwrap().as_unit_mut().unwrap().target_unit = Some(far);

        unit_combat_system(&mut world);

        assert_eq!(world.projectiles.len(), 1);
        assert_eq!(world.projectiles[0].target, near);
        let unit = world.entities.get(tank).unwrap().as_unit().unwrap();
        assert_eq!(unit.target_unit, Some(near));
    }

    #[test]
    fn test_melee_kill_clears_orders() {
        let mut world = world();
        let infantry = world.spawn(Entity::new_unit(UnitKind::Infantry, FactionId::Gdi, vec2(100, 100)));
        let victim = world.spawn(Entity::new_unit(UnitKind::Infantry, FactionId::Nod, vec2(120, 100)));
        world.entities.get_mut(victim).unwrap().health.current = 5;

        unit_combat_system(&mut world);

        assert!(world.entities.get(victim).is_none());
        assert!(world.events.deaths.contains(&victim));
        assert!(world.entities.get(infantry).unwrap().as_unit().unwrap().is_idle());
    }

    #[test]
    fn test_harvester_defends_only_against_infantry() {
        let mut world = world();
        let harvester = world.spawn(Entity::new_unit(UnitKind::Harvester, FactionId::Gdi, vec2(100, 100)));
        let tank = world.spawn(Entity::new_unit(UnitKind::Tank, FactionId::Nod, vec2(130, 100)));
        unit_combat_system(&mut world);
        assert_eq!(world.entities.get(tank).unwrap().health.current, 120);

        let infantry = world.spawn(Entity::new_unit(UnitKind::Infantry, FactionId::Nod, vec2(100, 140)));
        // Let the enemy tank's own shot not interfere.
        world.entities.get_mut(tank).unwrap().as_unit_mut().unwrap().cooldown = 100;
        unit_combat_system(&mut world);
        assert_eq!(world.entities.get(infantry).unwrap().health.current, 50);
        let unit = world.entities.get(harvester).unwrap().as_unit().unwrap();
        assert_eq!(unit.cooldown, 30);
        assert_eq!(unit.target_unit, None);
    }

    #[test]
    fn test_turret_ignores_buildings_and_fires_at_units() {
        let mut world = world();
        let turret = world.spawn(Entity::new_building(BuildingKind::Turret, FactionId::Gdi, vec2(100, 100)));
        world.spawn(Entity::new_building(BuildingKind::PowerPlant, FactionId::Nod, vec2(200, 100)));
        turret_system(&mut world);
        assert!(world.projectiles.is_empty());

        let tank = world.spawn(Entity::new_unit(UnitKind::Tank, FactionId::Nod, vec2(250, 125)));
        turret_system(&mut world);
        assert_eq!(world.projectiles.len(), 1);
        let building = world.entities.get(turret).unwrap().as_building().unwrap();
        assert_eq!(building.target_unit, Some(tank));
        assert_eq!(building.cooldown, 25);
    }

    #[test]
    fn test_turret_range_is_strict() {
        let mut world = world();
        // Turret centre (125,125); the tank sits exactly 180 away.
        world.spawn(Entity::new_building(BuildingKind::Turret, FactionId::Gdi, vec2(100, 100)));
        world.spawn(Entity::new_unit(UnitKind::Tank, FactionId::Nod, vec2(305, 125)));
        turret_system(&mut world);
        assert!(world.projectiles.is_empty());
    }

    #[test]
    fn test_projectile_hits_once_and_disappears() {
        let mut world = world();
        let tank = world.spawn(Entity::new_unit(UnitKind::Tank, FactionId::Gdi, vec2(100, 100)));
        let target = world.spawn(Entity::new_unit(UnitKind::Tank, FactionId::Nod, vec2(160, 100)));
        world.spawn_projectile(FactionId::Gdi, vec2(100, 100), target, 20);

        let mut ticks = 0;
        while !world.projectiles.is_empty() {
            projectile_system(&mut world);
            ticks += 1;
            assert!(ticks < 20, "projectile never landed");
        }
        assert_eq!(world.entities.get(target).unwrap().health.current, 100);
        for _ in 0..5 {
            projectile_system(&mut world);
        }
        assert_eq!(world.entities.get(target).unwrap().health.current, 100);
        assert_eq!(world.entities.get(tank).unwrap().health.current, 200);
        assert_eq!(
            world.particles.iter().filter(|p| p.kind == ParticleKind::Explosion).count(),
            5
        );
    }

    #[test]
    fn test_projectile_splashes_on_first_overlapping_enemy() {
        let mut world = world();
        let target = world.spawn(Entity::new_unit(UnitKind::Tank, FactionId::Nod, vec2(300, 100)));
        let blocker = world.spawn(Entity::new_unit(UnitKind::Harvester, FactionId::Nod, vec2(110, 100)));
        world.spawn_projectile(FactionId::Gdi, vec2(100, 100), target, 20);

        projectile_system(&mut world);

        assert!(world.projectiles.is_empty());
        assert_eq!(world.entities.get(blocker).unwrap().health.current, 280);
        assert_eq!(world.entities.get(target).unwrap().health.current, 120);
        assert!(world.entities.get(blocker).unwrap().under_attack);
    }

    #[test]
    fn test_projectile_fizzles_when_target_gone() {
        let mut world = world();
        let target = world.spawn(Entity::new_unit(UnitKind::Infantry, FactionId::Nod, vec2(300, 100)));
        let bystander = world.spawn(Entity::new_unit(UnitKind::Infantry, FactionId::Nod, vec2(100, 100)));
        world.spawn_projectile(FactionId::Gdi, vec2(100, 100), target, 20);
        world.destroy(target);

        projectile_system(&mut world);

        assert!(world.projectiles.is_empty());
        assert_eq!(world.entities.get(bystander).unwrap().health.current, 60);
    }

    #[test]
    fn test_projectile_leaves_trail_every_third_tick() {
        let mut world = world();
        let target = world.spawn(Entity::new_unit(UnitKind::Tank, FactionId::Nod, vec2(700, 100)));
        world.spawn_projectile(FactionId::Gdi, vec2(100, 100), target, 20);
        for _ in 0..9 {
            projectile_system(&mut world);
        }
        let trails = world.particles.iter().filter(|p| p.kind == ParticleKind::Trail).count();
        assert_eq!(trails, 3);
    }

    #[test]
    fn test_particles_expire() {
        let mut world = world();
        world.spawn_particle(ParticleKind::Spark, vec2(0, 0), vec2(1, 2), 2);
        particle_system(&mut world.particles);
        assert_eq!(world.particles[0].position, vec2(1, 2));
        particle_system(&mut world.particles);
        assert!(world.particles.is_empty());
    }

    #[test]
    fn test_cooldown_floors_at_zero() {
        let mut world = world();
        let tank = world.spawn(Entity::new_unit(UnitKind::Tank, FactionId::Gdi, vec2(0, 0)));
        cooldown_system(&mut world);
        assert_eq!(world.entities.get(tank).unwrap().as_unit().unwrap().cooldown, 0);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_projectile_damages_at_most_once(
            origin in (0i32..1600, 0i32..800),
            target in (0i32..1600, 0i32..800),
            bystanders in prop::collection::vec((0i32..1600, 0i32..800, any::<bool>()), 0..12),
        ) {
            let mut world = world();
            let victim = world.spawn(Entity::new_unit(UnitKind::Tank, FactionId::Nod, vec2(target.0, target.1)));
            for (x, y, enemy) in bystanders {
                let faction = if enemy { FactionId::Nod } else { FactionId::Gdi };
                world.spawn(Entity::new_unit(UnitKind::Tank, faction, vec2(x, y)));
            }
            world.spawn_projectile(FactionId::Gdi, vec2(origin.0, origin.1), victim, 20);

            for _ in 0..400 {
                if world.projectiles.is_empty() {
                    break;
                }
                projectile_system(&mut world);
            }

            prop_assert!(world.projectiles.is_empty());
            prop_assert_eq!(world.events.damage.len(), 1);
            let hit = &world.events.damage[0];
            prop_assert_eq!(hit.amount, 20);
            prop_assert_eq!(hit.attacker_faction, FactionId::Gdi);
            let struck = world.entities.get(hit.target).unwrap();
            prop_assert_eq!(struck.faction, FactionId::Nod);
        }
    }
}
