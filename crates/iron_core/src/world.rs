//! Entity rosters shared by every per-tick system.
//!
//! The [`World`] owns all simulated objects. Systems receive it by mutable
//! reference for the duration of one call and address entities by stable
//! [`EntityId`] handles, never by long-lived references.

use std::collections::HashMap;

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::components::{
    BuildingKind, Entity, EntityId, EntityKind, Particle, ParticleKind, Projectile, ResourceNode,
    UnitKind,
};
use crate::factions::FactionId;
use crate::math::{Fixed, Vec2Fixed};
use crate::simulation::TickEvents;

/// Storage for units and buildings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityStorage {
    /// Map of entity ID to entity data.
    entities: HashMap<EntityId, Entity>,
}

impl EntityStorage {
    /// Create empty entity storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entity under its own id.
    pub fn insert(&mut self, entity: Entity) {
        self.entities.insert(entity.id, entity);
    }

    /// Remove an entity by ID.
    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        self.entities.remove(&id)
    }

    /// Get an entity by ID.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Get a mutable reference to an entity by ID.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Check if an entity exists.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Get the number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Check if storage is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Get sorted entity IDs for deterministic iteration.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self.entities.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Iterate entities in id order.
    pub fn iter_sorted(&self) -> impl Iterator<Item = &Entity> {
        self.sorted_ids()
            .into_iter()
            .filter_map(move |id| self.entities.get(&id))
    }

    /// Iterate entities in arbitrary order.
    ///
    /// Only for order-independent queries such as counting.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }
}

/// Every roster of the running match plus the world RNG.
#[derive(Debug, Clone)]
pub struct World {
    /// Units and buildings.
    pub entities: EntityStorage,
    /// Shells in flight.
    pub projectiles: Vec<Projectile>,
    /// Iron fields.
    pub resource_nodes: Vec<ResourceNode>,
    /// Cosmetic particles.
    pub particles: Vec<Particle>,
    /// Events accumulated during the current tick.
    pub events: TickEvents,
    /// Randomness for setup and cosmetic effects.
    pub rng: ChaCha8Rng,
    next_id: EntityId,
}

impl World {
    /// Create an empty world.
    #[must_use]
    pub fn new(rng: ChaCha8Rng) -> Self {
        Self {
            entities: EntityStorage::new(),
            projectiles: Vec::new(),
            resource_nodes: Vec::new(),
            particles: Vec::new(),
            events: TickEvents::default(),
            rng,
            next_id: 1,
        }
    }

    fn allocate_id(&mut self) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Insert a unit or building and return its new id.
    pub fn spawn(&mut self, mut entity: Entity) -> EntityId {
        let id = self.allocate_id();
        entity.id = id;
        self.entities.insert(entity);
        id
    }

    /// Insert an iron field and return its new id.
    pub fn spawn_resource_node(&mut self, mut node: ResourceNode) -> EntityId {
        let id = self.allocate_id();
        node.id = id;
        self.resource_nodes.push(node);
        id
    }

    /// Fire a projectile from `origin` at `target`.
    pub fn spawn_projectile(
        &mut self,
        faction: FactionId,
        origin: Vec2Fixed,
        target: EntityId,
        damage: u32,
    ) -> EntityId {
        let id = self.allocate_id();
        self.projectiles.push(Projectile {
            id,
            faction,
            position: origin,
            target,
            damage,
            trail_timer: 2,
        });
        id
    }

    /// Emit `count` particles at `position` with random velocities in
    /// `[-spread, spread]` on each axis.
    pub fn spawn_particles(
        &mut self,
        kind: ParticleKind,
        position: Vec2Fixed,
        count: u32,
        spread: Fixed,
        lifetime: u32,
    ) {
        for _ in 0..count {
            let velocity = Vec2Fixed::new(self.random_fixed(spread), self.random_fixed(spread));
            self.spawn_particle(kind, position, velocity, lifetime);
        }
    }

    /// Emit a single particle.
    pub fn spawn_particle(
        &mut self,
        kind: ParticleKind,
        position: Vec2Fixed,
        velocity: Vec2Fixed,
        lifetime: u32,
    ) {
        let id = self.allocate_id();
        self.particles.push(Particle {
            id,
            kind,
            position,
            velocity,
            lifetime,
            initial_lifetime: lifetime,
        });
    }

    /// Uniform value in `[-spread, spread]`.
    fn random_fixed(&mut self, spread: Fixed) -> Fixed {
        let bits = spread.to_bits().abs();
        Fixed::from_bits(self.rng.gen_range(-bits..=bits))
    }

    /// Apply damage to an entity, removing it at once if it dies.
    ///
    /// Returns `true` if the hit was fatal. Hits on missing entities are
    /// ignored and return `false`.
    pub fn apply_damage(&mut self, attacker_faction: FactionId, target: EntityId, amount: u32) -> bool {
        let Some(entity) = self.entities.get_mut(target) else {
            return false;
        };
        entity.health.apply_damage(amount);
        entity.under_attack = true;
        let victim_faction = entity.faction;
        let killed = entity.health.is_dead();
        self.events.damage.push(DamageEvent {
            target,
            attacker_faction,
            amount,
            killed,
        });
        if killed {
            self.destroy(target);
            tracing::trace!(entity = target, faction = ?victim_faction, "Entity destroyed");
        }
        killed
    }

    /// Remove a unit or building, emitting debris for buildings.
    pub fn destroy(&mut self, id: EntityId) -> Option<Entity> {
        let entity = self.entities.remove(id)?;
        if entity.is_building() {
            self.spawn_particles(
                ParticleKind::Debris,
                entity.position,
                15,
                Fixed::from_num(3),
                30,
            );
        }
        self.events.deaths.push(id);
        Some(entity)
    }

    /// Lowest-id living headquarters of `faction`.
    #[must_use]
    pub fn primary_hq(&self, faction: FactionId) -> Option<EntityId> {
        self.entities
            .iter()
            .filter(|e| e.faction == faction && e.building_kind() == Some(BuildingKind::Headquarters))
            .map(|e| e.id)
            .min()
    }

    /// Number of living buildings of `kind` owned by `faction`.
    #[must_use]
    pub fn count_buildings(&self, faction: FactionId, kind: BuildingKind) -> usize {
        self.entities
            .iter()
            .filter(|e| e.faction == faction && e.building_kind() == Some(kind))
            .count()
    }

    /// Number of living units of `kind` owned by `faction`.
    #[must_use]
    pub fn count_units(&self, faction: FactionId, kind: UnitKind) -> usize {
        self.entities
            .iter()
            .filter(|e| e.faction == faction && e.unit_kind() == Some(kind))
            .count()
    }

    /// Ids of `faction`'s entities in id order.
    #[must_use]
    pub fn faction_ids(&self, faction: FactionId) -> Vec<EntityId> {
        let mut ids: Vec<_> = self
            .entities
            .iter()
            .filter(|e| e.faction == faction)
            .map(|e| e.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Drop unit and turret references to entities that no longer exist.
    pub fn clear_stale_targets(&mut self) {
        let stale: Vec<(EntityId, bool)> = self
            .entities
            .iter()
            .filter_map(|e| {
                let target = match &e.kind {
                    EntityKind::Unit(u) => u.target_unit,
                    EntityKind::Building(b) => b.target_unit,
                }?;
                (!self.entities.contains(target)).then_some((e.id, e.is_unit()))
            })
            .collect();
        for (id, is_unit) in stale {
            if let Some(entity) = self.entities.get_mut(id) {
                if is_unit {
                    if let Some(unit) = entity.as_unit_mut() {
                        unit.target_unit = None;
                    }
                } else if let Some(building) = entity.as_building_mut() {
                    building.target_unit = None;
                }
            }
        }
    }
}

/// One application of damage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageEvent {
    /// Entity hit.
    pub target: EntityId,
    /// Faction dealing the damage.
    pub attacker_faction: FactionId,
    /// Damage dealt.
    pub amount: u32,
    /// Whether the hit was fatal.
    pub killed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn world() -> World {
        World::new(ChaCha8Rng::seed_from_u64(1))
    }

    #[test]
    fn test_ids_are_unique_across_rosters() {
        let mut world = world();
        let unit = world.spawn(Entity::new_unit(UnitKind::Infantry, FactionId::Gdi, Vec2Fixed::ZERO));
        let node = world.spawn_resource_node(ResourceNode::new(Vec2Fixed::ZERO));
        let shell = world.spawn_projectile(FactionId::Gdi, Vec2Fixed::ZERO, unit, 5);
        assert_eq!(unit, 1);
        assert_eq!(node, 2);
        assert_eq!(shell, 3);
    }

    #[test]
    fn test_fatal_damage_removes_entity_same_call() {
        let mut world = world();
        let id = world.spawn(Entity::new_unit(UnitKind::Infantry, FactionId::Nod, Vec2Fixed::ZERO));
        assert!(!world.apply_damage(FactionId::Gdi, id, 30));
        assert!(world.entities.get(id).is_some_and(|e| e.under_attack));
        assert!(world.apply_damage(FactionId::Gdi, id, 30));
        assert!(world.entities.get(id).is_none());
        assert_eq!(world.events.deaths, vec![id]);
        assert_eq!(world.events.damage.len(), 2);
    }

    #[test]
    fn test_building_death_emits_debris() {
        let mut world = world();
        let id = world.spawn(Entity::new_building(
            BuildingKind::PowerPlant,
            FactionId::Gdi,
            Vec2Fixed::ZERO,
        ));
        world.apply_damage(FactionId::Nod, id, 10_000);
        assert_eq!(world.particles.len(), 15);
        assert!(world.particles.iter().all(|p| p.kind == ParticleKind::Debris));
    }

    #[test]
    fn test_primary_hq_is_lowest_id() {
        let mut world = world();
        world.spawn(Entity::new_unit(UnitKind::Tank, FactionId::Gdi, Vec2Fixed::ZERO));
        let first = world.spawn(Entity::new_building(
            BuildingKind::Headquarters,
            FactionId::Gdi,
            Vec2Fixed::ZERO,
        ));
        world.spawn(Entity::new_building(
            BuildingKind::Headquarters,
            FactionId::Gdi,
            Vec2Fixed::from_ints(400, 0),
        ));
        assert_eq!(world.primary_hq(FactionId::Gdi), Some(first));
        assert_eq!(world.primary_hq(FactionId::Nod), None);
    }

    #[test]
    fn test_clear_stale_targets() {
        let mut world = world();
        let hunter = world.spawn(Entity::new_unit(UnitKind::Tank, FactionId::Gdi, Vec2Fixed::ZERO));
        let prey = world.spawn(Entity::new_unit(UnitKind::Infantry, FactionId::Nod, Vec2Fixed::ZERO));
        world
            .entities
            .get_mut(hunter)
            .and_then(Entity::as_unit_mut)
            .unwrap()
            .target_unit = Some(prey);
        world.destroy(prey);
        world.clear_stale_targets();
        let unit = world.entities.get(hunter).and_then(Entity::as_unit).unwrap();
        assert_eq!(unit.target_unit, None);
    }

    #[test]
    fn test_particle_velocity_within_spread() {
        let mut world = world();
        let spread = Fixed::from_num(2);
        world.spawn_particles(ParticleKind::Explosion, Vec2Fixed::ZERO, 50, spread, 15);
        assert!(world
            .particles
            .iter()
            .all(|p| p.velocity.x.abs() <= spread && p.velocity.y.abs() <= spread));
    }
}
