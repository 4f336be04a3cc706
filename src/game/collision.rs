//! Collision Detection
//!
//! The simulation consumes contacts and shape queries through
//! [`CollisionResolver`]; any broadphase can sit behind it as long as it
//! reports results in a stable order. [`CircleResolver`] is the built-in
//! brute-force implementation over circle colliders.

use crate::core::fixed::{Fixed, fixed_mul};
use crate::core::vec2::FixedVec2;
use crate::game::state::{EntityId, SimWorld};

/// Check if two circles overlap.
#[inline]
pub fn circles_overlap(
    pos_a: FixedVec2,
    radius_a: Fixed,
    pos_b: FixedVec2,
    radius_b: Fixed,
) -> bool {
    let combined_radius = radius_a + radius_b;
    let combined_radius_sq = fixed_mul(combined_radius, combined_radius);
    pos_a.distance_squared(pos_b) <= combined_radius_sq
}

/// Two colliders touching this tick. Either side may be the damage dealer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContactEvent {
    /// First entity (lower id)
    pub entity_a: EntityId,
    /// Second entity
    pub entity_b: EntityId,
}

/// Result of a shape query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShapeHit {
    /// Entity hit
    pub entity: EntityId,
    /// Squared distance from the query centre to the entity position
    pub distance_squared: Fixed,
}

/// Contact and shape queries over the current world.
pub trait CollisionResolver {
    /// Trigger contacts for this tick, in a stable order.
    fn contacts(&self, world: &SimWorld) -> Vec<ContactEvent>;

    /// Entities whose collider overlaps the circle, in a stable order.
    fn overlap_circle(&self, world: &SimWorld, center: FixedVec2, radius: Fixed) -> Vec<ShapeHit>;

    /// Nearest entity overlapping the circle that `accept` allows.
    ///
    /// Equal distances resolve to the lower entity id.
    fn nearest(
        &self,
        world: &SimWorld,
        center: FixedVec2,
        radius: Fixed,
        accept: &dyn Fn(EntityId) -> bool,
    ) -> Option<ShapeHit> {
        self.overlap_circle(world, center, radius)
            .into_iter()
            .filter(|hit| accept(hit.entity))
            .min_by_key(|hit| (hit.distance_squared, hit.entity))
    }
}

/// Brute-force circle collider resolver.
#[derive(Clone, Copy, Debug, Default)]
pub struct CircleResolver;

impl CollisionResolver for CircleResolver {
    fn contacts(&self, world: &SimWorld) -> Vec<ContactEvent> {
        // BTreeMap keys are already sorted
        let colliders: Vec<(EntityId, FixedVec2, Fixed)> = world
            .colliders
            .iter()
            .filter(|(id, _)| world.is_active(**id))
            .filter_map(|(id, radius)| world.positions.get(id).map(|pos| (*id, *pos, *radius)))
            .collect();

        let mut contacts = Vec::new();

        // Check all pairs (i, j) where i < j
        for i in 0..colliders.len() {
            for j in (i + 1)..colliders.len() {
                let (id_a, pos_a, radius_a) = colliders[i];
                let (id_b, pos_b, radius_b) = colliders[j];

                // Only pairs with a damage dealer matter to the simulation
                let has_trigger = world.damage_on_trigger.contains_key(&id_a)
                    || world.damage_on_trigger.contains_key(&id_b);
                if has_trigger && circles_overlap(pos_a, radius_a, pos_b, radius_b) {
                    contacts.push(ContactEvent { entity_a: id_a, entity_b: id_b });
                }
            }
        }

        contacts
    }

    fn overlap_circle(&self, world: &SimWorld, center: FixedVec2, radius: Fixed) -> Vec<ShapeHit> {
        world
            .colliders
            .iter()
            .filter(|(id, _)| world.is_active(**id))
            .filter_map(|(id, collider_radius)| {
                let position = *world.positions.get(id)?;
                circles_overlap(center, radius, position, *collider_radius).then(|| ShapeHit {
                    entity: *id,
                    distance_squared: center.distance_squared(position),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::core::fixed::to_fixed;
    use crate::game::state::{EntityBundle, EntityKind, TeamType};

    fn body(world: &mut SimWorld, x: i32, team: TeamType) -> EntityId {
        world.spawn(
            EntityBundle::new(EntityKind::Champion, team, FixedVec2::from_ints(x, 0))
                .with_collider(to_fixed(0.5))
                .with_hit_points(100),
        )
    }

    #[test]
    fn test_circles_overlap() {
        let pos_a = FixedVec2::new(0, 0);
        let pos_b = FixedVec2::new(to_fixed(1.0), 0);
        let radius = to_fixed(0.6);

        // Should overlap (distance 1.0, combined radius 1.2)
        assert!(circles_overlap(pos_a, radius, pos_b, radius));

        // Should not overlap
        let pos_c = FixedVec2::new(to_fixed(2.0), 0);
        assert!(!circles_overlap(pos_a, radius, pos_c, radius));
    }

    #[test]
    fn test_contacts_require_a_trigger() {
        let mut world = SimWorld::new(&SimConfig::default());
        let a = body(&mut world, 0, TeamType::Blue);
        let _b = body(&mut world, 0, TeamType::Red);
        assert!(CircleResolver.contacts(&world).is_empty());

        let aoe = world.spawn(
            EntityBundle::new(EntityKind::AoeAbility, TeamType::Red, FixedVec2::ZERO)
                .with_collider(to_fixed(1.0))
                .with_damage_on_trigger(10),
        );
        let contacts = CircleResolver.contacts(&world);
        assert_eq!(contacts.len(), 2);
        assert_eq!(contacts[0], ContactEvent { entity_a: a, entity_b: aoe });
    }

    #[test]
    fn test_tagged_entities_skipped() {
        let mut world = SimWorld::new(&SimConfig::default());
        let a = body(&mut world, 0, TeamType::Blue);
        world.spawn(
            EntityBundle::new(EntityKind::AoeAbility, TeamType::Red, FixedVec2::ZERO)
                .with_collider(to_fixed(1.0))
                .with_damage_on_trigger(10),
        );
        world.destroy_tags.insert(a);
        assert!(CircleResolver.contacts(&world).is_empty());
    }

    #[test]
    fn test_nearest_prefers_distance_then_id() {
        let mut world = SimWorld::new(&SimConfig::default());
        let far = body(&mut world, 5, TeamType::Red);
        let near = body(&mut world, 2, TeamType::Red);
        let twin = body(&mut world, -2, TeamType::Red);
        let friend = body(&mut world, 1, TeamType::Blue);

        let enemy = |id: EntityId| world.team_of(id) == TeamType::Red;
        let hit = CircleResolver
            .nearest(&world, FixedVec2::ZERO, to_fixed(10.0), &enemy)
            .unwrap();
        assert_eq!(hit.entity, near);
        assert!(near < twin);

        let all = CircleResolver.overlap_circle(&world, FixedVec2::ZERO, to_fixed(10.0));
        let ids: Vec<_> = all.iter().map(|hit| hit.entity).collect();
        assert_eq!(ids, vec![far, near, twin, friend]);

        assert!(CircleResolver.nearest(&world, FixedVec2::ZERO, to_fixed(0.1), &enemy).is_none());
    }
}
