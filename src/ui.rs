//! Canvas-space bounds of 2D entities and pointer hit testing.

use std::cmp::Reverse;

use bevy_ecs::component::Component;
use bevy_ecs::entity::Entity;
use bevy_ecs::world::World;
use glam::Vec2;

use crate::scene::{Rect, Transform2D, TransformSystem2D};

/// World-space rectangle of a 2D entity, refreshed by the bounds stage
/// whenever the entity is dirtied.
#[derive(Component, Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingRect(pub Rect);

/// Marks 2D entities that take part in pointer hit testing.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Interactable;

/// Topmost interactable entity under `point`.
///
/// Higher layers win; within a layer deeper entities (children drawn over
/// their parents) win. Remaining ties resolve to the lowest entity index.
pub fn hit_test(world: &mut World, point: Vec2) -> Option<Entity> {
    let candidates: Vec<(Entity, u32)> = world
        .query::<(Entity, &BoundingRect, &Transform2D, &Interactable)>()
        .iter(world)
        .filter(|(_, rect, _, _)| rect.0.contains(point))
        .map(|(entity, _, transform, _)| (entity, transform.layer()))
        .collect();

    let system = world.get_resource::<TransformSystem2D>();
    candidates
        .into_iter()
        .map(|(entity, layer)| {
            let depth = system.map_or(0, |s| s.hierarchy_depth(world, entity));
            (entity, layer, depth)
        })
        .max_by_key(|&(entity, layer, depth)| (layer, depth, Reverse(entity.index())))
        .map(|(entity, _, _)| entity)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn(world: &mut World, min: Vec2, max: Vec2, layer: u32) -> Entity {
        world
            .spawn((
                Transform2D::IDENTITY.with_layer(layer),
                BoundingRect(Rect::new(min, max)),
                Interactable,
            ))
            .id()
    }

    #[test]
    fn higher_layer_wins() {
        let mut world = World::new();
        TransformSystem2D::install(&mut world);
        let _low = spawn(&mut world, Vec2::ZERO, Vec2::splat(100.0), 0);
        let high = spawn(&mut world, Vec2::ZERO, Vec2::splat(10.0), 2);

        assert_eq!(hit_test(&mut world, Vec2::splat(5.0)), Some(high));
        assert_ne!(hit_test(&mut world, Vec2::splat(50.0)), Some(high));
        assert_eq!(hit_test(&mut world, Vec2::splat(500.0)), None);
    }

    #[test]
    fn deeper_entity_wins_within_layer() {
        let mut world = World::new();
        TransformSystem2D::install(&mut world);
        let panel = spawn(&mut world, Vec2::ZERO, Vec2::splat(100.0), 1);
        let button = spawn(&mut world, Vec2::ZERO, Vec2::splat(20.0), 1);
        TransformSystem2D::scope(&mut world, |ts, world| ts.parent_entity_to(world, panel, button));

        assert_eq!(hit_test(&mut world, Vec2::splat(10.0)), Some(button));
        assert_eq!(hit_test(&mut world, Vec2::splat(50.0)), Some(panel));
    }

    #[test]
    fn non_interactable_is_ignored() {
        let mut world = World::new();
        world.spawn((Transform2D::IDENTITY, BoundingRect(Rect::new(Vec2::ZERO, Vec2::ONE))));
        assert_eq!(hit_test(&mut world, Vec2::splat(0.5)), None);
    }
}
