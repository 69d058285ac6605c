use std::sync::Arc;
use std::thread;

use glam::{Quat, Vec2, Vec3};
use redlilium_scene::scene::{
    DirtyFrame, Spatial, Transform, Transform2D, TransformSystem, TransformSystem2D, TransformSystem3D,
};
use redlilium_scene::{Entity, World};

fn setup() -> World {
    let mut world = World::new();
    TransformSystem3D::install(&mut world);
    world
}

fn with_system<R>(world: &mut World, f: impl FnOnce(&mut TransformSystem3D, &mut World) -> R) -> R {
    TransformSystem3D::scope(world, f).expect("transform system installed")
}

fn assert_vec3_near(actual: Vec3, expected: Vec3) {
    assert!(
        actual.abs_diff_eq(expected, 1e-4),
        "expected {expected:?}, got {actual:?}"
    );
}

/// Walks every sibling ring below `parents` and checks its links.
fn assert_rings<T: Spatial>(transforms: &TransformSystem<T>, world: &World, parents: &[Entity]) {
    for &parent in parents {
        let Some(node) = transforms.node(world, parent) else {
            continue;
        };
        let parent_key = transforms.node_key(world, parent);
        let Some(first) = node.first_child() else {
            assert_eq!(node.child_count(), 0);
            continue;
        };

        let mut key = first;
        for _ in 0..node.child_count() {
            let child = transforms.get_node(key).expect("live sibling");
            let next = transforms.get_node(child.next_sibling()).expect("live next sibling");
            assert_eq!(next.prev_sibling(), key, "next.prev must point back");
            assert_eq!(child.parent(), parent_key, "sibling must point at its parent");
            key = child.next_sibling();
        }
        assert_eq!(key, first, "ring of {parent:?} must close after child_count steps");
    }
}

// ---------------------------------------------------------------------------
// Dirty notifications
// ---------------------------------------------------------------------------

#[test]
fn repeated_position_write_enqueues_once() {
    let mut world = setup();
    let e = world.spawn(Transform::IDENTITY).id();

    with_system(&mut world, |transforms, world| {
        transforms.set_local_position(world, e, Vec3::new(1.0, 2.0, 3.0));
        transforms.set_local_position(world, e, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(transforms.dirty_queue().len(), 1);
    });
}

#[test]
fn unchanged_scale_produces_no_entries() {
    let mut world = setup();
    let root = world.spawn(Transform::from_scale(Vec3::splat(2.0))).id();
    let child = world.spawn(Transform::from_scale(Vec3::new(1.0, 3.0, 1.0))).id();

    with_system(&mut world, |transforms, world| {
        transforms.parent_entity_to(world, root, child);
        transforms.drain_dirty(world, 1);

        transforms.set_local_scale(world, root, Vec3::splat(2.0));
        transforms.set_local_scale(world, child, Vec3::new(1.0, 3.0, 1.0));

        let mut drained = Vec::new();
        transforms.dirty_queue().try_dequeue_all(|e| drained.push(e));
        assert!(drained.is_empty());
    });
}

#[test]
fn producers_on_other_threads_are_drained_at_finalize() {
    let mut world = setup();
    let entities: Vec<Entity> = (0..64).map(|_| world.spawn(Transform::IDENTITY).id()).collect();
    let queue = Arc::clone(world.resource::<TransformSystem3D>().dirty_queue());

    let handles: Vec<_> = entities
        .chunks(16)
        .map(|chunk| {
            let queue = Arc::clone(&queue);
            let chunk = chunk.to_vec();
            thread::spawn(move || chunk.into_iter().for_each(|e| queue.enqueue(e)))
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let drained = with_system(&mut world, |transforms, world| transforms.drain_dirty(world, 7));
    assert_eq!(drained, 64);
    for e in entities {
        assert_eq!(world.get::<DirtyFrame>(e), Some(&DirtyFrame { frame: 7 }));
    }
}

// ---------------------------------------------------------------------------
// Hierarchy
// ---------------------------------------------------------------------------

#[test]
fn moving_root_refreshes_whole_chain() {
    let mut world = setup();
    let a = world.spawn(Transform::from_xyz(1.0, 0.0, 0.0)).id();
    let b = world
        .spawn(Transform::from_xyz(0.0, 2.0, 0.0).with_rotation(Quat::from_rotation_z(0.5)))
        .id();
    let c = world
        .spawn(Transform::from_xyz(0.0, 0.0, 3.0).with_scale(Vec3::new(2.0, 1.0, 1.0)))
        .id();
    let d = world
        .spawn(Transform::from_xyz(1.0, 1.0, 1.0).with_rotation(Quat::from_rotation_x(1.2)))
        .id();

    with_system(&mut world, |transforms, world| {
        transforms.parent_entity_to(world, a, b);
        transforms.parent_entity_to(world, b, c);
        transforms.parent_entity_to(world, c, d);

        transforms.set_local_transform(
            world,
            a,
            Vec3::new(-4.0, 5.0, 6.0),
            Quat::from_rotation_y(0.8),
            Vec3::splat(1.5),
        );
        assert_eq!(transforms.hierarchy_depth(world, d), 3);
    });

    let local = |e: Entity| world.get::<Transform>(e).unwrap().compute_matrix();
    let expected = local(a) * local(b) * local(c) * local(d);
    let transforms = world.resource::<TransformSystem3D>();
    let actual = transforms.world_matrix(&world, d).unwrap();
    assert!(actual.abs_diff_eq(expected, 1e-4));
    assert_vec3_near(
        transforms.world_position(&world, d).unwrap(),
        expected.transform_point3(Vec3::ZERO),
    );
}

#[test]
fn rings_hold_after_mixed_edits() {
    let mut world = setup();
    let e: Vec<Entity> = (0..10)
        .map(|i| world.spawn(Transform::from_xyz(i as f32, 0.0, 0.0)).id())
        .collect();

    with_system(&mut world, |transforms, world| {
        for &child in &e[1..6] {
            transforms.parent_entity_to(world, e[0], child);
        }
        for &child in &e[6..10] {
            transforms.parent_entity_to(world, e[1], child);
        }
        assert_rings(transforms, world, &e);
        assert_eq!(transforms.child_count(world, e[0]), 5);

        transforms.parent_entity_to(world, e[1], e[3]);
        transforms.clear_parent(world, e[4]);
        transforms.parent_entity_to(world, e[4], e[0]);
        assert_rings(transforms, world, &e);

        assert!(transforms.destroy_node(world, e[1]));
        assert_rings(transforms, world, &e);
        transforms.parent_entity_to(world, e[2], e[7]);
        transforms.parent_entity_to(world, e[2], e[8]);
        assert_rings(transforms, world, &e);

        assert_eq!(transforms.parent(world, e[0]), Some(e[4]));
        assert_eq!(transforms.child_count(world, e[2]), 2);
        assert_eq!(transforms.parent(world, e[6]), None);
    });

    world.despawn(e[2]);
    with_system(&mut world, |transforms, world| {
        transforms.parent_entity_to(world, e[5], e[9]);
        let live: Vec<Entity> = e.iter().copied().filter(|&x| x != e[2]).collect();
        assert_rings(transforms, world, &live);
        assert_eq!(transforms.parent(world, e[7]), None);
        assert_eq!(transforms.parent(world, e[8]), None);
    });
}

#[test]
fn destroying_middle_node_orphans_grandchildren() {
    let mut world = setup();
    let a = world.spawn(Transform::from_xyz(5.0, 0.0, 0.0)).id();
    let b = world.spawn(Transform::from_xyz(0.0, 1.0, 0.0)).id();
    let c = world.spawn(Transform::from_xyz(0.0, 0.0, 1.0)).id();

    with_system(&mut world, |transforms, world| {
        transforms.parent_entity_to(world, a, b);
        transforms.parent_entity_to(world, b, c);
        assert!(transforms.destroy_node(world, b));

        assert_eq!(transforms.parent(world, c), None);
        assert_eq!(transforms.child_count(world, a), 0);
        assert!(transforms.children(world, a).is_empty());
        assert!(transforms.node(world, b).is_none());
        // Orphaned child is now a root: world equals local.
        assert_vec3_near(transforms.world_position(world, c).unwrap(), Vec3::new(0.0, 0.0, 1.0));
    });
}

// ---------------------------------------------------------------------------
// World space
// ---------------------------------------------------------------------------

#[test]
fn world_position_round_trips_three_levels_deep() {
    let mut world = setup();
    let a = world
        .spawn(
            Transform::from_xyz(3.0, -1.0, 2.0)
                .with_rotation(Quat::from_rotation_y(0.7))
                .with_scale(Vec3::new(2.0, 0.5, 1.5)),
        )
        .id();
    let b = world
        .spawn(Transform::from_xyz(0.0, 4.0, 0.0).with_rotation(Quat::from_rotation_x(-0.4)))
        .id();
    let c = world
        .spawn(Transform::from_xyz(1.0, 1.0, 1.0).with_scale(Vec3::splat(3.0)))
        .id();
    let e = world.spawn(Transform::IDENTITY).id();

    with_system(&mut world, |transforms, world| {
        transforms.parent_entity_to(world, a, b);
        transforms.parent_entity_to(world, b, c);
        transforms.parent_entity_to(world, c, e);
        assert_eq!(transforms.hierarchy_depth(world, e), 3);

        for target in [Vec3::ZERO, Vec3::new(10.0, -3.0, 7.5), Vec3::new(-0.25, 100.0, 2.0)] {
            transforms.set_world_position(world, e, target);
            assert_vec3_near(transforms.world_position(world, e).unwrap(), target);
        }
    });
}

#[test]
fn world_rotation_round_trips_under_rotated_parents() {
    let mut world = setup();
    let a = world
        .spawn(Transform::from_rotation(Quat::from_rotation_z(1.1)).with_scale(Vec3::splat(2.0)))
        .id();
    let b = world.spawn(Transform::from_rotation(Quat::from_rotation_x(0.3))).id();

    with_system(&mut world, |transforms, world| {
        transforms.parent_entity_to(world, a, b);
        let target = Quat::from_euler(glam::EulerRot::YXZ, 0.4, -0.2, 0.9);
        transforms.set_world_rotation(world, b, target);
        let actual = transforms.world_rotation(world, b).unwrap();
        assert!(actual.dot(target).abs() > 1.0 - 1e-5, "{actual:?} != {target:?}");
    });
}

#[test]
fn world_position_under_translated_root() {
    let mut world = setup();
    let r = world.spawn(Transform::from_xyz(10.0, 0.0, 0.0)).id();
    let e = world.spawn(Transform::from_xyz(1.0, 0.0, 0.0)).id();

    with_system(&mut world, |transforms, world| {
        transforms.parent_entity_to(world, r, e);
        assert_vec3_near(transforms.world_position(world, e).unwrap(), Vec3::new(11.0, 0.0, 0.0));

        transforms.set_world_position(world, e, Vec3::new(10.0, 5.0, 0.0));
        assert_vec3_near(transforms.local_position(world, e).unwrap(), Vec3::new(0.0, 5.0, 0.0));
        assert_vec3_near(transforms.world_position(world, e).unwrap(), Vec3::new(10.0, 5.0, 0.0));
    });
}

#[test]
fn matrix_write_propagates_to_children() {
    let mut world = setup();
    let body = world.spawn(Transform::IDENTITY).id();
    let marker = world.spawn(Transform::from_xyz(0.0, 1.0, 0.0)).id();

    with_system(&mut world, |transforms, world| {
        transforms.parent_entity_to(world, body, marker);
        let matrix = glam::Mat4::from_rotation_translation(Quat::IDENTITY, Vec3::new(0.0, 5.0, 0.0));
        transforms.set_local_transform_matrix(world, body, matrix);

        assert!(transforms.is_matrix_authoritative(world, body));
        assert_eq!(transforms.local_position(world, body), Some(Vec3::ZERO));
        assert_vec3_near(transforms.world_position(world, marker).unwrap(), Vec3::new(0.0, 6.0, 0.0));

        transforms.add_local_offset(world, body, Vec3::X);
        assert!(!transforms.is_matrix_authoritative(world, body));
        assert_vec3_near(transforms.local_position(world, body).unwrap(), Vec3::new(1.0, 5.0, 0.0));
        assert_vec3_near(transforms.world_position(world, marker).unwrap(), Vec3::new(1.0, 6.0, 0.0));
    });
}

// ---------------------------------------------------------------------------
// 2D hierarchy
// ---------------------------------------------------------------------------

fn setup_2d() -> World {
    let mut world = World::new();
    TransformSystem2D::install(&mut world);
    world
}

#[test]
fn rings_hold_after_mixed_2d_edits() {
    let mut world = setup_2d();
    let e: Vec<Entity> = (0..8)
        .map(|i| {
            world
                .spawn(Transform2D::from_xy(10.0 * i as f32, 0.0).with_size(Vec2::splat(20.0)))
                .id()
        })
        .collect();

    let frame_one = TransformSystem2D::scope(&mut world, |transforms, world| {
        for &child in &e[1..5] {
            transforms.parent_entity_to(world, e[0], child);
        }
        for &child in &e[5..8] {
            transforms.parent_entity_to(world, e[1], child);
        }
        assert_rings(transforms, world, &e);

        transforms.parent_entity_to(world, e[1], e[2]);
        transforms.clear_parent(world, e[3]);
        transforms.parent_entity_to(world, e[3], e[0]);
        assert_rings(transforms, world, &e);
        assert_eq!(transforms.child_count(world, e[1]), 4);
        assert_eq!(transforms.parent(world, e[0]), Some(e[3]));
        assert_eq!(transforms.hierarchy_depth(world, e[6]), 3);

        assert!(transforms.destroy_node(world, e[1]));
        assert_rings(transforms, world, &e);
        for &orphan in &[e[2], e[5], e[6], e[7]] {
            assert_eq!(transforms.parent(world, orphan), None);
        }
        assert_eq!(transforms.children(world, e[0]), vec![e[4]]);

        transforms.drain_dirty(world, 1)
    })
    .unwrap();

    assert!(frame_one > 0);
    for &entity in &e {
        assert_eq!(world.get::<DirtyFrame>(entity), Some(&DirtyFrame { frame: 1 }));
    }
}

#[test]
fn world_position_2d_round_trips_three_levels_deep() {
    let mut world = setup_2d();
    let a = world
        .spawn(
            Transform2D::from_xy(40.0, -10.0)
                .with_angle(0.6)
                .with_scale(Vec2::new(2.0, 0.5))
                .with_size(Vec2::new(200.0, 100.0)),
        )
        .id();
    let b = world
        .spawn(
            Transform2D::from_xy(5.0, 15.0)
                .with_angle(-1.1)
                .with_size(Vec2::new(60.0, 30.0))
                .with_anchor(Vec2::new(0.5, 1.0))
                .with_relative_point(Vec2::splat(0.5)),
        )
        .id();
    let c = world
        .spawn(
            Transform2D::from_xy(-3.0, 2.0)
                .with_scale(Vec2::splat(1.5))
                .with_size(Vec2::new(10.0, 10.0))
                .with_anchor(Vec2::ONE),
        )
        .id();
    let e = world
        .spawn(
            Transform2D::IDENTITY
                .with_angle(0.3)
                .with_size(Vec2::new(8.0, 4.0))
                .with_relative_point(Vec2::new(0.25, 0.75)),
        )
        .id();

    TransformSystem2D::scope(&mut world, |transforms, world| {
        transforms.parent_entity_to(world, a, b);
        transforms.parent_entity_to(world, b, c);
        transforms.parent_entity_to(world, c, e);
        assert_eq!(transforms.hierarchy_depth(world, e), 3);

        for target in [Vec2::ZERO, Vec2::new(120.0, -35.5), Vec2::new(-7.25, 300.0)] {
            transforms.set_world_position(world, e, target);
            let actual = transforms.world_position(world, e).unwrap();
            assert!(
                actual.abs_diff_eq(target, 1e-3),
                "expected {target:?}, got {actual:?}"
            );
        }
    });
}
