//! Transform hierarchy, dirty propagation and world/local conversion.
//!
//! One [`TransformSystem`] resource exists per transform flavour
//! ([`Transform`] and [`Transform2D`]). It owns the scene-node arena and the
//! dirty queue, and is the only writer of transform components.
//!
//! # Usage
//!
//! ```
//! use bevy_ecs::world::World;
//! use glam::Vec3;
//! use redlilium_scene::scene::{Transform, TransformSystem3D};
//!
//! let mut world = World::new();
//! TransformSystem3D::install(&mut world);
//!
//! let root = world.spawn(Transform::from_xyz(10.0, 0.0, 0.0)).id();
//! let child = world.spawn(Transform::from_xyz(1.0, 0.0, 0.0)).id();
//!
//! TransformSystem3D::scope(&mut world, |transforms, world| {
//!     transforms.parent_entity_to(world, root, child);
//!     transforms.set_world_position(world, child, Vec3::new(10.0, 5.0, 0.0));
//!     assert_eq!(transforms.local_position(world, child), Some(Vec3::new(0.0, 5.0, 0.0)));
//! });
//! ```

use std::marker::PhantomData;
use std::sync::Arc;

use bevy_ecs::change_detection::{DetectChangesMut, Mut};
use bevy_ecs::component::ComponentId;
use bevy_ecs::entity::Entity;
use bevy_ecs::prelude::Resource;
use bevy_ecs::world::{DeferredWorld, World};
use glam::{Mat4, Quat, Vec2, Vec3};

use super::node::{self, NodeArena, NodeKey, SceneNode};
use super::{DirtyFrame, DirtyQueue, Rect, Spatial, Transform, Transform2D};
use crate::error::HierarchyError;

pub type TransformSystem3D = TransformSystem<Transform>;
pub type TransformSystem2D = TransformSystem<Transform2D>;

/// Scene-graph and dirty tracking for transform component `T`.
#[derive(Resource)]
pub struct TransformSystem<T: Spatial> {
    nodes: NodeArena,
    dirty: Arc<DirtyQueue>,
    _marker: PhantomData<fn() -> T>,
}

/// Nodes whose owning component was replaced or removed.
///
/// Kept outside [`TransformSystem`] so the removal hook still has somewhere to
/// write while the system is taken out of the world by [`TransformSystem::scope`].
#[derive(Resource)]
struct NodeRemovals<T: Spatial> {
    pending: Vec<(Entity, NodeKey)>,
    _marker: PhantomData<fn() -> T>,
}

fn queue_node_removal<T: Spatial>(mut world: DeferredWorld, entity: Entity, _: ComponentId) {
    let Some(node) = world.get::<T>(entity).and_then(|t| t.node()) else {
        return;
    };
    if let Some(mut removals) = world.get_resource_mut::<NodeRemovals<T>>() {
        removals.pending.push((entity, node));
    }
}

impl<T: Spatial> TransformSystem<T> {
    /// Inserts the system into `world` and registers the replace hook for `T`.
    ///
    /// The hook fires on removal and despawn, and when an insert overwrites
    /// the component; the old node is then queued for removal. Does nothing
    /// if the system is already installed.
    /// Must run before the first entity with a `T` is spawned.
    pub fn install(world: &mut World) {
        if world.contains_resource::<Self>() {
            return;
        }
        world
            .register_component_hooks::<T>()
            .on_replace(queue_node_removal::<T>);
        world.insert_resource(NodeRemovals::<T> {
            pending: Vec::new(),
            _marker: PhantomData,
        });
        world.insert_resource(Self {
            nodes: NodeArena::with_key(),
            dirty: Arc::new(DirtyQueue::new()),
            _marker: PhantomData,
        });
        log::debug!("Installed {}", std::any::type_name::<Self>());
    }

    /// Runs `f` with the system and the world borrowed side by side.
    ///
    /// Returns `None` when the system is not installed.
    pub fn scope<R>(world: &mut World, f: impl FnOnce(&mut Self, &mut World) -> R) -> Option<R> {
        if !world.contains_resource::<Self>() {
            return None;
        }
        Some(world.resource_scope(|world, mut system: Mut<Self>| f(&mut *system, world)))
    }

    /// Shared handle to the dirty queue, for producers on other threads.
    pub fn dirty_queue(&self) -> &Arc<DirtyQueue> {
        &self.dirty
    }

    // ---- Hierarchy ----

    /// Makes `child` a child of `parent`, logging and skipping on failure.
    pub fn parent_entity_to(&mut self, world: &mut World, parent: Entity, child: Entity) {
        if let Err(err) = self.try_parent_entity_to(world, parent, child) {
            log::error!("parent_entity_to failed: {err}");
            debug_assert!(false, "parent_entity_to failed: {err}");
        }
    }

    /// Makes `child` a child of `parent`.
    ///
    /// Scene nodes are created for either entity if missing. The child is
    /// spliced into the parent's sibling ring after its first child, so
    /// sibling order is not insertion order. The child's subtree is refreshed
    /// and marked dirty. Re-parenting to the current parent does nothing.
    pub fn try_parent_entity_to(
        &mut self,
        world: &mut World,
        parent: Entity,
        child: Entity,
    ) -> Result<(), HierarchyError> {
        self.flush_removals(world);

        for entity in [parent, child] {
            if world.get::<T>(entity).is_none() {
                return Err(HierarchyError::MissingTransform(entity));
            }
        }
        if parent == child {
            return Err(HierarchyError::SelfParent(child));
        }

        if let (Some(parent_node), Some(child_node)) =
            (self.node_of(world, parent), self.node_of(world, child))
        {
            if self.nodes[child_node].parent == Some(parent_node) {
                return Ok(());
            }
            if node::is_ancestor(&self.nodes, child_node, parent_node) {
                return Err(HierarchyError::Cycle { parent, child });
            }
        }

        let parent_node = self.ensure_node(world, parent);
        let child_node = self.ensure_node(world, child);
        node::detach(&mut self.nodes, child_node);
        node::attach(&mut self.nodes, parent_node, child_node);

        log::trace!("Parented {child} to {parent}");
        self.refresh_transform(world, child);
        Ok(())
    }

    /// Detaches `entity` from its parent, logging and skipping on failure.
    pub fn clear_parent(&mut self, world: &mut World, entity: Entity) {
        if let Err(err) = self.try_clear_parent(world, entity) {
            log::error!("clear_parent failed: {err}");
            debug_assert!(false, "clear_parent failed: {err}");
        }
    }

    /// Detaches `entity` from its parent. The entity keeps its scene node and
    /// children; its world matrix becomes its local matrix.
    pub fn try_clear_parent(&mut self, world: &mut World, entity: Entity) -> Result<(), HierarchyError> {
        self.flush_removals(world);

        if world.get::<T>(entity).is_none() {
            return Err(HierarchyError::MissingTransform(entity));
        }
        let node = self
            .node_of(world, entity)
            .ok_or(HierarchyError::MissingSceneNode(entity))?;

        node::detach(&mut self.nodes, node);
        self.refresh_transform(world, entity);
        Ok(())
    }

    /// Destroys the scene node of `entity`.
    ///
    /// The node is detached from its parent and its children are orphaned:
    /// they become roots and are not re-attached to the grandparent. Returns
    /// `false` if the entity had no node.
    pub fn destroy_node(&mut self, world: &mut World, entity: Entity) -> bool {
        self.flush_removals(world);

        let Some(node) = self.node_of(world, entity) else {
            return false;
        };
        let orphans = self.remove_node(node);
        if let Some(mut component) = world.get_mut::<T>(entity) {
            component.bypass_change_detection().set_node(None);
        }

        self.dirty.enqueue(entity);
        for orphan in orphans {
            self.refresh_subtree(world, orphan);
        }
        true
    }

    /// Frees nodes whose component was replaced or removed.
    ///
    /// Children of a freed node become roots.
    ///
    /// Called by every hierarchy operation and by the finalize stage. Returns
    /// the number of nodes freed.
    pub fn flush_removals(&mut self, world: &mut World) -> usize {
        let pending = match world.get_resource_mut::<NodeRemovals<T>>() {
            Some(mut removals) if !removals.pending.is_empty() => std::mem::take(&mut removals.pending),
            _ => return 0,
        };

        let mut freed = 0;
        for (entity, key) in pending {
            if self.nodes.get(key).map(|n| n.entity) != Some(entity) {
                continue;
            }
            for orphan in self.remove_node(key) {
                self.refresh_subtree(world, orphan);
            }
            freed += 1;
        }
        if freed > 0 {
            log::trace!("Freed {freed} scene nodes");
        }
        freed
    }

    /// Parent of `entity`, if it has one.
    pub fn parent(&self, world: &World, entity: Entity) -> Option<Entity> {
        let node = self.node_of(world, entity)?;
        self.nodes[node].parent.map(|p| self.nodes[p].entity)
    }

    /// Children of `entity`, in sibling-ring order.
    pub fn children(&self, world: &World, entity: Entity) -> Vec<Entity> {
        match self.node_of(world, entity) {
            Some(node) => node::children(&self.nodes, node)
                .map(|child| self.nodes[child].entity)
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn child_count(&self, world: &World, entity: Entity) -> u32 {
        self.node_of(world, entity)
            .map(|node| self.nodes[node].child_count)
            .unwrap_or(0)
    }

    /// Number of ancestors above `entity`. Entities without a node are roots.
    pub fn hierarchy_depth(&self, world: &World, entity: Entity) -> u32 {
        self.node_of(world, entity)
            .map(|node| node::depth(&self.nodes, node))
            .unwrap_or(0)
    }

    /// Scene node of `entity`, if it has one.
    pub fn node(&self, world: &World, entity: Entity) -> Option<&SceneNode> {
        self.node_of(world, entity).map(|node| &self.nodes[node])
    }

    pub fn node_key(&self, world: &World, entity: Entity) -> Option<NodeKey> {
        self.node_of(world, entity)
    }

    /// Looks up a node by key. `None` once the node has been freed.
    pub fn get_node(&self, key: NodeKey) -> Option<&SceneNode> {
        self.nodes.get(key)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    // ---- Local mutators ----

    pub fn set_local_position(&mut self, world: &mut World, entity: Entity, position: T::Vector) {
        self.mutate(world, entity, |t| {
            if t.position() == position {
                return false;
            }
            t.set_position(position);
            true
        });
    }

    pub fn set_local_rotation(&mut self, world: &mut World, entity: Entity, rotation: Quat) {
        self.mutate(world, entity, |t| {
            if t.rotation() == rotation {
                return false;
            }
            t.set_rotation(rotation);
            true
        });
    }

    pub fn set_local_scale(&mut self, world: &mut World, entity: Entity, scale: T::Vector) {
        self.mutate(world, entity, |t| {
            if t.scale() == scale {
                return false;
            }
            t.set_scale(scale);
            true
        });
    }

    pub fn set_local_position_and_rotation(
        &mut self,
        world: &mut World,
        entity: Entity,
        position: T::Vector,
        rotation: Quat,
    ) {
        self.mutate(world, entity, |t| {
            if t.position() == position && t.rotation() == rotation {
                return false;
            }
            t.set_position(position);
            t.set_rotation(rotation);
            true
        });
    }

    pub fn set_local_transform(
        &mut self,
        world: &mut World,
        entity: Entity,
        position: T::Vector,
        rotation: Quat,
        scale: T::Vector,
    ) {
        self.mutate(world, entity, |t| {
            if t.position() == position && t.rotation() == rotation && t.scale() == scale {
                return false;
            }
            t.set_position(position);
            t.set_rotation(rotation);
            t.set_scale(scale);
            true
        });
    }

    /// Moves `entity` by `offset` in its parent's space.
    pub fn add_local_offset(&mut self, world: &mut World, entity: Entity, offset: T::Vector) {
        self.mutate(world, entity, |t| {
            let position = t.position() + offset;
            if t.position() == position {
                return false;
            }
            t.set_position(position);
            true
        });
    }

    // ---- World space ----

    /// Moves `entity` so that its world position becomes `position`.
    pub fn set_world_position(&mut self, world: &mut World, entity: Entity, position: T::Vector) {
        let Some(component) = world.get::<T>(entity) else {
            return;
        };
        let target = T::vector_to_vec3(position);
        let local = match self.parent_node(world, entity) {
            Some(parent) => {
                let parent_component = world.get::<T>(self.nodes[parent].entity);
                self.nodes[parent].matrix.inverse().transform_point3(target)
                    - component.parent_space_origin(parent_component)
            }
            None => target - component.parent_space_origin(None),
        };
        self.set_local_position(world, entity, T::vector_from_vec3(local));
    }

    /// Rotates `entity` so that its world rotation becomes `rotation`.
    pub fn set_world_rotation(&mut self, world: &mut World, entity: Entity, rotation: Quat) {
        if world.get::<T>(entity).is_none() {
            return;
        }
        let local = match self.parent_node(world, entity) {
            Some(parent) => {
                let (_, parent_rotation, _) = self.nodes[parent].matrix.to_scale_rotation_translation();
                (parent_rotation.inverse() * rotation).normalize()
            }
            None => rotation,
        };
        self.set_local_rotation(world, entity, local);
    }

    /// World matrix of `entity`.
    ///
    /// Cached on the scene node when there is one, otherwise computed from the
    /// local fields.
    pub fn world_matrix(&self, world: &World, entity: Entity) -> Option<Mat4> {
        if let Some(node) = self.node_of(world, entity) {
            return Some(self.nodes[node].matrix);
        }
        world.get::<T>(entity).map(|t| t.local_matrix(None))
    }

    pub fn world_position(&self, world: &World, entity: Entity) -> Option<T::Vector> {
        let pivot = world.get::<T>(entity)?.pivot();
        let matrix = self.world_matrix(world, entity)?;
        Some(T::vector_from_vec3(matrix.transform_point3(pivot)))
    }

    pub fn world_rotation(&self, world: &World, entity: Entity) -> Option<Quat> {
        let (_, rotation, _) = self.world_matrix(world, entity)?.to_scale_rotation_translation();
        Some(rotation)
    }

    pub fn world_scale(&self, world: &World, entity: Entity) -> Option<Vec3> {
        let (scale, _, _) = self.world_matrix(world, entity)?.to_scale_rotation_translation();
        Some(scale)
    }

    /// Local position as stored. Stale while the component is matrix-authoritative.
    pub fn local_position(&self, world: &World, entity: Entity) -> Option<T::Vector> {
        world.get::<T>(entity).map(|t| t.position())
    }

    pub fn local_rotation(&self, world: &World, entity: Entity) -> Option<Quat> {
        world.get::<T>(entity).map(|t| t.rotation())
    }

    pub fn local_scale(&self, world: &World, entity: Entity) -> Option<T::Vector> {
        world.get::<T>(entity).map(|t| t.scale())
    }

    pub fn local_matrix(&self, world: &World, entity: Entity) -> Option<Mat4> {
        let component = world.get::<T>(entity)?;
        let parent = self
            .parent_node(world, entity)
            .and_then(|p| world.get::<T>(self.nodes[p].entity));
        Some(component.local_matrix(parent))
    }

    // ---- Dirty tracking ----

    /// Drains the dirty queue, stamping [`DirtyFrame`] on every live entity.
    ///
    /// Returns the number of queue entries drained, duplicates and dead
    /// entities included.
    pub fn drain_dirty(&self, world: &mut World, frame: u64) -> usize {
        self.dirty.try_dequeue_all(|entity| {
            if !world.entities().contains(entity) {
                return;
            }
            if world.get::<DirtyFrame>(entity).map(|d| d.frame) != Some(frame) {
                world.entity_mut(entity).insert(DirtyFrame { frame });
            }
        })
    }

    // ---- Internals ----

    /// Node of `entity`, if its component points at a live node owned by it.
    fn node_of(&self, world: &World, entity: Entity) -> Option<NodeKey> {
        let key = world.get::<T>(entity)?.node()?;
        (self.nodes.get(key)?.entity == entity).then_some(key)
    }

    fn parent_node(&self, world: &World, entity: Entity) -> Option<NodeKey> {
        self.nodes[self.node_of(world, entity)?].parent
    }

    fn ensure_node(&mut self, world: &mut World, entity: Entity) -> NodeKey {
        if let Some(key) = self.node_of(world, entity) {
            return key;
        }
        let matrix = world
            .get::<T>(entity)
            .map(|t| t.local_matrix(None))
            .unwrap_or(Mat4::IDENTITY);
        let key = node::create(&mut self.nodes, entity, matrix);
        if let Some(mut component) = world.get_mut::<T>(entity) {
            component.bypass_change_detection().set_node(Some(key));
        }
        key
    }

    fn remove_node(&mut self, key: NodeKey) -> Vec<NodeKey> {
        node::detach(&mut self.nodes, key);
        let orphans = node::orphan_children(&mut self.nodes, key);
        self.nodes.remove(key);
        orphans
    }

    /// Runs `edit` on the component after resolving its fields; refreshes
    /// when `edit` reports a change. Missing components are skipped.
    fn mutate(&mut self, world: &mut World, entity: Entity, edit: impl FnOnce(&mut T) -> bool) {
        let Some(mut component) = world.get_mut::<T>(entity) else {
            return;
        };
        let inner = component.bypass_change_detection();
        inner.resolve_fields();
        if !edit(inner) {
            return;
        }
        component.set_changed();
        self.refresh_transform(world, entity);
    }

    /// Marks `entity` dirty and, if it has a node, recomputes its subtree.
    pub(crate) fn refresh_transform(&mut self, world: &World, entity: Entity) {
        match self.node_of(world, entity) {
            Some(node) => self.refresh_subtree(world, node),
            None => self.dirty.enqueue(entity),
        }
    }

    /// Recomputes the world matrix of `root` and every descendant, parent
    /// before child, enqueueing each entity.
    fn refresh_subtree(&mut self, world: &World, root: NodeKey) {
        let mut stack = vec![root];
        while let Some(key) = stack.pop() {
            let SceneNode { entity, parent, .. } = self.nodes[key];
            self.dirty.enqueue(entity);

            if let Some(component) = world.get::<T>(entity) {
                let parent_component = parent.and_then(|p| world.get::<T>(self.nodes[p].entity));
                let local = component.local_matrix(parent_component);
                self.nodes[key].matrix = match parent {
                    Some(p) => self.nodes[p].matrix * local,
                    None => local,
                };
            }

            stack.extend(node::children(&self.nodes, key));
        }
    }
}

impl TransformSystem<Transform> {
    /// Writes the local matrix directly and propagates it.
    ///
    /// The component becomes matrix-authoritative: its position, rotation and
    /// scale fields are left as they were until the next field mutator
    /// decomposes the matrix.
    pub fn set_local_transform_matrix(&mut self, world: &mut World, entity: Entity, matrix: Mat4) {
        let Some(mut component) = world.get_mut::<Transform>(entity) else {
            return;
        };
        if !component.bypass_change_detection().set_matrix(matrix) {
            return;
        }
        component.set_changed();
        self.refresh_transform(world, entity);
    }

    pub fn is_matrix_authoritative(&self, world: &World, entity: Entity) -> bool {
        world
            .get::<Transform>(entity)
            .is_some_and(Transform::is_matrix_authoritative)
    }
}

impl TransformSystem<Transform2D> {
    /// Rotates `entity` to `angle` radians about Z.
    pub fn set_local_angle(&mut self, world: &mut World, entity: Entity, angle: f32) {
        self.set_local_rotation(world, entity, Quat::from_rotation_z(angle));
    }

    pub fn set_layer(&mut self, world: &mut World, entity: Entity, layer: u32) {
        self.mutate(world, entity, |t| {
            if t.layer() == layer {
                return false;
            }
            t.set_layer(layer);
            true
        });
    }

    /// Resizes `entity`. Children anchored to it move with the new size.
    pub fn set_size(&mut self, world: &mut World, entity: Entity, size: Vec2) {
        self.mutate(world, entity, |t| {
            if t.size() == size {
                return false;
            }
            t.set_size(size);
            true
        });
    }

    pub fn set_anchor(&mut self, world: &mut World, entity: Entity, anchor: Vec2) {
        self.mutate(world, entity, |t| {
            if t.anchor() == anchor {
                return false;
            }
            t.set_anchor(anchor);
            true
        });
    }

    pub fn set_relative_point(&mut self, world: &mut World, entity: Entity, relative_point: Vec2) {
        self.mutate(world, entity, |t| {
            if t.relative_point() == relative_point {
                return false;
            }
            t.set_relative_point(relative_point);
            true
        });
    }

    pub fn layer(&self, world: &World, entity: Entity) -> Option<u32> {
        world.get::<Transform2D>(entity).map(Transform2D::layer)
    }

    pub fn size(&self, world: &World, entity: Entity) -> Option<Vec2> {
        world.get::<Transform2D>(entity).map(Transform2D::size)
    }

    /// Canvas-space bounds of the entity's `(0, 0)..size` rectangle.
    pub fn bounding_rect(&self, world: &World, entity: Entity) -> Option<Rect> {
        let size = world.get::<Transform2D>(entity)?.size();
        let matrix = self.world_matrix(world, entity)?;
        let corners = [
            Vec2::ZERO,
            Vec2::new(size.x, 0.0),
            Vec2::new(0.0, size.y),
            size,
        ];
        Rect::from_points(
            corners
                .into_iter()
                .map(|c| matrix.transform_point3(c.extend(0.0)).truncate()),
        )
    }
}
