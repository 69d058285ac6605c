//! Physics resource, mesh descriptor components and transform sync.

use bevy_ecs::change_detection::Mut;
use bevy_ecs::component::{Component, ComponentId};
use bevy_ecs::entity::Entity;
use bevy_ecs::prelude::{Resource, With, Without};
use bevy_ecs::world::{DeferredWorld, World};
use glam::{Mat4, Vec3};
use slotmap::SecondaryMap;

use super::{BasicPhysics, BodyDesc, BodyHandle, BodyKind, BodyPose, FixedTimestep, PhysicsBackend};
use crate::config::PhysicsConfig;
use crate::scene::{Transform, TransformSystem3D};

/// Immovable box collider. Adding it queues body creation.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
#[component(on_add = queue_body_creation)]
pub struct StaticMesh {
    pub half_extents: Vec3,
}

/// Box collider that follows the entity's transform.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
#[component(on_add = queue_body_creation)]
pub struct KinematicMesh {
    pub half_extents: Vec3,
}

/// Simulated box collider whose pose is written back to the transform.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
#[component(on_add = queue_body_creation)]
pub struct DynamicMesh {
    pub half_extents: Vec3,
}

/// Body created for this entity.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
#[component(on_replace = queue_body_removal)]
pub struct PhysicsBody(pub BodyHandle);

/// Work queued by component hooks, applied at the start of the physics stage.
#[derive(Resource, Debug, Default)]
pub struct PhysicsQueue {
    creations: Vec<Entity>,
    removals: Vec<BodyHandle>,
}

impl PhysicsQueue {
    pub fn pending_creations(&self) -> usize {
        self.creations.len()
    }
}

fn queue_body_creation(mut world: DeferredWorld, entity: Entity, _: ComponentId) {
    if let Some(mut queue) = world.get_resource_mut::<PhysicsQueue>() {
        queue.creations.push(entity);
    }
}

fn queue_body_removal(mut world: DeferredWorld, entity: Entity, _: ComponentId) {
    let Some(&PhysicsBody(handle)) = world.get::<PhysicsBody>(entity) else {
        return;
    };
    if let Some(mut queue) = world.get_resource_mut::<PhysicsQueue>() {
        queue.removals.push(handle);
    }
}

/// Physics state owned by the physics stage.
#[derive(Resource)]
pub struct PhysicsWorld {
    backend: Box<dyn PhysicsBackend>,
    timestep: FixedTimestep,
    substeps: u32,
    entities: SecondaryMap<BodyHandle, Entity>,
    steps: u64,
}

impl PhysicsWorld {
    pub fn new(config: &PhysicsConfig) -> Self {
        Self::with_backend(config, Box::new(BasicPhysics::from_config(config)))
    }

    pub fn with_backend(config: &PhysicsConfig, backend: Box<dyn PhysicsBackend>) -> Self {
        Self {
            backend,
            timestep: FixedTimestep::new(config.fixed_step, config.max_frame_delta),
            substeps: config.substeps,
            entities: SecondaryMap::new(),
            steps: 0,
        }
    }

    /// Inserts the physics world and its hook queue unless already present.
    ///
    /// Mesh entities spawned before this call are queued for creation too.
    pub fn install(world: &mut World, physics: PhysicsWorld) {
        if world.contains_resource::<PhysicsWorld>() {
            return;
        }
        world.init_resource::<PhysicsQueue>();
        world.insert_resource(physics);

        let mut existing = Vec::new();
        existing.extend(unbuilt::<StaticMesh>(world));
        existing.extend(unbuilt::<KinematicMesh>(world));
        existing.extend(unbuilt::<DynamicMesh>(world));
        if !existing.is_empty() {
            log::debug!("Queued {} pre-existing physics meshes", existing.len());
            world.resource_mut::<PhysicsQueue>().creations.extend(existing);
        }
    }

    pub fn backend(&self) -> &dyn PhysicsBackend {
        self.backend.as_ref()
    }

    pub fn backend_mut(&mut self) -> &mut dyn PhysicsBackend {
        self.backend.as_mut()
    }

    pub fn timestep(&self) -> &FixedTimestep {
        &self.timestep
    }

    /// Simulation steps taken so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn entity(&self, handle: BodyHandle) -> Option<Entity> {
        self.entities.get(handle).copied()
    }

    /// Applies queued hook work, advances the accumulator and, if due, steps
    /// the simulation and writes dynamic poses back. Returns `true` if a
    /// step ran.
    pub fn run(&mut self, transforms: &mut TransformSystem3D, world: &mut World, dt: f32) -> bool {
        self.apply_queue(transforms, world);
        self.sync_kinematic(transforms, world);

        if !self.timestep.advance(dt) {
            return false;
        }
        self.backend.step(self.timestep.step(), self.substeps);
        self.steps += 1;
        self.write_back(transforms, world);
        true
    }

    fn apply_queue(&mut self, transforms: &TransformSystem3D, world: &mut World) {
        let (creations, removals) = match world.get_resource_mut::<PhysicsQueue>() {
            Some(mut queue) => (
                std::mem::take(&mut queue.creations),
                std::mem::take(&mut queue.removals),
            ),
            None => return,
        };

        for handle in removals {
            if self.backend.remove_body(handle) {
                self.entities.remove(handle);
            }
        }

        for entity in creations {
            self.create_body(transforms, world, entity);
        }
    }

    fn create_body(&mut self, transforms: &TransformSystem3D, world: &mut World, entity: Entity) {
        if !world.entities().contains(entity) || world.get::<PhysicsBody>(entity).is_some() {
            return;
        }
        let Some((kind, half_extents)) = mesh_of(world, entity) else {
            return;
        };
        let Some(matrix) = transforms.world_matrix(world, entity) else {
            log::warn!("Physics mesh on {entity} has no transform, body not created");
            return;
        };

        let (scale, rotation, position) = matrix.to_scale_rotation_translation();
        let desc = BodyDesc {
            kind,
            position,
            rotation,
            half_extents: half_extents * scale.abs(),
        };
        let Some(handle) = self.backend.create_body(&desc) else {
            log::error!("Physics body creation failed for {entity}: backend out of bodies");
            return;
        };

        self.entities.insert(handle, entity);
        world.entity_mut(entity).insert(PhysicsBody(handle));
        log::trace!("Created {kind:?} body for {entity}");
    }

    fn sync_kinematic(&mut self, transforms: &TransformSystem3D, world: &mut World) {
        let bodies: Vec<(Entity, BodyHandle)> = world
            .query_filtered::<(Entity, &PhysicsBody), With<KinematicMesh>>()
            .iter(world)
            .map(|(entity, body)| (entity, body.0))
            .collect();

        for (entity, handle) in bodies {
            if let Some(matrix) = transforms.world_matrix(world, entity) {
                let (_, rotation, position) = matrix.to_scale_rotation_translation();
                self.backend.set_kinematic_pose(handle, BodyPose { position, rotation });
            }
        }
    }

    fn write_back(&mut self, transforms: &mut TransformSystem3D, world: &mut World) {
        for handle in self.backend.active_bodies() {
            let Some(&entity) = self.entities.get(handle) else {
                continue;
            };
            let Some(pose) = self.backend.body_pose(handle) else {
                continue;
            };
            let scale = transforms.world_scale(world, entity).unwrap_or(Vec3::ONE);
            let body_world = Mat4::from_scale_rotation_translation(scale, pose.rotation, pose.position);
            let local = match transforms.parent(world, entity) {
                Some(parent) => transforms
                    .world_matrix(world, parent)
                    .map_or(body_world, |p| p.inverse() * body_world),
                None => body_world,
            };
            transforms.set_local_transform_matrix(world, entity, local);
        }
    }
}

/// Runs `f` with the physics world and the 3D transform system.
///
/// Returns `None` if either is missing.
pub fn with_physics<R>(
    world: &mut World,
    f: impl FnOnce(&mut PhysicsWorld, &mut TransformSystem3D, &mut World) -> R,
) -> Option<R> {
    if !world.contains_resource::<PhysicsWorld>() {
        return None;
    }
    world
        .resource_scope(|world, mut physics: Mut<PhysicsWorld>| {
            TransformSystem3D::scope(world, |transforms, world| f(&mut *physics, transforms, world))
        })
}

fn mesh_of(world: &World, entity: Entity) -> Option<(BodyKind, Vec3)> {
    if let Some(mesh) = world.get::<DynamicMesh>(entity) {
        return Some((BodyKind::Dynamic, mesh.half_extents));
    }
    if let Some(mesh) = world.get::<KinematicMesh>(entity) {
        return Some((BodyKind::Kinematic, mesh.half_extents));
    }
    world
        .get::<StaticMesh>(entity)
        .map(|mesh| (BodyKind::Static, mesh.half_extents))
}

fn unbuilt<C: Component>(world: &mut World) -> Vec<Entity> {
    world
        .query_filtered::<Entity, (With<C>, With<Transform>, Without<PhysicsBody>)>()
        .iter(world)
        .collect()
}
