//! The stages of the standard frame, in execution order.

use bevy_ecs::entity::Entity;
use bevy_ecs::prelude::{With, Without};
use bevy_ecs::world::World;
use glam::{EulerRot, Vec3};

use super::{EngineStats, FrameCount, Stage, StageAccess};
use crate::components::{
    ActiveCamera, AreaLight, Camera, CameraMatrices, CharacterController, DayNight, FreeFlyCamera,
    LocalBounds, NetTarget, NetworkInbox, OrbitCamera, ShadowMatrices, Skybox, WorldBounds,
};
use crate::config::{CameraConfig, NetworkConfig, ShadowConfig};
use crate::debug_draw::DebugDraw;
use crate::input::InputState;
use crate::physics::with_physics;
use crate::scene::{DirtyFrame, Transform, Transform2D, TransformSystem2D, TransformSystem3D};
use crate::scripting::Scripts;
use crate::ui::BoundingRect;

fn current_frame(world: &World) -> u64 {
    world.get_resource::<FrameCount>().map_or(0, |f| f.0)
}

/// Entities carrying component `C`.
fn entities_with<C: bevy_ecs::component::Component>(world: &mut World) -> Vec<Entity> {
    world.query_filtered::<Entity, With<C>>().iter(world).collect()
}

/// Advances the time of day.
pub struct AdvanceDayNight;

impl Stage for AdvanceDayNight {
    fn access(&self) -> StageAccess {
        StageAccess::empty()
    }

    fn run(&mut self, world: &mut World, dt: f32) {
        if let Some(mut day_night) = world.get_resource_mut::<DayNight>() {
            day_night.advance(dt);
        }
    }
}

/// Drains the network inbox into [`NetTarget`]s.
///
/// An entity seen for the first time snaps to its received pose; later
/// states only move the target. States older than the current target are
/// dropped.
pub struct PumpConnection;

impl Stage for PumpConnection {
    fn access(&self) -> StageAccess {
        StageAccess::WRITE
    }

    fn run(&mut self, world: &mut World, _dt: f32) {
        let Some(states) = world.get_resource::<NetworkInbox>().map(NetworkInbox::drain) else {
            return;
        };
        if states.is_empty() {
            return;
        }
        log::trace!("Received {} remote states", states.len());

        TransformSystem3D::scope(world, |transforms, world| {
            for state in states {
                if !world.entities().contains(state.entity) {
                    continue;
                }
                match world.get::<NetTarget>(state.entity).copied() {
                    Some(target) if target.tick > state.tick => continue,
                    Some(_) => {}
                    None => transforms.set_local_position_and_rotation(
                        world,
                        state.entity,
                        state.position,
                        state.rotation,
                    ),
                }
                world.entity_mut(state.entity).insert(NetTarget::from(state));
            }
        });
    }
}

/// Rebuilds the debug line buffer.
///
/// Bound wireframes come from the previous frame's [`WorldBounds`].
pub struct CollectDebugDraw;

impl Stage for CollectDebugDraw {
    fn access(&self) -> StageAccess {
        StageAccess::READ
    }

    fn run(&mut self, world: &mut World, _dt: f32) {
        let Some(draw_bounds) = world.get_resource::<DebugDraw>().map(|d| d.draw_bounds) else {
            return;
        };
        let bounds: Vec<WorldBounds> = if draw_bounds {
            world.query::<&WorldBounds>().iter(world).copied().collect()
        } else {
            Vec::new()
        };

        let mut debug_draw = world.resource_mut::<DebugDraw>();
        debug_draw.clear();
        for WorldBounds(aabb) in bounds {
            debug_draw.aabb(&aabb, DebugDraw::BOUNDS_COLOR);
        }
    }
}

/// Moves locally controlled characters from input, relative to the active
/// camera's heading.
pub struct MoveCharacters;

impl Stage for MoveCharacters {
    fn access(&self) -> StageAccess {
        StageAccess::READ | StageAccess::WRITE
    }

    fn run(&mut self, world: &mut World, dt: f32) {
        let Some(input) = world.get_resource::<InputState>().cloned() else {
            return;
        };
        let characters: Vec<(Entity, CharacterController)> = world
            .query_filtered::<(Entity, &CharacterController), (With<Transform>, Without<NetTarget>)>()
            .iter(world)
            .map(|(entity, controller)| (entity, controller.clone()))
            .collect();
        if characters.is_empty() {
            return;
        }

        let camera = world.get_resource::<ActiveCamera>().and_then(|c| c.0);
        TransformSystem3D::scope(world, |transforms, world| {
            let view_yaw = camera
                .and_then(|c| transforms.world_rotation(world, c))
                .map_or(0.0, |r| r.to_euler(EulerRot::YXZ).0);

            for (entity, controller) in characters {
                let displacement = controller.displacement(&input, view_yaw, dt);
                if displacement == Vec3::ZERO {
                    continue;
                }
                let Some(position) = transforms.world_position(world, entity) else {
                    continue;
                };
                transforms.set_world_position(world, entity, position + displacement);
                if controller.face_movement {
                    if let Some(facing) = CharacterController::facing(displacement) {
                        transforms.set_world_rotation(world, entity, facing);
                    }
                }
            }
        });
    }
}

/// Moves remote entities towards their [`NetTarget`].
pub struct InterpolateRemoteEntities {
    pub config: NetworkConfig,
}

impl Stage for InterpolateRemoteEntities {
    fn access(&self) -> StageAccess {
        StageAccess::WRITE
    }

    fn run(&mut self, world: &mut World, dt: f32) {
        let targets: Vec<(Entity, NetTarget)> = world
            .query_filtered::<(Entity, &NetTarget), With<Transform>>()
            .iter(world)
            .map(|(entity, target)| (entity, *target))
            .collect();
        if targets.is_empty() {
            return;
        }

        let blend = 1.0 - (-self.config.interpolation_rate * dt).exp();
        let snap_distance = self.config.snap_distance;
        TransformSystem3D::scope(world, |transforms, world| {
            for (entity, target) in targets {
                let (Some(position), Some(rotation)) = (
                    transforms.local_position(world, entity),
                    transforms.local_rotation(world, entity),
                ) else {
                    continue;
                };
                let (position, rotation) = if position.distance(target.position) > snap_distance {
                    (target.position, target.rotation)
                } else {
                    (
                        position.lerp(target.position, blend),
                        rotation.slerp(target.rotation, blend),
                    )
                };
                transforms.set_local_position_and_rotation(world, entity, position, rotation);
            }
        });
    }
}

/// Applies input to free-fly and orbit cameras.
pub struct UpdateCameraControllers;

impl Stage for UpdateCameraControllers {
    fn access(&self) -> StageAccess {
        StageAccess::READ | StageAccess::WRITE
    }

    fn run(&mut self, world: &mut World, dt: f32) {
        let Some(input) = world.get_resource::<InputState>().cloned() else {
            return;
        };
        let free_fly = entities_with::<FreeFlyCamera>(world);
        let orbit = entities_with::<OrbitCamera>(world);

        TransformSystem3D::scope(world, |transforms, world| {
            for entity in free_fly {
                let Some(position) = transforms.local_position(world, entity) else {
                    continue;
                };
                let Some(mut controller) = world.get_mut::<FreeFlyCamera>(entity) else {
                    continue;
                };
                let (position, rotation) = controller.update(&input, position, dt);
                transforms.set_local_position_and_rotation(world, entity, position, rotation);
            }

            for entity in orbit {
                let Some(target) = world.get::<OrbitCamera>(entity).map(|o| o.target) else {
                    continue;
                };
                let focus = match target {
                    Some(target) => match transforms.world_position(world, target) {
                        Some(position) => position,
                        None => continue,
                    },
                    None => Vec3::ZERO,
                };
                let Some(mut controller) = world.get_mut::<OrbitCamera>(entity) else {
                    continue;
                };
                let (position, rotation) = controller.update(&input, focus);
                transforms.set_world_position(world, entity, position);
                transforms.set_world_rotation(world, entity, rotation);
            }
        });
    }
}

/// Computes [`CameraMatrices`] from the active camera's current world matrix.
pub struct ComputeCameraMatrices {
    pub config: CameraConfig,
}

impl Stage for ComputeCameraMatrices {
    fn access(&self) -> StageAccess {
        StageAccess::READ
    }

    fn run(&mut self, world: &mut World, _dt: f32) {
        let Some(entity) = world.get_resource::<ActiveCamera>().and_then(|c| c.0) else {
            return;
        };
        let Some(camera) = world.get::<Camera>(entity).copied() else {
            return;
        };
        let Some(matrix) = world
            .get_resource::<TransformSystem3D>()
            .and_then(|t| t.world_matrix(world, entity))
        else {
            return;
        };

        let aspect_ratio = camera.aspect_ratio.unwrap_or(self.config.aspect_ratio);
        let frame = current_frame(world);
        if let Some(mut matrices) = world.get_resource_mut::<CameraMatrices>() {
            *matrices = CameraMatrices {
                frame,
                ..CameraMatrices::compute(matrix, &camera.projection, aspect_ratio)
            };
        }
    }
}

/// Computes [`ShadowMatrices`] from the sun and this frame's camera.
pub struct ComputeShadowMatrices {
    pub config: ShadowConfig,
}

impl Stage for ComputeShadowMatrices {
    fn access(&self) -> StageAccess {
        StageAccess::READ
    }

    fn run(&mut self, world: &mut World, _dt: f32) {
        let frame = current_frame(world);
        let Some(camera) = world.get_resource::<CameraMatrices>().filter(|m| m.frame == frame) else {
            return;
        };
        let Some(day_night) = world.get_resource::<DayNight>() else {
            return;
        };

        let shadow = ShadowMatrices {
            frame,
            ..ShadowMatrices::compute(
                camera.position,
                day_night.sun_direction(),
                self.config.extent,
                self.config.distance,
            )
        };
        if let Some(mut matrices) = world.get_resource_mut::<ShadowMatrices>() {
            *matrices = shadow;
        }
    }
}

/// Keeps [`Skybox`] entities centred on the camera.
pub struct FollowCamera;

impl Stage for FollowCamera {
    fn access(&self) -> StageAccess {
        StageAccess::WRITE
    }

    fn run(&mut self, world: &mut World, _dt: f32) {
        let frame = current_frame(world);
        let Some(position) = world
            .get_resource::<CameraMatrices>()
            .filter(|m| m.frame == frame)
            .map(|m| m.position)
        else {
            return;
        };
        let skyboxes = entities_with::<Skybox>(world);

        TransformSystem3D::scope(world, |transforms, world| {
            for entity in skyboxes {
                transforms.set_world_position(world, entity, position);
            }
        });
    }
}

/// Updates the world-space corners of area lights.
pub struct UpdateAreaLights;

impl Stage for UpdateAreaLights {
    fn access(&self) -> StageAccess {
        StageAccess::READ
    }

    fn run(&mut self, world: &mut World, _dt: f32) {
        let lights = entities_with::<AreaLight>(world);
        let corners: Vec<(Entity, [Vec3; 4])> = {
            let Some(transforms) = world.get_resource::<TransformSystem3D>() else {
                return;
            };
            lights
                .into_iter()
                .filter_map(|entity| {
                    let matrix = transforms.world_matrix(world, entity)?;
                    let light = world.get::<AreaLight>(entity)?;
                    Some((entity, light.corners(&matrix)))
                })
                .collect()
        };

        for (entity, world_corners) in corners {
            if let Some(mut light) = world.get_mut::<AreaLight>(entity) {
                light.world_corners = world_corners;
            }
        }
    }
}

/// Drains both dirty queues and maintains [`DirtyFrame`] markers.
///
/// Every drained live entity is stamped with the current frame; markers from
/// earlier frames are removed.
pub struct FinalizeTransforms;

impl Stage for FinalizeTransforms {
    fn access(&self) -> StageAccess {
        StageAccess::FINALIZE
    }

    fn run(&mut self, world: &mut World, _dt: f32) {
        let frame = current_frame(world);

        let drained_3d = TransformSystem3D::scope(world, |transforms, world| {
            transforms.flush_removals(world);
            transforms.drain_dirty(world, frame)
        })
        .unwrap_or(0);
        let drained_2d = TransformSystem2D::scope(world, |transforms, world| {
            transforms.flush_removals(world);
            transforms.drain_dirty(world, frame)
        })
        .unwrap_or(0);

        let stale: Vec<Entity> = world
            .query::<(Entity, &DirtyFrame)>()
            .iter(world)
            .filter(|(_, dirty)| dirty.frame != frame)
            .map(|(entity, _)| entity)
            .collect();
        for &entity in &stale {
            world.entity_mut(entity).remove::<DirtyFrame>();
        }

        log::trace!(
            "Frame {frame}: finalized {drained_3d} 3D and {drained_2d} 2D notifications, cleared {} markers",
            stale.len()
        );
        if let Some(mut stats) = world.get_resource_mut::<EngineStats>() {
            stats.dirty_notifications = drained_3d + drained_2d;
        }
    }
}

/// Recomputes [`WorldBounds`] and [`BoundingRect`]s of entities dirtied this
/// frame, and of entities that have never had them.
pub struct RecomputeBounds;

impl Stage for RecomputeBounds {
    fn access(&self) -> StageAccess {
        StageAccess::READ_FINALIZED
    }

    fn run(&mut self, world: &mut World, _dt: f32) {
        let frame = current_frame(world);
        let is_current = |dirty: Option<&DirtyFrame>| dirty.is_some_and(|d| d.frame == frame);

        let meshes: Vec<(Entity, LocalBounds)> = world
            .query_filtered::<(Entity, &LocalBounds, Option<&DirtyFrame>, Option<&WorldBounds>), With<Transform>>()
            .iter(world)
            .filter(|(_, _, dirty, existing)| is_current(*dirty) || existing.is_none())
            .map(|(entity, bounds, _, _)| (entity, *bounds))
            .collect();
        let panels: Vec<Entity> = world
            .query::<(Entity, &Transform2D, Option<&DirtyFrame>, Option<&BoundingRect>)>()
            .iter(world)
            .filter(|(_, _, dirty, existing)| is_current(*dirty) || existing.is_none())
            .map(|(entity, ..)| entity)
            .collect();

        let world_bounds: Vec<(Entity, WorldBounds)> = match world.get_resource::<TransformSystem3D>() {
            Some(transforms) => meshes
                .into_iter()
                .filter_map(|(entity, LocalBounds(local))| {
                    let matrix = transforms.world_matrix(world, entity)?;
                    Some((entity, WorldBounds(local.transformed(&matrix))))
                })
                .collect(),
            None => Vec::new(),
        };
        let rects: Vec<(Entity, BoundingRect)> = match world.get_resource::<TransformSystem2D>() {
            Some(transforms) => panels
                .into_iter()
                .filter_map(|entity| Some((entity, BoundingRect(transforms.bounding_rect(world, entity)?))))
                .collect(),
            None => Vec::new(),
        };

        for (entity, bounds) in world_bounds {
            world.entity_mut(entity).insert(bounds);
        }
        for (entity, rect) in rects {
            world.entity_mut(entity).insert(rect);
        }
    }
}

/// Steps physics on the fixed timestep and writes dynamic bodies back.
///
/// Write-backs re-enter the dirty queue and are finalized next frame.
pub struct StepPhysics;

impl Stage for StepPhysics {
    fn access(&self) -> StageAccess {
        StageAccess::WRITE
    }

    fn run(&mut self, world: &mut World, dt: f32) {
        let Some(steps) = with_physics(world, |physics, transforms, world| {
            physics.run(transforms, world, dt);
            physics.steps()
        }) else {
            return;
        };
        if let Some(mut stats) = world.get_resource_mut::<EngineStats>() {
            stats.physics_steps = steps;
        }
    }
}

/// Runs script hosts as the terminal stage.
pub struct RunScripts;

impl Stage for RunScripts {
    fn access(&self) -> StageAccess {
        StageAccess::READ_FINALIZED | StageAccess::WRITE | StageAccess::TERMINAL
    }

    fn run(&mut self, world: &mut World, dt: f32) {
        Scripts::run(world, dt);
    }
}
