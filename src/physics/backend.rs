//! Physics backend seam and a minimal reference backend.

use glam::{Quat, Vec3};
use slotmap::{new_key_type, SlotMap};

use crate::config::PhysicsConfig;

new_key_type! {
    /// Handle of a body inside a [`PhysicsBackend`].
    pub struct BodyHandle;
}

/// How a body is moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// Immovable.
    Static,
    /// Moved by its transform, pushes dynamic bodies.
    Kinematic,
    /// Moved by the simulation, written back to its transform.
    Dynamic,
}

/// Placement and size of a body at creation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyDesc {
    pub kind: BodyKind,
    pub position: Vec3,
    pub rotation: Quat,
    /// Box half extents in world units, world scale already applied
    pub half_extents: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyPose {
    pub position: Vec3,
    pub rotation: Quat,
}

/// Black-box simulation driven by the physics stage.
pub trait PhysicsBackend: Send + Sync {
    /// Creates a body. `None` means the backend is out of resources.
    fn create_body(&mut self, desc: &BodyDesc) -> Option<BodyHandle>;

    fn remove_body(&mut self, handle: BodyHandle) -> bool;

    /// Advances the simulation by `dt` seconds split into `substeps`.
    fn step(&mut self, dt: f32, substeps: u32);

    /// Dynamic bodies that moved in the last step.
    fn active_bodies(&self) -> Vec<BodyHandle>;

    fn body_pose(&self, handle: BodyHandle) -> Option<BodyPose>;

    fn set_kinematic_pose(&mut self, handle: BodyHandle, pose: BodyPose);

    fn body_count(&self) -> usize;
}

/// Speed under which a body counts as resting.
const SLEEP_SPEED: f32 = 0.05;
/// Seconds a body must rest before it sleeps.
const SLEEP_TIME: f32 = 0.5;

#[derive(Debug, Clone)]
struct Body {
    kind: BodyKind,
    pose: BodyPose,
    half_extents: Vec3,
    velocity: Vec3,
    rest_time: f32,
    sleeping: bool,
}

/// Gravity, a ground plane and sleeping. Bodies do not collide with each other.
#[derive(Debug, Clone)]
pub struct BasicPhysics {
    bodies: SlotMap<BodyHandle, Body>,
    pub gravity: Vec3,
    pub ground_height: Option<f32>,
    pub max_bodies: Option<usize>,
}

impl Default for BasicPhysics {
    fn default() -> Self {
        Self::from_config(&PhysicsConfig::default())
    }
}

impl BasicPhysics {
    pub fn from_config(config: &PhysicsConfig) -> Self {
        Self {
            bodies: SlotMap::with_key(),
            gravity: config.gravity,
            ground_height: config.ground_height,
            max_bodies: config.max_bodies,
        }
    }

    pub fn velocity(&self, handle: BodyHandle) -> Option<Vec3> {
        self.bodies.get(handle).map(|b| b.velocity)
    }

    pub fn set_velocity(&mut self, handle: BodyHandle, velocity: Vec3) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.velocity = velocity;
            body.sleeping = false;
            body.rest_time = 0.0;
        }
    }

    pub fn is_sleeping(&self, handle: BodyHandle) -> bool {
        self.bodies.get(handle).is_some_and(|b| b.sleeping)
    }

    fn integrate(body: &mut Body, gravity: Vec3, ground: Option<f32>, dt: f32) {
        body.velocity += gravity * dt;
        body.pose.position += body.velocity * dt;

        if let Some(ground) = ground {
            let bottom = body.pose.position.y - body.half_extents.y;
            if bottom < ground {
                body.pose.position.y = ground + body.half_extents.y;
                body.velocity.y = 0.0;
                body.velocity.x *= 0.9;
                body.velocity.z *= 0.9;
            }
        }
    }
}

impl PhysicsBackend for BasicPhysics {
    fn create_body(&mut self, desc: &BodyDesc) -> Option<BodyHandle> {
        if self.max_bodies.is_some_and(|max| self.bodies.len() >= max) {
            return None;
        }
        Some(self.bodies.insert(Body {
            kind: desc.kind,
            pose: BodyPose {
                position: desc.position,
                rotation: desc.rotation,
            },
            half_extents: desc.half_extents,
            velocity: Vec3::ZERO,
            rest_time: 0.0,
            sleeping: false,
        }))
    }

    fn remove_body(&mut self, handle: BodyHandle) -> bool {
        self.bodies.remove(handle).is_some()
    }

    fn step(&mut self, dt: f32, substeps: u32) {
        let substeps = substeps.max(1);
        let sub_dt = dt / substeps as f32;
        for body in self.bodies.values_mut() {
            if body.kind != BodyKind::Dynamic || body.sleeping {
                continue;
            }
            for _ in 0..substeps {
                Self::integrate(body, self.gravity, self.ground_height, sub_dt);
            }
            if body.velocity.length() < SLEEP_SPEED {
                body.rest_time += dt;
                if body.rest_time >= SLEEP_TIME {
                    body.sleeping = true;
                    body.velocity = Vec3::ZERO;
                }
            } else {
                body.rest_time = 0.0;
            }
        }
    }

    fn active_bodies(&self) -> Vec<BodyHandle> {
        self.bodies
            .iter()
            .filter(|(_, b)| b.kind == BodyKind::Dynamic && !b.sleeping)
            .map(|(handle, _)| handle)
            .collect()
    }

    fn body_pose(&self, handle: BodyHandle) -> Option<BodyPose> {
        self.bodies.get(handle).map(|b| b.pose)
    }

    fn set_kinematic_pose(&mut self, handle: BodyHandle, pose: BodyPose) {
        if let Some(body) = self.bodies.get_mut(handle) {
            if body.kind == BodyKind::Kinematic {
                body.pose = pose;
            }
        }
    }

    fn body_count(&self) -> usize {
        self.bodies.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(kind: BodyKind, y: f32) -> BodyDesc {
        BodyDesc {
            kind,
            position: Vec3::new(0.0, y, 0.0),
            rotation: Quat::IDENTITY,
            half_extents: Vec3::splat(0.5),
        }
    }

    #[test]
    fn dynamic_body_falls_and_rests_on_ground() {
        let mut physics = BasicPhysics::default();
        let body = physics.create_body(&desc(BodyKind::Dynamic, 2.0)).unwrap();

        physics.step(1.0 / 60.0, 1);
        assert!(physics.body_pose(body).unwrap().position.y < 2.0);
        assert_eq!(physics.active_bodies(), vec![body]);

        for _ in 0..300 {
            physics.step(1.0 / 60.0, 2);
        }
        assert!((physics.body_pose(body).unwrap().position.y - 0.5).abs() < 1e-4);
        assert!(physics.is_sleeping(body));
        assert!(physics.active_bodies().is_empty());
    }

    #[test]
    fn static_and_kinematic_bodies_do_not_fall() {
        let mut physics = BasicPhysics::default();
        let fixed = physics.create_body(&desc(BodyKind::Static, 3.0)).unwrap();
        let moving = physics.create_body(&desc(BodyKind::Kinematic, 3.0)).unwrap();

        physics.step(0.1, 1);
        assert_eq!(physics.body_pose(fixed).unwrap().position.y, 3.0);

        let pose = BodyPose {
            position: Vec3::new(1.0, 1.0, 1.0),
            rotation: Quat::IDENTITY,
        };
        physics.set_kinematic_pose(moving, pose);
        physics.set_kinematic_pose(fixed, pose);
        assert_eq!(physics.body_pose(moving), Some(pose));
        assert_eq!(physics.body_pose(fixed).unwrap().position.y, 3.0);
    }

    #[test]
    fn body_limit_exhausts() {
        let mut physics = BasicPhysics {
            max_bodies: Some(1),
            ..BasicPhysics::default()
        };
        assert!(physics.create_body(&desc(BodyKind::Dynamic, 1.0)).is_some());
        assert!(physics.create_body(&desc(BodyKind::Dynamic, 1.0)).is_none());
        assert_eq!(physics.body_count(), 1);
    }
}
