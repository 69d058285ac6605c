//! Camera components, controllers and the per-frame camera matrices.
//!
//! - [`Camera`]: projection settings, placed by the entity's [`Transform`](crate::scene::Transform)
//! - [`ActiveCamera`]: which camera entity the frame is rendered from
//! - [`CameraMatrices`] / [`ShadowMatrices`]: matrices computed once per frame
//! - [`FreeFlyCamera`] / [`OrbitCamera`]: input-driven controllers

use std::f32::consts::FRAC_PI_2;

use bevy_ecs::component::Component;
use bevy_ecs::entity::Entity;
use bevy_ecs::prelude::Resource;
use bytemuck::{Pod, Zeroable};
use glam::{EulerRot, Mat4, Quat, Vec3, Vec4};

use crate::input::{InputState, Key};

/// Keeps pitch away from the poles so yaw stays well defined.
const PITCH_LIMIT: f32 = FRAC_PI_2 - 0.01;

/// Projection mode for cameras.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CameraProjection {
    /// Perspective projection, `fov_y` in radians.
    Perspective { fov_y: f32, near: f32, far: f32 },
    /// Orthographic projection, `scale` is the half-height of the view.
    Orthographic { scale: f32, near: f32, far: f32 },
}

impl Default for CameraProjection {
    fn default() -> Self {
        Self::Perspective {
            fov_y: std::f32::consts::FRAC_PI_4,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl CameraProjection {
    /// Creates a perspective projection with the given FOV in degrees.
    #[inline]
    pub fn perspective(fov_y_degrees: f32, near: f32, far: f32) -> Self {
        Self::Perspective {
            fov_y: fov_y_degrees.to_radians(),
            near,
            far,
        }
    }

    #[inline]
    pub fn orthographic(scale: f32, near: f32, far: f32) -> Self {
        Self::Orthographic { scale, near, far }
    }

    pub fn compute_matrix(&self, aspect_ratio: f32) -> Mat4 {
        match *self {
            Self::Perspective { fov_y, near, far } => Mat4::perspective_rh(fov_y, aspect_ratio, near, far),
            Self::Orthographic { scale, near, far } => {
                let half_width = scale * aspect_ratio;
                Mat4::orthographic_rh(-half_width, half_width, -scale, scale, near, far)
            }
        }
    }

    pub fn near(&self) -> f32 {
        match *self {
            Self::Perspective { near, .. } | Self::Orthographic { near, .. } => near,
        }
    }

    pub fn far(&self) -> f32 {
        match *self {
            Self::Perspective { far, .. } | Self::Orthographic { far, .. } => far,
        }
    }
}

/// A viewpoint. The view matrix comes from the entity's world matrix.
#[derive(Component, Debug, Clone, Copy, PartialEq, Default)]
pub struct Camera {
    pub projection: CameraProjection,
    /// Overrides the configured aspect ratio.
    pub aspect_ratio: Option<f32>,
}

impl Camera {
    pub fn new(projection: CameraProjection) -> Self {
        Self {
            projection,
            aspect_ratio: None,
        }
    }

    #[must_use]
    pub fn with_aspect_ratio(mut self, aspect_ratio: f32) -> Self {
        self.aspect_ratio = Some(aspect_ratio);
        self
    }
}

/// The camera entity the frame is rendered from.
#[derive(Resource, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActiveCamera(pub Option<Entity>);

/// Matrices of the active camera, computed from its finalized-this-frame
/// world matrix.
#[derive(Resource, Debug, Clone, Copy, PartialEq)]
pub struct CameraMatrices {
    pub view: Mat4,
    pub projection: Mat4,
    pub view_projection: Mat4,
    pub position: Vec3,
    /// Frame the matrices were computed in, 0 before the first computation.
    pub frame: u64,
}

impl Default for CameraMatrices {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            view_projection: Mat4::IDENTITY,
            position: Vec3::ZERO,
            frame: 0,
        }
    }
}

impl CameraMatrices {
    /// Builds the matrices for a camera placed at `world`.
    ///
    /// Scale in `world` is ignored.
    pub fn compute(world: Mat4, projection: &CameraProjection, aspect_ratio: f32) -> Self {
        let (_, rotation, position) = world.to_scale_rotation_translation();
        let view = Mat4::from_rotation_translation(rotation, position).inverse();
        let projection = projection.compute_matrix(aspect_ratio);
        Self {
            view,
            projection,
            view_projection: projection * view,
            position,
            frame: 0,
        }
    }

    pub fn to_uniform(&self) -> CameraUniform {
        CameraUniform {
            view: self.view,
            projection: self.projection,
            view_projection: self.view_projection,
            position: self.position.extend(1.0),
        }
    }
}

/// Camera data laid out for GPU upload.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct CameraUniform {
    pub view: Mat4,
    pub projection: Mat4,
    pub view_projection: Mat4,
    pub position: Vec4,
}

/// Directional shadow camera matrices derived from the sun and the view.
#[derive(Resource, Debug, Clone, Copy, PartialEq)]
pub struct ShadowMatrices {
    pub view: Mat4,
    pub projection: Mat4,
    pub view_projection: Mat4,
    pub frame: u64,
}

impl Default for ShadowMatrices {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            view_projection: Mat4::IDENTITY,
            frame: 0,
        }
    }
}

impl ShadowMatrices {
    /// Orthographic shadow volume centred on `focus`, looking along
    /// `light_direction` (the direction light travels).
    pub fn compute(focus: Vec3, light_direction: Vec3, extent: f32, distance: f32) -> Self {
        let direction = light_direction.normalize_or_zero();
        let direction = if direction == Vec3::ZERO { Vec3::NEG_Y } else { direction };
        let up = if direction.cross(Vec3::Y).length_squared() < 1e-6 {
            Vec3::Z
        } else {
            Vec3::Y
        };
        let eye = focus - direction * distance;
        let view = Mat4::look_to_rh(eye, direction, up);
        let projection = Mat4::orthographic_rh(-extent, extent, -extent, extent, 0.1, distance * 2.0);
        Self {
            view,
            projection,
            view_projection: projection * view,
            frame: 0,
        }
    }
}

/// Free-fly camera controller (FPS-style)
///
/// - Movement keys: move along the view axes
/// - Mouse: look around while look is active
/// - Scroll: adjust movement speed
/// - Sprint: speed multiplier
#[derive(Component, Debug, Clone, PartialEq)]
pub struct FreeFlyCamera {
    /// Horizontal rotation in radians
    pub yaw: f32,
    /// Vertical rotation in radians
    pub pitch: f32,
    /// Base movement speed in units per second
    pub move_speed: f32,
    pub min_speed: f32,
    pub max_speed: f32,
    /// Radians per pixel of mouse motion
    pub mouse_sensitivity: f32,
    pub sprint_multiplier: f32,
    /// Speed factor per scroll unit
    pub scroll_speed_factor: f32,
}

impl Default for FreeFlyCamera {
    fn default() -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.0,
            move_speed: 5.0,
            min_speed: 0.5,
            max_speed: 50.0,
            mouse_sensitivity: 0.003,
            sprint_multiplier: 2.0,
            scroll_speed_factor: 1.2,
        }
    }
}

impl FreeFlyCamera {
    #[must_use]
    pub fn with_speed(mut self, speed: f32) -> Self {
        self.move_speed = speed;
        self
    }

    /// Initialize yaw/pitch from an existing rotation.
    pub fn sync_with_rotation(&mut self, rotation: Quat) {
        let (yaw, pitch, _) = rotation.to_euler(EulerRot::YXZ);
        self.yaw = yaw;
        self.pitch = pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    #[inline]
    pub fn rotation(&self) -> Quat {
        Quat::from_euler(EulerRot::YXZ, self.yaw, self.pitch, 0.0)
    }

    /// Applies one frame of input; returns the new position and rotation.
    pub fn update(&mut self, input: &InputState, position: Vec3, dt: f32) -> (Vec3, Quat) {
        if input.scroll_delta > 0.0 {
            self.move_speed *= self.scroll_speed_factor;
        } else if input.scroll_delta < 0.0 {
            self.move_speed /= self.scroll_speed_factor;
        }
        self.move_speed = self.move_speed.clamp(self.min_speed, self.max_speed);

        if input.look_active {
            self.yaw -= input.mouse_delta.x * self.mouse_sensitivity;
            self.pitch = (self.pitch - input.mouse_delta.y * self.mouse_sensitivity)
                .clamp(-PITCH_LIMIT, PITCH_LIMIT);
        }

        let rotation = self.rotation();
        let axes = input.movement_axes();
        let direction = rotation * Vec3::X * axes.x + Vec3::Y * axes.y + rotation * Vec3::NEG_Z * axes.z;
        let mut speed = self.move_speed;
        if input.is_pressed(Key::Sprint) {
            speed *= self.sprint_multiplier;
        }

        (position + direction.normalize_or_zero() * speed * dt, rotation)
    }
}

/// Orbit camera controller: rotates around a target entity or point.
#[derive(Component, Debug, Clone, PartialEq)]
pub struct OrbitCamera {
    /// Entity to orbit; `None` orbits `offset` in world space
    pub target: Option<Entity>,
    /// Added to the target position
    pub offset: Vec3,
    pub distance: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub yaw: f32,
    pub pitch: f32,
    pub mouse_sensitivity: f32,
    /// Distance factor per scroll unit
    pub zoom_factor: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            target: None,
            offset: Vec3::ZERO,
            distance: 10.0,
            min_distance: 1.0,
            max_distance: 100.0,
            yaw: 0.0,
            pitch: -0.3,
            mouse_sensitivity: 0.005,
            zoom_factor: 1.1,
        }
    }
}

impl OrbitCamera {
    pub fn following(target: Entity) -> Self {
        Self {
            target: Some(target),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_distance(mut self, distance: f32) -> Self {
        self.distance = distance;
        self
    }

    #[must_use]
    pub fn with_offset(mut self, offset: Vec3) -> Self {
        self.offset = offset;
        self
    }

    /// Applies one frame of input around `target`; returns the camera
    /// position and rotation.
    pub fn update(&mut self, input: &InputState, target: Vec3) -> (Vec3, Quat) {
        if input.scroll_delta != 0.0 {
            self.distance /= self.zoom_factor.powf(input.scroll_delta);
        }
        self.distance = self.distance.clamp(self.min_distance, self.max_distance);

        if input.look_active {
            self.yaw -= input.mouse_delta.x * self.mouse_sensitivity;
            self.pitch = (self.pitch - input.mouse_delta.y * self.mouse_sensitivity)
                .clamp(-PITCH_LIMIT, PITCH_LIMIT);
        }

        let rotation = Quat::from_euler(EulerRot::YXZ, self.yaw, self.pitch, 0.0);
        let focus = target + self.offset;
        (focus + rotation * Vec3::Z * self.distance, rotation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    #[test]
    fn view_matrix_inverts_camera_placement() {
        let world = Mat4::from_translation(Vec3::new(0.0, 2.0, 5.0));
        let m = CameraMatrices::compute(world, &CameraProjection::default(), 1.0);
        let origin_in_view = m.view.transform_point3(Vec3::new(0.0, 2.0, 5.0));
        assert!(origin_in_view.length() < 1e-5);
        assert_eq!(m.position, Vec3::new(0.0, 2.0, 5.0));
    }

    #[test]
    fn free_fly_moves_forward() {
        let mut controller = FreeFlyCamera::default().with_speed(2.0);
        let mut input = InputState::new();
        input.press(Key::Forward);

        let (position, _) = controller.update(&input, Vec3::ZERO, 0.5);
        assert!((position - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-5);
    }

    #[test]
    fn free_fly_ignores_mouse_without_look() {
        let mut controller = FreeFlyCamera::default();
        let mut input = InputState::new();
        input.move_mouse(Vec2::new(100.0, 50.0));

        controller.update(&input, Vec3::ZERO, 0.016);
        assert_eq!(controller.yaw, 0.0);

        input.set_look_active(true);
        controller.update(&input, Vec3::ZERO, 0.016);
        assert!(controller.yaw < 0.0);
        assert!(controller.pitch >= -PITCH_LIMIT);
    }

    #[test]
    fn orbit_faces_target() {
        let mut orbit = OrbitCamera::default().with_distance(4.0);
        orbit.pitch = 0.0;
        let target = Vec3::new(1.0, 0.0, 0.0);

        let (position, rotation) = orbit.update(&InputState::new(), target);
        assert!((position - Vec3::new(1.0, 0.0, 4.0)).length() < 1e-5);
        let forward = rotation * Vec3::NEG_Z;
        assert!((forward - (target - position).normalize()).length() < 1e-5);
    }

    #[test]
    fn shadow_volume_contains_focus() {
        let shadow = ShadowMatrices::compute(Vec3::ZERO, Vec3::new(0.3, -1.0, 0.2), 10.0, 20.0);
        let clip = shadow.view_projection.project_point3(Vec3::ZERO);
        assert!(clip.x.abs() <= 1.0 && clip.y.abs() <= 1.0);
        assert!((0.0..=1.0).contains(&clip.z));
    }
}
