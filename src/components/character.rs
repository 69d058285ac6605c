use bevy_ecs::component::Component;
use glam::{Quat, Vec3};

use crate::input::{InputState, Key};

/// Locally controlled character moved on the XZ plane by input.
#[derive(Component, Debug, Clone, PartialEq)]
pub struct CharacterController {
    /// Units per second
    pub speed: f32,
    pub sprint_multiplier: f32,
    /// Turn the character to face its movement direction
    pub face_movement: bool,
}

impl Default for CharacterController {
    fn default() -> Self {
        Self {
            speed: 4.0,
            sprint_multiplier: 1.8,
            face_movement: true,
        }
    }
}

impl CharacterController {
    /// Displacement for one frame. `view_yaw` orients the movement axes,
    /// typically the yaw of the active camera.
    pub fn displacement(&self, input: &InputState, view_yaw: f32, dt: f32) -> Vec3 {
        let axes = input.movement_axes();
        let planar = Vec3::new(axes.x, 0.0, -axes.z);
        let direction = (Quat::from_rotation_y(view_yaw) * planar).normalize_or_zero();
        let mut speed = self.speed;
        if input.is_pressed(Key::Sprint) {
            speed *= self.sprint_multiplier;
        }
        direction * speed * dt
    }

    /// Rotation facing along `displacement`, if it is non-zero.
    pub fn facing(displacement: Vec3) -> Option<Quat> {
        let planar = Vec3::new(displacement.x, 0.0, displacement.z);
        if planar.length_squared() < 1e-12 {
            return None;
        }
        Some(Quat::from_rotation_y(f32::atan2(-planar.x, -planar.z)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_follows_view_yaw() {
        let controller = CharacterController::default();
        let mut input = InputState::new();
        input.press(Key::Forward);

        let d = controller.displacement(&input, 0.0, 0.5);
        assert!((d - Vec3::new(0.0, 0.0, -2.0)).length() < 1e-5);

        let d = controller.displacement(&input, std::f32::consts::FRAC_PI_2, 0.5);
        assert!((d - Vec3::new(-2.0, 0.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn facing_points_forward_axis_along_motion() {
        let rotation = CharacterController::facing(Vec3::new(1.0, 0.0, 0.0)).unwrap();
        assert!((rotation * Vec3::NEG_Z - Vec3::X).length() < 1e-5);
        assert!(CharacterController::facing(Vec3::Y).is_none());
    }
}
