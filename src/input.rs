//! Input state fed by the platform layer and read by controller stages.

use std::collections::HashSet;

use bevy_ecs::prelude::Resource;
use glam::{Vec2, Vec3};

/// Keys the built-in controllers react to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Forward,
    Backward,
    Left,
    Right,
    Up,
    Down,
    Sprint,
    Jump,
}

/// Keyboard and mouse state for the current frame
#[derive(Resource, Debug, Clone, Default)]
pub struct InputState {
    pressed: HashSet<Key>,
    /// Keys that went down this frame
    just_pressed: HashSet<Key>,
    /// Cursor position in window pixels
    pub mouse_position: Vec2,
    /// Mouse delta since last frame (in pixels)
    pub mouse_delta: Vec2,
    /// Scroll delta since last frame (positive = scroll up)
    pub scroll_delta: f32,
    /// Whether mouse look is active (e.g., right mouse button held)
    pub look_active: bool,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&mut self, key: Key) {
        if self.pressed.insert(key) {
            self.just_pressed.insert(key);
        }
    }

    pub fn release(&mut self, key: Key) {
        self.pressed.remove(&key);
    }

    /// Records a cursor move; the delta accumulates until [`end_frame`](Self::end_frame).
    pub fn move_mouse(&mut self, position: Vec2) {
        self.mouse_delta += position - self.mouse_position;
        self.mouse_position = position;
    }

    /// Adds a raw relative motion, for platforms that report deltas only.
    pub fn move_mouse_relative(&mut self, delta: Vec2) {
        self.mouse_delta += delta;
    }

    pub fn scroll(&mut self, delta: f32) {
        self.scroll_delta += delta;
    }

    pub fn set_look_active(&mut self, active: bool) {
        self.look_active = active;
    }

    #[inline]
    pub fn is_pressed(&self, key: Key) -> bool {
        self.pressed.contains(&key)
    }

    #[inline]
    pub fn just_pressed(&self, key: Key) -> bool {
        self.just_pressed.contains(&key)
    }

    /// Movement axes from the held keys: x = right, y = up, z = forward.
    pub fn movement_axes(&self) -> Vec3 {
        let axis = |positive, negative| {
            (self.is_pressed(positive) as i32 - self.is_pressed(negative) as i32) as f32
        };
        Vec3::new(
            axis(Key::Right, Key::Left),
            axis(Key::Up, Key::Down),
            axis(Key::Forward, Key::Backward),
        )
    }

    /// Reset per-frame deltas (call after update)
    pub fn end_frame(&mut self) {
        self.mouse_delta = Vec2::ZERO;
        self.scroll_delta = 0.0;
        self.just_pressed.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deltas_accumulate_until_end_frame() {
        let mut input = InputState::new();
        input.move_mouse(Vec2::new(10.0, 0.0));
        input.move_mouse(Vec2::new(15.0, 5.0));
        input.scroll(1.0);
        input.scroll(0.5);

        assert_eq!(input.mouse_delta, Vec2::new(15.0, 5.0));
        assert_eq!(input.scroll_delta, 1.5);

        input.end_frame();
        assert_eq!(input.mouse_delta, Vec2::ZERO);
        assert_eq!(input.scroll_delta, 0.0);
        assert_eq!(input.mouse_position, Vec2::new(15.0, 5.0));
    }

    #[test]
    fn held_keys_survive_end_frame() {
        let mut input = InputState::new();
        input.press(Key::Forward);
        input.press(Key::Left);
        assert!(input.just_pressed(Key::Forward));
        assert_eq!(input.movement_axes(), Vec3::new(-1.0, 0.0, 1.0));

        input.end_frame();
        assert!(input.is_pressed(Key::Forward));
        assert!(!input.just_pressed(Key::Forward));

        input.release(Key::Forward);
        assert_eq!(input.movement_axes(), Vec3::new(-1.0, 0.0, 0.0));
    }
}
