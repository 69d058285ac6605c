//! Sun, sky and area lights.

use std::f32::consts::TAU;

use bevy_ecs::component::Component;
use bevy_ecs::prelude::Resource;
use glam::{Mat4, Vec2, Vec3};

use crate::config::DayNightConfig;

/// Time of day and the sun it implies.
#[derive(Resource, Debug, Clone, PartialEq)]
pub struct DayNight {
    /// Normalised time of day, 0..1. 0.25 is sunrise, 0.5 noon, 0.75 sunset.
    pub time: f32,
    /// Length of a full day in seconds
    pub day_length: f32,
    pub enabled: bool,
}

impl Default for DayNight {
    fn default() -> Self {
        Self::from_config(&DayNightConfig::default())
    }
}

impl DayNight {
    pub fn from_config(config: &DayNightConfig) -> Self {
        Self {
            time: config.start_time.rem_euclid(1.0),
            day_length: config.day_length,
            enabled: config.enabled,
        }
    }

    pub fn advance(&mut self, dt: f32) {
        if !self.enabled || self.day_length <= 0.0 {
            return;
        }
        self.time = (self.time + dt / self.day_length).rem_euclid(1.0);
    }

    /// Unit vector pointing from the scene towards the sun.
    pub fn sun_position(&self) -> Vec3 {
        let angle = (self.time - 0.25) * TAU;
        Vec3::new(angle.cos(), angle.sin(), 0.25).normalize()
    }

    /// Direction sunlight travels.
    #[inline]
    pub fn sun_direction(&self) -> Vec3 {
        -self.sun_position()
    }

    /// Sunlight strength, 0 at night and 1 at noon.
    pub fn sun_intensity(&self) -> f32 {
        self.sun_position().y.max(0.0)
    }

    #[inline]
    pub fn is_day(&self) -> bool {
        self.sun_position().y > 0.0
    }
}

/// Sky geometry that stays centred on the active camera.
#[derive(Component, Debug, Clone, Copy, PartialEq, Default)]
pub struct Skybox;

/// Rectangular emitter in the entity's local XY plane, centred on its origin.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct AreaLight {
    pub size: Vec2,
    pub color: Vec3,
    pub intensity: f32,
    pub two_sided: bool,
    /// World-space corners, counter-clockwise. Updated each frame.
    pub world_corners: [Vec3; 4],
}

impl Default for AreaLight {
    fn default() -> Self {
        Self::new(Vec2::ONE, Vec3::ONE, 1.0)
    }
}

impl AreaLight {
    pub fn new(size: Vec2, color: Vec3, intensity: f32) -> Self {
        Self {
            size,
            color,
            intensity,
            two_sided: false,
            world_corners: [Vec3::ZERO; 4],
        }
    }

    /// Corners of the emitter after applying `world`.
    pub fn corners(&self, world: &Mat4) -> [Vec3; 4] {
        let h = self.size * 0.5;
        [
            Vec3::new(-h.x, -h.y, 0.0),
            Vec3::new(h.x, -h.y, 0.0),
            Vec3::new(h.x, h.y, 0.0),
            Vec3::new(-h.x, h.y, 0.0),
        ]
        .map(|corner| world.transform_point3(corner))
    }
}
