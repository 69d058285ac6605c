//! Frame configuration.

use glam::Vec3;

/// Configuration for the fixed-timestep physics stage
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicsConfig {
    /// Simulation step in seconds
    pub fixed_step: f32,
    /// Largest real frame time fed into the accumulator, in seconds
    pub max_frame_delta: f32,
    /// Collision substeps per simulation step
    pub substeps: u32,
    /// Gravity acceleration
    pub gravity: Vec3,
    /// Height of the ground plane, `None` for no ground
    pub ground_height: Option<f32>,
    /// Maximum number of bodies, `None` for unlimited
    pub max_bodies: Option<usize>,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            fixed_step: 1.0 / 60.0,
            max_frame_delta: 0.25,
            substeps: 1,
            gravity: Vec3::new(0.0, -9.81, 0.0),
            ground_height: Some(0.0),
            max_bodies: None,
        }
    }
}

/// Configuration for the day/night cycle
#[derive(Debug, Clone, PartialEq)]
pub struct DayNightConfig {
    /// Length of a full day in seconds
    pub day_length: f32,
    /// Time of day at startup, 0..1 with 0.5 = noon
    pub start_time: f32,
    /// Whether time advances
    pub enabled: bool,
}

impl Default for DayNightConfig {
    fn default() -> Self {
        Self {
            day_length: 600.0,
            start_time: 0.35,
            enabled: true,
        }
    }
}

/// Configuration for directional shadow matrices
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowConfig {
    /// Half extent of the orthographic shadow volume
    pub extent: f32,
    /// Distance of the shadow camera from the view target along the sun direction
    pub distance: f32,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            extent: 40.0,
            distance: 80.0,
        }
    }
}

/// Configuration for remote entity interpolation
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkConfig {
    /// Fraction of the remaining distance covered per second, 0..
    pub interpolation_rate: f32,
    /// Distance beyond which remote entities snap instead of interpolating
    pub snap_distance: f32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            interpolation_rate: 12.0,
            snap_distance: 10.0,
        }
    }
}

/// Configuration for camera matrices
#[derive(Debug, Clone, PartialEq)]
pub struct CameraConfig {
    /// Viewport aspect ratio used when the camera does not override it
    pub aspect_ratio: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            aspect_ratio: 16.0 / 9.0,
        }
    }
}

/// Configuration for the standard frame schedule
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameConfig {
    pub physics: PhysicsConfig,
    pub day_night: DayNightConfig,
    pub shadow: ShadowConfig,
    pub network: NetworkConfig,
    pub camera: CameraConfig,
    /// Whether debug draw collects bounding boxes every frame
    pub draw_bounds: bool,
}

impl FrameConfig {
    pub fn with_physics(mut self, physics: PhysicsConfig) -> Self {
        self.physics = physics;
        self
    }

    pub fn with_day_night(mut self, day_night: DayNightConfig) -> Self {
        self.day_night = day_night;
        self
    }

    pub fn with_shadow(mut self, shadow: ShadowConfig) -> Self {
        self.shadow = shadow;
        self
    }

    pub fn with_network(mut self, network: NetworkConfig) -> Self {
        self.network = network;
        self
    }

    pub fn with_camera(mut self, camera: CameraConfig) -> Self {
        self.camera = camera;
        self
    }

    pub fn with_fixed_step(mut self, fixed_step: f32) -> Self {
        self.physics.fixed_step = fixed_step;
        self
    }

    pub fn with_draw_bounds(mut self, draw_bounds: bool) -> Self {
        self.draw_bounds = draw_bounds;
        self
    }
}
