//! Scene runtime - transform hierarchy and frame scheduling on Bevy ECS
//!
//! # Features
//! - 2D and 3D transform hierarchies with lock-free dirty propagation
//! - World/local space conversion for positions and rotations
//! - Deterministic per-frame stage ordering with a single transform finalize point
//! - Fixed-timestep physics with a pluggable backend
//! - Camera controllers, day/night cycle, networked entity interpolation
//! - UI hit testing, debug line drawing and script hosts

pub mod components;
pub mod config;
pub mod debug_draw;
pub mod error;
pub mod frame;
pub mod input;
pub mod physics;
pub mod scene;
pub mod scripting;
pub mod ui;

// Re-export Bevy ECS prelude for users
pub use bevy_ecs::prelude::*;

pub use config::FrameConfig;
pub use error::{HierarchyError, ScheduleError};
pub use frame::{EngineStats, FrameCount, FrameSchedule, FrameScheduler, Stage, StageAccess};
pub use scene::{DirtyFrame, DirtyQueue, Transform, Transform2D, TransformSystem2D, TransformSystem3D};
