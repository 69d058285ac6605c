use bevy_ecs::prelude::Resource;
use bevy_ecs::world::World;

use super::stages::*;
use super::FrameSchedule;
use crate::components::{ActiveCamera, CameraMatrices, DayNight, NetworkInbox, ShadowMatrices};
use crate::config::FrameConfig;
use crate::debug_draw::DebugDraw;
use crate::error::ScheduleError;
use crate::input::InputState;
use crate::physics::PhysicsWorld;
use crate::scene::{TransformSystem2D, TransformSystem3D};
use crate::scripting::Scripts;

/// Number of the frame being run. The first frame is 1.
#[derive(Resource, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameCount(pub u64);

/// Per-frame timing and bookkeeping counters.
#[derive(Resource, Debug, Clone, PartialEq, Default)]
pub struct EngineStats {
    /// Current frame number.
    pub frame: u64,
    /// Delta time of the current frame in seconds.
    pub delta: f32,
    /// Smoothed frames per second.
    pub fps: f32,
    /// Time since the first frame in seconds.
    pub elapsed: f32,
    /// Dirty notifications drained by the last finalize.
    pub dirty_notifications: usize,
    /// Total physics steps taken.
    pub physics_steps: u64,
}

impl EngineStats {
    fn begin_frame(&mut self, frame: u64, dt: f32) {
        self.frame = frame;
        self.delta = dt;
        self.elapsed += dt;
        if dt > 0.0 {
            let instant = 1.0 / dt;
            self.fps = if self.fps == 0.0 {
                instant
            } else {
                self.fps * 0.9 + instant * 0.1
            };
        }
    }
}

/// Drives one frame of the engine through a fixed, validated stage order.
///
/// # Example
///
/// ```ignore
/// let mut scheduler = FrameScheduler::standard(FrameConfig::default())?;
/// let mut world = World::new();
/// scheduler.init(&mut world);
/// loop {
///     scheduler.update(&mut world, 1.0 / 60.0);
/// }
/// ```
pub struct FrameScheduler {
    schedule: FrameSchedule,
    config: FrameConfig,
    initialized: bool,
}

impl FrameScheduler {
    /// Scheduler running the built-in stages.
    pub fn standard(config: FrameConfig) -> Result<Self, ScheduleError> {
        let mut schedule = FrameSchedule::new();
        schedule.add(AdvanceDayNight)?;
        schedule.add(PumpConnection)?;
        schedule.add(CollectDebugDraw)?;
        schedule.add(MoveCharacters)?.after::<PumpConnection>();
        schedule
            .add(InterpolateRemoteEntities {
                config: config.network.clone(),
            })?
            .after::<PumpConnection>();
        schedule.add(UpdateCameraControllers)?.after::<MoveCharacters>();
        schedule
            .add(ComputeCameraMatrices {
                config: config.camera.clone(),
            })?
            .after::<UpdateCameraControllers>();
        schedule
            .add(ComputeShadowMatrices {
                config: config.shadow.clone(),
            })?
            .after::<ComputeCameraMatrices>()
            .after::<AdvanceDayNight>();
        schedule.add(FollowCamera)?.after::<ComputeCameraMatrices>();
        schedule.add(UpdateAreaLights)?.after::<FollowCamera>();
        schedule
            .add(FinalizeTransforms)?
            .after::<InterpolateRemoteEntities>()
            .after::<FollowCamera>()
            .after::<UpdateAreaLights>();
        schedule.add(RecomputeBounds)?.after::<FinalizeTransforms>();
        schedule.add(StepPhysics)?.after::<RecomputeBounds>();
        schedule.add(RunScripts)?.after::<StepPhysics>();
        schedule.build()?;

        Ok(Self::from_schedule(schedule, config))
    }

    /// Scheduler running a custom schedule. The schedule must be built.
    pub fn from_schedule(schedule: FrameSchedule, config: FrameConfig) -> Self {
        Self {
            schedule,
            config,
            initialized: false,
        }
    }

    pub fn schedule(&self) -> &FrameSchedule {
        &self.schedule
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    /// Installs the transform systems and physics, and inserts every singleton
    /// the stages use that the world does not have yet.
    ///
    /// Called by the first [`update`](Self::update) if not called before.
    pub fn init(&mut self, world: &mut World) {
        if self.initialized {
            return;
        }

        TransformSystem3D::install(world);
        TransformSystem2D::install(world);
        PhysicsWorld::install(world, PhysicsWorld::new(&self.config.physics));

        world.init_resource::<FrameCount>();
        world.init_resource::<EngineStats>();
        world.init_resource::<InputState>();
        world.init_resource::<ActiveCamera>();
        world.init_resource::<CameraMatrices>();
        world.init_resource::<ShadowMatrices>();
        world.init_resource::<NetworkInbox>();
        world.init_resource::<Scripts>();
        if !world.contains_resource::<DayNight>() {
            world.insert_resource(DayNight::from_config(&self.config.day_night));
        }
        if !world.contains_resource::<DebugDraw>() {
            world.insert_resource(DebugDraw::new(self.config.draw_bounds));
        }

        self.schedule.init(world);
        self.initialized = true;
        log::info!("Frame scheduler initialized with {} stages", self.schedule.len());
    }

    /// Runs one frame.
    pub fn update(&mut self, world: &mut World, dt: f32) {
        self.init(world);

        let frame = {
            let mut count = world.resource_mut::<FrameCount>();
            count.0 += 1;
            count.0
        };
        if let Some(mut stats) = world.get_resource_mut::<EngineStats>() {
            stats.begin_frame(frame, dt);
        }

        self.schedule.run(world, dt);

        if let Some(mut input) = world.get_resource_mut::<InputState>() {
            input.end_frame();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Key;

    #[test]
    fn standard_stage_order() {
        let scheduler = FrameScheduler::standard(FrameConfig::default()).unwrap();
        assert_eq!(
            scheduler.schedule().stage_names(),
            vec![
                "AdvanceDayNight",
                "PumpConnection",
                "CollectDebugDraw",
                "MoveCharacters",
                "InterpolateRemoteEntities",
                "UpdateCameraControllers",
                "ComputeCameraMatrices",
                "ComputeShadowMatrices",
                "FollowCamera",
                "UpdateAreaLights",
                "FinalizeTransforms",
                "RecomputeBounds",
                "StepPhysics",
                "RunScripts",
            ]
        );
    }

    #[test]
    fn init_inserts_singletons_once() {
        let mut scheduler = FrameScheduler::standard(FrameConfig::default()).unwrap();
        let mut world = World::new();
        world.insert_resource(FrameCount(41));

        scheduler.init(&mut world);
        scheduler.init(&mut world);
        assert!(world.contains_resource::<TransformSystem3D>());
        assert!(world.contains_resource::<TransformSystem2D>());
        assert!(world.contains_resource::<PhysicsWorld>());
        assert!(world.contains_resource::<DayNight>());
        assert_eq!(world.resource::<FrameCount>().0, 41);
    }

    #[test]
    fn update_counts_frames_and_time() {
        let mut scheduler = FrameScheduler::standard(FrameConfig::default()).unwrap();
        let mut world = World::new();

        scheduler.update(&mut world, 0.5);
        scheduler.update(&mut world, 0.25);

        assert_eq!(world.resource::<FrameCount>().0, 2);
        let stats = world.resource::<EngineStats>();
        assert_eq!(stats.frame, 2);
        assert_eq!(stats.delta, 0.25);
        assert!((stats.elapsed - 0.75).abs() < 1e-6);
        assert!((stats.fps - 2.2).abs() < 1e-4);
    }

    #[test]
    fn per_frame_input_is_reset_after_update() {
        let mut scheduler = FrameScheduler::standard(FrameConfig::default()).unwrap();
        let mut world = World::new();
        scheduler.init(&mut world);

        world.resource_mut::<InputState>().press(Key::Jump);
        assert!(world.resource::<InputState>().just_pressed(Key::Jump));
        scheduler.update(&mut world, 0.016);

        let input = world.resource::<InputState>();
        assert!(input.is_pressed(Key::Jump));
        assert!(!input.just_pressed(Key::Jump));
    }
}
