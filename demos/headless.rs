//! # Headless Demo
//!
//! Builds a small scene and runs the frame scheduler without a window:
//! - a rotating platform carrying a stack of child entities
//! - a character followed by an orbit camera
//! - dynamic physics boxes dropped onto the ground
//! - a remote entity fed through the network inbox
//! - a UI panel hierarchy and a script host
//!
//! ```text
//! cargo run --example headless -- --frames 240 --draw-bounds
//! ```

use clap::Parser;
use glam::{Quat, Vec2, Vec3};
use redlilium_scene::components::{
    ActiveCamera, Aabb, Camera, CameraProjection, CharacterController, LocalBounds, NetworkInbox,
    OrbitCamera, RemoteState, Skybox,
};
use redlilium_scene::input::{InputState, Key};
use redlilium_scene::physics::DynamicMesh;
use redlilium_scene::scripting::{FnScript, Scripts};
use redlilium_scene::ui::{hit_test, Interactable};
use redlilium_scene::*;

/// Headless scene runner.
#[derive(Parser, Debug)]
#[command(name = "headless", about = "Runs a scene through the frame scheduler without rendering")]
struct Args {
    /// Number of frames to run.
    #[arg(long, default_value = "120")]
    frames: u64,

    /// Frame delta time in seconds.
    #[arg(long, default_value = "0.016666")]
    dt: f32,

    /// Number of children stacked on the platform.
    #[arg(long, default_value = "8")]
    entities: usize,

    /// Collect bounding box wireframes into the debug draw buffer.
    #[arg(long)]
    draw_bounds: bool,
}

#[derive(Resource)]
struct Platform(Entity);

fn setup_scene(world: &mut World, args: &Args) {
    log::info!("Setting up scene...");

    let platform = world
        .spawn((Transform::from_xyz(0.0, 0.0, 0.0), LocalBounds(Aabb::UNIT)))
        .id();
    world.insert_resource(Platform(platform));

    TransformSystem3D::scope(world, |transforms, world| {
        let mut parent = platform;
        for i in 0..args.entities {
            let child = world
                .spawn((
                    Transform::from_xyz(0.5, 1.0, 0.0).with_rotation(Quat::from_rotation_y(0.2 * i as f32)),
                    LocalBounds(Aabb::from_center_half_extents(Vec3::ZERO, Vec3::splat(0.25))),
                ))
                .id();
            transforms.parent_entity_to(world, parent, child);
            parent = child;
        }
        log::info!("Stacked {} entities, depth {}", args.entities, transforms.hierarchy_depth(world, parent));
    });

    let character = world
        .spawn((Transform::from_xyz(4.0, 0.0, 0.0), CharacterController::default()))
        .id();
    let camera = world
        .spawn((
            Transform::IDENTITY,
            Camera::new(CameraProjection::perspective(60.0, 0.1, 500.0)),
            OrbitCamera::following(character).with_distance(8.0),
        ))
        .id();
    world.insert_resource(ActiveCamera(Some(camera)));
    world.spawn((Transform::IDENTITY, Skybox));

    for i in 0..4 {
        world.spawn((
            Transform::from_xyz(-4.0 + 2.0 * i as f32, 3.0 + i as f32, 2.0),
            DynamicMesh {
                half_extents: Vec3::splat(0.5),
            },
            LocalBounds(Aabb::UNIT),
        ));
    }

    let remote = world.spawn(Transform::IDENTITY).id();
    let sender = world.resource::<NetworkInbox>().sender();
    sender.send(RemoteState {
        entity: remote,
        tick: 1,
        position: Vec3::new(0.0, 0.0, -6.0),
        rotation: Quat::IDENTITY,
    });
    sender.send(RemoteState {
        entity: remote,
        tick: 2,
        position: Vec3::new(2.0, 0.0, -6.0),
        rotation: Quat::from_rotation_y(1.0),
    });

    let panel = world
        .spawn(Transform2D::from_xy(100.0, 100.0).with_size(Vec2::new(300.0, 200.0)))
        .id();
    let button = world
        .spawn((
            Transform2D::from_xy(10.0, 10.0)
                .with_size(Vec2::new(80.0, 30.0))
                .with_layer(1),
            Interactable,
        ))
        .id();
    TransformSystem2D::scope(world, |transforms, world| {
        transforms.parent_entity_to(world, panel, button);
    });

    let mut scripts = Scripts::new();
    scripts.add(FnScript::new("spin-platform", |world: &mut World, dt| {
        let platform = world.resource::<Platform>().0;
        TransformSystem3D::scope(world, |transforms, world| {
            if let Some(rotation) = transforms.local_rotation(world, platform) {
                transforms.set_local_rotation(world, platform, Quat::from_rotation_y(dt) * rotation);
            }
        });
    }));
    world.insert_resource(scripts);
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = FrameConfig::default().with_draw_bounds(args.draw_bounds);
    let mut scheduler = match FrameScheduler::standard(config) {
        Ok(scheduler) => scheduler,
        Err(e) => {
            log::error!("Invalid frame schedule: {e}");
            std::process::exit(1);
        }
    };
    log::info!("Stages: {}", scheduler.schedule().stage_names().join(" -> "));

    let mut world = World::new();
    scheduler.init(&mut world);
    setup_scene(&mut world, &args);

    for frame in 0..args.frames {
        {
            let mut input = world.resource_mut::<InputState>();
            if frame == args.frames / 4 {
                input.press(Key::Forward);
            } else if frame == args.frames / 2 {
                input.release(Key::Forward);
            }
        }

        scheduler.update(&mut world, args.dt);

        if frame % 60 == 0 {
            let stats = world.resource::<EngineStats>();
            log::info!(
                "Frame {}: {:.1} fps, {} dirty, {} physics steps",
                stats.frame,
                stats.fps,
                stats.dirty_notifications,
                stats.physics_steps
            );
        }
    }

    let hit = hit_test(&mut world, Vec2::new(120.0, 120.0));
    log::info!("Hit test at (120, 120): {hit:?}");
    log::info!(
        "Debug draw: {} lines",
        world.resource::<debug_draw::DebugDraw>().line_count()
    );
    let stats = world.resource::<EngineStats>();
    log::info!("Finished {} frames in {:.2}s simulated", stats.frame, stats.elapsed);
}
