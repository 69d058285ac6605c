//! Scripting collaborator seam.
//!
//! Script runtimes plug in as [`ScriptHost`]s and run in the terminal stage of
//! the frame, after transforms, bounds and physics have settled.

use bevy_ecs::change_detection::Mut;
use bevy_ecs::prelude::Resource;
use bevy_ecs::world::World;

/// A script runtime driven once per frame.
pub trait ScriptHost: Send + Sync {
    fn name(&self) -> &str;

    /// Called once per frame with exclusive world access.
    fn update(&mut self, world: &mut World, dt: f32);
}

/// Script host backed by a closure.
pub struct FnScript<F> {
    name: String,
    run: F,
}

impl<F> FnScript<F>
where
    F: FnMut(&mut World, f32) + Send + Sync,
{
    pub fn new(name: impl Into<String>, run: F) -> Self {
        Self {
            name: name.into(),
            run,
        }
    }
}

impl<F> ScriptHost for FnScript<F>
where
    F: FnMut(&mut World, f32) + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn update(&mut self, world: &mut World, dt: f32) {
        (self.run)(world, dt);
    }
}

/// Registered script hosts, updated in registration order.
#[derive(Resource, Default)]
pub struct Scripts {
    hosts: Vec<Box<dyn ScriptHost>>,
}

impl Scripts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, host: impl ScriptHost + 'static) {
        log::debug!("Registered script host '{}'", host.name());
        self.hosts.push(Box::new(host));
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Updates every host. Does nothing if the resource is absent.
    pub fn run(world: &mut World, dt: f32) {
        if !world.contains_resource::<Scripts>() {
            return;
        }
        world.resource_scope(|world, mut scripts: Mut<Scripts>| {
            for host in &mut scripts.hosts {
                host.update(world, dt);
            }
        });
    }
}

impl std::fmt::Debug for Scripts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.hosts.iter().map(|h| h.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Resource, Default)]
    struct Counter(u32);

    #[test]
    fn hosts_run_in_order_with_world_access() {
        let mut world = World::new();
        world.init_resource::<Counter>();

        let mut scripts = Scripts::new();
        scripts.add(FnScript::new("double", |world: &mut World, _| {
            world.resource_mut::<Counter>().0 *= 2;
        }));
        scripts.add(FnScript::new("increment", |world: &mut World, _| {
            world.resource_mut::<Counter>().0 += 1;
        }));
        world.insert_resource(scripts);

        world.resource_mut::<Counter>().0 = 3;
        Scripts::run(&mut world, 0.016);
        assert_eq!(world.resource::<Counter>().0, 7);
    }
}
