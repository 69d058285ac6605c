use std::any::TypeId;
use std::collections::{BTreeSet, HashMap};

use bevy_ecs::world::World;
use bitflags::bitflags;

use crate::error::ScheduleError;

bitflags! {
    /// How a stage touches transforms.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StageAccess: u8 {
        /// Reads world matrices as they are at the time the stage runs.
        const READ = 1;
        /// Mutates transforms through the transform systems.
        const WRITE = 1 << 1;
        /// Drains the dirty queues and stamps dirty-this-frame markers.
        const FINALIZE = 1 << 2;
        /// Relies on this frame's dirty-this-frame markers.
        const READ_FINALIZED = 1 << 3;
        /// Must run after every other stage.
        const TERMINAL = 1 << 4;
    }
}

/// One step of the frame.
pub trait Stage: Send + Sync + 'static {
    fn access(&self) -> StageAccess;

    /// Called once from [`FrameSchedule::init`], in execution order.
    fn init(&mut self, _world: &mut World) {}

    fn run(&mut self, world: &mut World, dt: f32);
}

struct StoredStage {
    stage: Box<dyn Stage>,
    type_id: TypeId,
    name: &'static str,
    access: StageAccess,
    after: Vec<(TypeId, &'static str)>,
}

/// Handle returned by [`FrameSchedule::add`] for declaring ordering.
pub struct StageRef<'a> {
    stored: &'a mut StoredStage,
}

impl StageRef<'_> {
    /// This stage runs after stage type `S`.
    pub fn after<S: Stage>(self) -> Self {
        self.stored.after.push((TypeId::of::<S>(), short_name::<S>()));
        self
    }
}

/// Stages with declared dependencies, sorted once into a fixed order.
///
/// # Example
///
/// ```ignore
/// let mut schedule = FrameSchedule::new();
/// schedule.add(MoveCharacters)?;
/// schedule.add(FinalizeTransforms)?.after::<MoveCharacters>();
/// schedule.build()?;
/// schedule.run(&mut world, dt);
/// ```
#[derive(Default)]
pub struct FrameSchedule {
    stages: Vec<StoredStage>,
    order: Vec<usize>,
    built: bool,
}

impl FrameSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a stage. Each stage type may be registered once.
    pub fn add<S: Stage>(&mut self, stage: S) -> Result<StageRef<'_>, ScheduleError> {
        let type_id = TypeId::of::<S>();
        let name = short_name::<S>();
        if self.stages.iter().any(|s| s.type_id == type_id) {
            return Err(ScheduleError::DuplicateStage(name));
        }

        self.built = false;
        let access = stage.access();
        self.stages.push(StoredStage {
            stage: Box::new(stage),
            type_id,
            name,
            access,
            after: Vec::new(),
        });
        let index = self.stages.len() - 1;
        Ok(StageRef {
            stored: &mut self.stages[index],
        })
    }

    /// Resolves dependencies into an execution order and validates it.
    ///
    /// Stages with no ordering between them run in registration order.
    pub fn build(&mut self) -> Result<(), ScheduleError> {
        let n = self.stages.len();
        let index_of: HashMap<TypeId, usize> = self
            .stages
            .iter()
            .enumerate()
            .map(|(i, s)| (s.type_id, i))
            .collect();

        // edges[i] holds stages that must run after stage i
        let mut edges: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut in_degree = vec![0usize; n];
        for (i, stage) in self.stages.iter().enumerate() {
            for &(dep_id, dep_name) in &stage.after {
                let &dep = index_of
                    .get(&dep_id)
                    .ok_or(ScheduleError::UnknownDependency {
                        stage: stage.name,
                        dependency: dep_name,
                    })?;
                edges[dep].push(i);
                in_degree[i] += 1;
            }
        }

        let mut ready: BTreeSet<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);
        while let Some(i) = ready.pop_first() {
            order.push(i);
            for &next in &edges[i] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    ready.insert(next);
                }
            }
        }

        if order.len() != n {
            let cycle = (0..n)
                .filter(|&i| in_degree[i] > 0)
                .map(|i| self.stages[i].name)
                .collect();
            return Err(ScheduleError::Cycle(cycle));
        }

        self.validate(&order)?;
        self.order = order;
        self.built = true;
        log::debug!("Frame schedule: [{}]", self.stage_names().join(" -> "));
        Ok(())
    }

    fn validate(&self, order: &[usize]) -> Result<(), ScheduleError> {
        let stage = |i: usize| &self.stages[order[i]];

        let finalizers: Vec<usize> = (0..order.len())
            .filter(|&i| stage(i).access.contains(StageAccess::FINALIZE))
            .collect();
        let finalize = match finalizers.as_slice() {
            [] => return Err(ScheduleError::MissingFinalize),
            [only] => *only,
            [a, b, ..] => return Err(ScheduleError::DuplicateFinalize(stage(*a).name, stage(*b).name)),
        };

        for i in 0..finalize {
            if stage(i).access.contains(StageAccess::READ_FINALIZED) {
                return Err(ScheduleError::ReadsBeforeFinalize(stage(i).name));
            }
        }

        let terminals: Vec<usize> = (0..order.len())
            .filter(|&i| stage(i).access.contains(StageAccess::TERMINAL))
            .collect();
        match terminals.as_slice() {
            [] => {}
            [only] if *only + 1 == order.len() => {}
            [only] => return Err(ScheduleError::TerminalNotLast(stage(*only).name)),
            [a, b, ..] => return Err(ScheduleError::DuplicateTerminal(stage(*a).name, stage(*b).name)),
        }

        for i in finalize + 1..order.len() {
            if stage(i).access.contains(StageAccess::WRITE) {
                log::debug!(
                    "Stage '{}' writes transforms after finalize; its changes are finalized next frame",
                    stage(i).name
                );
            }
        }
        Ok(())
    }

    #[inline]
    pub fn is_built(&self) -> bool {
        self.built
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stage names in execution order, or registration order before build.
    pub fn stage_names(&self) -> Vec<&'static str> {
        if self.built {
            self.order.iter().map(|&i| self.stages[i].name).collect()
        } else {
            self.stages.iter().map(|s| s.name).collect()
        }
    }

    pub fn init(&mut self, world: &mut World) {
        for &i in &self.order {
            self.stages[i].stage.init(world);
        }
    }

    /// Runs every stage once, in execution order.
    pub fn run(&mut self, world: &mut World, dt: f32) {
        if !self.built {
            log::warn!("Frame schedule run before build, skipping");
            return;
        }
        for &i in &self.order {
            self.stages[i].stage.run(world, dt);
        }
    }
}

/// Type name without its module path.
fn short_name<S: 'static>() -> &'static str {
    let full = std::any::type_name::<S>();
    full.rsplit("::").next().unwrap_or(full)
}
