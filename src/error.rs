//! Error types for hierarchy edits and schedule construction.

use bevy_ecs::entity::Entity;
use thiserror::Error;

/// Precondition failures of hierarchy operations.
///
/// Returned by the `try_*` variants on [`TransformSystem`](crate::scene::TransformSystem).
/// The plain variants log these and skip the operation instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HierarchyError {
    #[error("entity {0} has no transform component")]
    MissingTransform(Entity),
    #[error("entity {0} has no scene node")]
    MissingSceneNode(Entity),
    #[error("entity {0} cannot be parented to itself")]
    SelfParent(Entity),
    #[error("parenting {child} to {parent} would create a cycle")]
    Cycle { parent: Entity, child: Entity },
}

/// Errors produced while building a [`FrameSchedule`](crate::frame::FrameSchedule).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("stage '{0}' is already registered")]
    DuplicateStage(&'static str),
    #[error("stage '{stage}' runs after '{dependency}', which is not registered")]
    UnknownDependency {
        stage: &'static str,
        dependency: &'static str,
    },
    #[error("dependency cycle among stages: [{}]", .0.join(", "))]
    Cycle(Vec<&'static str>),
    #[error("schedule has no transform finalize stage")]
    MissingFinalize,
    #[error("schedule has more than one finalize stage: '{0}' and '{1}'")]
    DuplicateFinalize(&'static str, &'static str),
    #[error("stage '{0}' reads finalized transforms but runs before the finalize stage")]
    ReadsBeforeFinalize(&'static str),
    #[error("terminal stage '{0}' is not the last stage")]
    TerminalNotLast(&'static str),
    #[error("schedule has more than one terminal stage: '{0}' and '{1}'")]
    DuplicateTerminal(&'static str, &'static str),
}
