//! Frame scheduling.
//!
//! A frame is a fixed sequence of [`Stage`]s. [`FrameSchedule`] resolves their
//! declared ordering once and validates it around the single finalize stage;
//! [`FrameScheduler`] runs the built-in stages and owns frame bookkeeping.

mod schedule;
mod scheduler;
mod stages;

pub use schedule::*;
pub use scheduler::*;
pub use stages::*;
