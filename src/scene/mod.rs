//! Transform hierarchy
//!
//! - [`Transform`] / [`Transform2D`]: per-entity local transforms.
//! - [`SceneNode`]: optional hierarchy record with a cached world matrix.
//! - [`TransformSystem`]: mutators, parenting and dirty propagation.
//! - [`DirtyQueue`]: cross-thread "transform changed" notifications.

mod dirty_queue;
mod node;
mod spatial;
mod system;
mod transform;
mod transform_2d;

pub use dirty_queue::*;
pub use node::{Children, NodeKey, SceneNode};
pub use spatial::*;
pub use system::*;
pub use transform::*;
pub use transform_2d::*;
