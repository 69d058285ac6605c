//! Components and frame singletons read and written by the frame stages.

mod bounds;
mod camera;
mod character;
mod environment;
mod network;

pub use bounds::*;
pub use camera::*;
pub use character::*;
pub use environment::*;
pub use network::*;
