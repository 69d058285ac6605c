//! Physics collaborator: a black-box backend stepped on a fixed timestep.
//!
//! - [`PhysicsBackend`]: body-handle interface to the simulation
//! - [`BasicPhysics`]: gravity + ground plane reference backend
//! - [`PhysicsWorld`]: resource that owns the backend, creates bodies for
//!   [`StaticMesh`] / [`KinematicMesh`] / [`DynamicMesh`] and syncs poses
//!   with the transform hierarchy

mod backend;
mod timestep;
mod world;

pub use backend::*;
pub use timestep::*;
pub use world::*;
