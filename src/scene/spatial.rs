//! Dimensionality abstraction shared by the 2D and 3D transform components.

use std::fmt::Debug;
use std::ops::Add;

use bevy_ecs::component::Component;
use glam::{Mat4, Quat, Vec3};

use super::NodeKey;

/// A transform component the [`TransformSystem`](super::TransformSystem) can drive.
///
/// Implemented by [`Transform`](super::Transform) and
/// [`Transform2D`](super::Transform2D). The hierarchy, dirty propagation and
/// world/local conversions are written once against this trait.
pub trait Spatial: Component + Sized {
    /// Position and scale vector type (`Vec3` or `Vec2`).
    type Vector: Copy + PartialEq + Debug + Add<Output = Self::Vector> + Send + Sync + 'static;

    fn position(&self) -> Self::Vector;
    fn set_position(&mut self, position: Self::Vector);

    fn rotation(&self) -> Quat;
    fn set_rotation(&mut self, rotation: Quat);

    fn scale(&self) -> Self::Vector;
    fn set_scale(&mut self, scale: Self::Vector);

    /// Back-reference to the scene node, if this entity has one.
    fn node(&self) -> Option<NodeKey>;
    fn set_node(&mut self, node: Option<NodeKey>);

    /// Local matrix relative to the parent's world matrix.
    ///
    /// `parent` is the parent's component, for layouts that depend on it.
    fn local_matrix(&self, parent: Option<&Self>) -> Mat4;

    /// Point in local matrix space whose world image is the world position.
    fn pivot(&self) -> Vec3 {
        Vec3::ZERO
    }

    /// Offset in parent space that `position` is measured from.
    fn parent_space_origin(&self, _parent: Option<&Self>) -> Vec3 {
        Vec3::ZERO
    }

    /// Brings the decomposed fields up to date before a field write.
    fn resolve_fields(&mut self) {}

    fn vector_to_vec3(vector: Self::Vector) -> Vec3;
    fn vector_from_vec3(vector: Vec3) -> Self::Vector;
}
