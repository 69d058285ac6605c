//! 3D transform component.

use bevy_ecs::component::Component;
use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4, Quat, Vec3};

use super::{NodeKey, Spatial};

/// Which representation of a [`Transform`] is authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Authority {
    /// Local matrix is composed from position, rotation and scale.
    #[default]
    Fields,
    /// Local matrix was written directly; the decomposed fields are stale
    /// until the next field write decomposes it.
    Matrix(Mat4),
}

/// Local transform of an entity in 3D space, relative to its parent.
///
/// Fields are read through getters and written through the
/// [`TransformSystem`](super::TransformSystem) so that every change is
/// propagated and reported to the dirty queue.
///
/// # Example
///
/// ```
/// use redlilium_scene::scene::Transform;
/// use glam::{Quat, Vec3};
///
/// let transform = Transform::from_xyz(1.0, 2.0, 3.0)
///     .with_rotation(Quat::from_rotation_y(std::f32::consts::FRAC_PI_2))
///     .with_scale(Vec3::splat(2.0));
/// ```
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    position: Vec3,
    rotation: Quat,
    scale: Vec3,
    authority: Authority,
    node: Option<NodeKey>,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
        authority: Authority::Fields,
        node: None,
    };

    #[inline]
    pub const fn from_xyz(x: f32, y: f32, z: f32) -> Self {
        Self::from_translation(Vec3::new(x, y, z))
    }

    #[inline]
    pub const fn from_translation(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    #[inline]
    pub const fn from_rotation(rotation: Quat) -> Self {
        Self {
            rotation,
            ..Self::IDENTITY
        }
    }

    #[inline]
    pub const fn from_scale(scale: Vec3) -> Self {
        Self {
            scale,
            ..Self::IDENTITY
        }
    }

    /// Creates a transform by decomposing `matrix` into translation, rotation and scale.
    pub fn from_matrix(matrix: Mat4) -> Self {
        let (scale, rotation, position) = matrix.to_scale_rotation_translation();
        Self {
            position,
            rotation,
            scale,
            ..Self::IDENTITY
        }
    }

    #[inline]
    #[must_use]
    pub const fn with_translation(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    #[inline]
    #[must_use]
    pub const fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    #[inline]
    #[must_use]
    pub const fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Returns this transform rotated so that its forward axis points at `target`.
    #[must_use]
    pub fn looking_at(mut self, target: Vec3, up: Vec3) -> Self {
        if let Some(rotation) = look_rotation(target - self.position, up) {
            self.rotation = rotation;
        }
        self
    }

    #[inline]
    pub fn translation(&self) -> Vec3 {
        self.position
    }

    #[inline]
    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    #[inline]
    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    #[inline]
    pub fn authority(&self) -> Authority {
        self.authority
    }

    /// `true` after a direct matrix write, until a field write resolves it.
    #[inline]
    pub fn is_matrix_authoritative(&self) -> bool {
        matches!(self.authority, Authority::Matrix(_))
    }

    /// Scene node back-reference.
    #[inline]
    pub fn node(&self) -> Option<NodeKey> {
        self.node
    }

    /// Local matrix composed from the fields, ignoring any matrix override.
    #[inline]
    pub fn compute_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Local forward direction (-Z).
    #[inline]
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    #[inline]
    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::X
    }

    #[inline]
    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    pub(crate) fn set_matrix(&mut self, matrix: Mat4) -> bool {
        if self.authority == Authority::Matrix(matrix) {
            return false;
        }
        self.authority = Authority::Matrix(matrix);
        true
    }
}

impl Spatial for Transform {
    type Vector = Vec3;

    fn position(&self) -> Vec3 {
        self.position
    }

    fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    fn rotation(&self) -> Quat {
        self.rotation
    }

    fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation;
    }

    fn scale(&self) -> Vec3 {
        self.scale
    }

    fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale;
    }

    fn node(&self) -> Option<NodeKey> {
        self.node
    }

    fn set_node(&mut self, node: Option<NodeKey>) {
        self.node = node;
    }

    fn local_matrix(&self, _parent: Option<&Self>) -> Mat4 {
        match self.authority {
            Authority::Fields => self.compute_matrix(),
            Authority::Matrix(matrix) => matrix,
        }
    }

    fn resolve_fields(&mut self) {
        if let Authority::Matrix(matrix) = self.authority {
            let (scale, rotation, position) = matrix.to_scale_rotation_translation();
            self.position = position;
            self.rotation = rotation;
            self.scale = scale;
            self.authority = Authority::Fields;
        }
    }

    fn vector_to_vec3(vector: Vec3) -> Vec3 {
        vector
    }

    fn vector_from_vec3(vector: Vec3) -> Vec3 {
        vector
    }
}

/// Rotation whose forward axis (-Z) points along `direction`.
///
/// Returns `None` when `direction` is degenerate or parallel to `up`.
pub fn look_rotation(direction: Vec3, up: Vec3) -> Option<Quat> {
    let forward = direction.normalize_or_zero();
    if forward.length_squared() < 1e-6 {
        return None;
    }
    let right = forward.cross(up).normalize_or_zero();
    if right.length_squared() < 1e-6 {
        return None;
    }
    let up = right.cross(forward);
    Some(Quat::from_mat3(&Mat3::from_cols(right, up, -forward)))
}

/// Per-object transform data for GPU upload.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct TransformUniform {
    pub model: Mat4,
    pub normal_matrix: Mat4,
}

impl TransformUniform {
    pub fn from_world_matrix(model: Mat4) -> Self {
        Self {
            model,
            normal_matrix: model.inverse().transpose(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn identity_defaults() {
        let t = Transform::IDENTITY;
        assert_eq!(t.translation(), Vec3::ZERO);
        assert_eq!(t.rotation(), Quat::IDENTITY);
        assert_eq!(t.scale(), Vec3::ONE);
        assert!(t.node().is_none());
        assert!(!t.is_matrix_authoritative());
    }

    #[test]
    fn directions_follow_rotation() {
        let t = Transform::from_rotation(Quat::from_rotation_y(FRAC_PI_2));
        assert!((t.forward() - Vec3::NEG_X).length() < 1e-5);
    }

    #[test]
    fn matrix_override_wins_until_resolved() {
        let mut t = Transform::from_xyz(1.0, 0.0, 0.0);
        let m = Mat4::from_translation(Vec3::new(0.0, 4.0, 0.0));
        assert!(t.set_matrix(m));
        assert!(!t.set_matrix(m));

        assert_eq!(t.local_matrix(None), m);
        assert_eq!(t.translation(), Vec3::new(1.0, 0.0, 0.0));

        t.resolve_fields();
        assert!(!t.is_matrix_authoritative());
        assert!((t.translation() - Vec3::new(0.0, 4.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn looking_at_points_forward_at_target() {
        let t = Transform::from_xyz(0.0, 0.0, 5.0).looking_at(Vec3::ZERO, Vec3::Y);
        assert!((t.forward() - Vec3::NEG_Z).length() < 1e-5);
    }

    #[test]
    fn uniform_is_two_matrices() {
        let uniform = TransformUniform::from_world_matrix(Mat4::IDENTITY);
        assert_eq!(bytemuck::bytes_of(&uniform).len(), 128);
    }
}
