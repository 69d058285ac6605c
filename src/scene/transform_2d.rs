//! 2D transform component used by UI and sprite entities.

use bevy_ecs::component::Component;
use glam::{EulerRot, Mat4, Quat, Vec2, Vec3};

use super::{NodeKey, Spatial};

/// Local transform of an entity on a 2D canvas.
///
/// Besides position, rotation and scale, a 2D transform has a `size` and
/// two normalised points:
///
/// - `anchor`: point on the parent's rectangle that `position` is measured from,
///   `(0, 0)` is the parent's origin and `(1, 1)` its far corner.
/// - `relative_point`: pivot on this entity's own rectangle. Rotation and scale
///   happen around it and it is what the world position refers to.
///
/// Rotation is stored as a quaternion but is always about the Z axis.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct Transform2D {
    position: Vec2,
    rotation: Quat,
    scale: Vec2,
    layer: u32,
    size: Vec2,
    anchor: Vec2,
    relative_point: Vec2,
    node: Option<NodeKey>,
}

impl Default for Transform2D {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform2D {
    pub const IDENTITY: Self = Self {
        position: Vec2::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec2::ONE,
        layer: 0,
        size: Vec2::ZERO,
        anchor: Vec2::ZERO,
        relative_point: Vec2::ZERO,
        node: None,
    };

    #[inline]
    pub const fn from_xy(x: f32, y: f32) -> Self {
        Self::from_translation(Vec2::new(x, y))
    }

    #[inline]
    pub const fn from_translation(position: Vec2) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    #[inline]
    #[must_use]
    pub const fn with_translation(mut self, position: Vec2) -> Self {
        self.position = position;
        self
    }

    /// Sets rotation from an angle in radians, counter-clockwise.
    #[inline]
    #[must_use]
    pub fn with_angle(mut self, angle: f32) -> Self {
        self.rotation = Quat::from_rotation_z(angle);
        self
    }

    #[inline]
    #[must_use]
    pub const fn with_scale(mut self, scale: Vec2) -> Self {
        self.scale = scale;
        self
    }

    #[inline]
    #[must_use]
    pub const fn with_layer(mut self, layer: u32) -> Self {
        self.layer = layer;
        self
    }

    #[inline]
    #[must_use]
    pub const fn with_size(mut self, size: Vec2) -> Self {
        self.size = size;
        self
    }

    #[inline]
    #[must_use]
    pub const fn with_anchor(mut self, anchor: Vec2) -> Self {
        self.anchor = anchor;
        self
    }

    #[inline]
    #[must_use]
    pub const fn with_relative_point(mut self, relative_point: Vec2) -> Self {
        self.relative_point = relative_point;
        self
    }

    #[inline]
    pub fn translation(&self) -> Vec2 {
        self.position
    }

    #[inline]
    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    /// Rotation about Z in radians.
    pub fn angle(&self) -> f32 {
        let (_, _, z) = self.rotation.to_euler(EulerRot::XYZ);
        z
    }

    #[inline]
    pub fn scale(&self) -> Vec2 {
        self.scale
    }

    #[inline]
    pub fn layer(&self) -> u32 {
        self.layer
    }

    #[inline]
    pub fn size(&self) -> Vec2 {
        self.size
    }

    #[inline]
    pub fn anchor(&self) -> Vec2 {
        self.anchor
    }

    #[inline]
    pub fn relative_point(&self) -> Vec2 {
        self.relative_point
    }

    #[inline]
    pub fn node(&self) -> Option<NodeKey> {
        self.node
    }

    pub(crate) fn set_layer(&mut self, layer: u32) {
        self.layer = layer;
    }

    pub(crate) fn set_size(&mut self, size: Vec2) {
        self.size = size;
    }

    pub(crate) fn set_anchor(&mut self, anchor: Vec2) {
        self.anchor = anchor;
    }

    pub(crate) fn set_relative_point(&mut self, relative_point: Vec2) {
        self.relative_point = relative_point;
    }
}

impl Spatial for Transform2D {
    type Vector = Vec2;

    fn position(&self) -> Vec2 {
        self.position
    }

    fn set_position(&mut self, position: Vec2) {
        self.position = position;
    }

    fn rotation(&self) -> Quat {
        self.rotation
    }

    fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation;
    }

    fn scale(&self) -> Vec2 {
        self.scale
    }

    fn set_scale(&mut self, scale: Vec2) {
        self.scale = scale;
    }

    fn node(&self) -> Option<NodeKey> {
        self.node
    }

    fn set_node(&mut self, node: Option<NodeKey>) {
        self.node = node;
    }

    fn local_matrix(&self, parent: Option<&Self>) -> Mat4 {
        let origin = self.parent_space_origin(parent);
        Mat4::from_translation(origin + self.position.extend(0.0))
            * Mat4::from_quat(self.rotation)
            * Mat4::from_scale(self.scale.extend(1.0))
            * Mat4::from_translation(-self.pivot())
    }

    fn pivot(&self) -> Vec3 {
        (self.relative_point * self.size).extend(0.0)
    }

    fn parent_space_origin(&self, parent: Option<&Self>) -> Vec3 {
        parent
            .map(|p| (self.anchor * p.size).extend(0.0))
            .unwrap_or(Vec3::ZERO)
    }

    fn vector_to_vec3(vector: Vec2) -> Vec3 {
        vector.extend(0.0)
    }

    fn vector_from_vec3(vector: Vec3) -> Vec2 {
        vector.truncate()
    }
}

/// Axis-aligned rectangle in canvas space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Smallest rectangle containing every point.
    pub fn from_points(points: impl IntoIterator<Item = Vec2>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        Some(points.fold(Self::new(first, first), |rect, p| {
            Self::new(rect.min.min(p), rect.max.max(p))
        }))
    }

    #[inline]
    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    #[inline]
    pub fn contains(&self, point: Vec2) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }
}
