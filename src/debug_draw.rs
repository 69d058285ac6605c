//! Immediate-mode debug lines, rebuilt every frame.

use bevy_ecs::prelude::Resource;
use glam::{Mat4, Vec3};

use crate::components::Aabb;

/// A debug draw vertex: position + color.
///
/// Every pair of consecutive vertices forms one line segment.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DebugVertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
}

/// Line buffer collected during the frame and handed to a renderer.
#[derive(Resource, Debug, Clone, Default)]
pub struct DebugDraw {
    vertices: Vec<DebugVertex>,
    /// Draw world bounds of every entity that has them
    pub draw_bounds: bool,
}

impl DebugDraw {
    pub const BOUNDS_COLOR: [f32; 4] = [0.0, 1.0, 0.0, 1.0];

    pub fn new(draw_bounds: bool) -> Self {
        Self {
            vertices: Vec::new(),
            draw_bounds,
        }
    }

    /// Draw a single line segment.
    pub fn line(&mut self, start: Vec3, end: Vec3, color: [f32; 4]) {
        self.vertices.push(DebugVertex {
            position: start.to_array(),
            color,
        });
        self.vertices.push(DebugVertex {
            position: end.to_array(),
            color,
        });
    }

    /// Draw an axis-aligned box (12 edges).
    pub fn aabb(&mut self, aabb: &Aabb, color: [f32; 4]) {
        self.corners(&aabb.corners(), color);
    }

    /// Draw a box transformed by `matrix`.
    pub fn oriented_box(&mut self, local: &Aabb, matrix: &Mat4, color: [f32; 4]) {
        let corners = local.corners().map(|c| matrix.transform_point3(c));
        self.corners(&corners, color);
    }

    /// Draw the three axes of `matrix`: X red, Y green, Z blue.
    pub fn axes(&mut self, matrix: &Mat4, size: f32) {
        let origin = matrix.transform_point3(Vec3::ZERO);
        self.line(origin, matrix.transform_point3(Vec3::X * size), [1.0, 0.0, 0.0, 1.0]);
        self.line(origin, matrix.transform_point3(Vec3::Y * size), [0.0, 1.0, 0.0, 1.0]);
        self.line(origin, matrix.transform_point3(Vec3::Z * size), [0.0, 0.0, 1.0, 1.0]);
    }

    /// Box edges from corners ordered bottom face first.
    fn corners(&mut self, c: &[Vec3; 8], color: [f32; 4]) {
        for i in 0..4 {
            let j = (i + 1) % 4;
            self.line(c[i], c[j], color);
            self.line(c[i + 4], c[j + 4], color);
            self.line(c[i], c[i + 4], color);
        }
    }

    pub fn vertices(&self) -> &[DebugVertex] {
        &self.vertices
    }

    pub fn line_count(&self) -> usize {
        self.vertices.len() / 2
    }

    /// Takes the collected vertices, leaving the buffer empty.
    pub fn take(&mut self) -> Vec<DebugVertex> {
        std::mem::take(&mut self.vertices)
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aabb_has_twelve_edges() {
        let mut draw = DebugDraw::default();
        draw.aabb(&Aabb::UNIT, DebugDraw::BOUNDS_COLOR);
        assert_eq!(draw.line_count(), 12);

        draw.axes(&Mat4::IDENTITY, 1.0);
        assert_eq!(draw.take().len(), 30);
        assert_eq!(draw.line_count(), 0);
    }
}
