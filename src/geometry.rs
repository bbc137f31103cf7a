use std::f32::consts::{PI, TAU};

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Primitive shapes understood by every render surface.
///
/// Dimensions follow the usual conventions: boxes and cylinders are centered
/// on the origin, planes lie in the XY plane facing +Z.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
    Box {
        width: f32,
        height: f32,
        depth: f32,
    },
    Cylinder {
        radius_top: f32,
        radius_bottom: f32,
        height: f32,
        segments: u32,
    },
    Sphere {
        radius: f32,
        width_segments: u32,
        height_segments: u32,
    },
    Plane {
        width: f32,
        height: f32,
    },
}

impl Geometry {
    pub fn cuboid(width: f32, height: f32, depth: f32) -> Self {
        Self::Box {
            width,
            height,
            depth,
        }
    }

    pub fn cylinder(radius_top: f32, radius_bottom: f32, height: f32, segments: u32) -> Self {
        Self::Cylinder {
            radius_top,
            radius_bottom,
            height,
            segments,
        }
    }

    pub fn sphere(radius: f32, width_segments: u32, height_segments: u32) -> Self {
        Self::Sphere {
            radius,
            width_segments,
            height_segments,
        }
    }

    pub fn plane(width: f32, height: f32) -> Self {
        Self::Plane { width, height }
    }

    /// Stable key used by surfaces to cache tessellated buffers.
    pub fn cache_key(&self) -> String {
        format!("{self:?}")
    }

    /// Axis-aligned extents of the untransformed shape.
    pub fn extents(&self) -> Vec3 {
        match *self {
            Self::Box {
                width,
                height,
                depth,
            } => Vec3::new(width, height, depth),
            Self::Cylinder {
                radius_top,
                radius_bottom,
                height,
                ..
            } => {
                let r = radius_top.max(radius_bottom);
                Vec3::new(2.0 * r, height, 2.0 * r)
            }
            Self::Sphere { radius, .. } => Vec3::splat(2.0 * radius),
            Self::Plane { width, height } => Vec3::new(width, height, 0.0),
        }
    }

    /// Builds interleaved `position.xyz, normal.xyz` vertices and triangle indices.
    pub fn tessellate(&self) -> MeshData {
        match *self {
            Self::Box {
                width,
                height,
                depth,
            } => cuboid(Vec3::new(width, height, depth) * 0.5),
            Self::Cylinder {
                radius_top,
                radius_bottom,
                height,
                segments,
            } => cylinder(radius_top, radius_bottom, height, segments.max(3)),
            Self::Sphere {
                radius,
                width_segments,
                height_segments,
            } => sphere(radius, width_segments.max(3), height_segments.max(2)),
            Self::Plane { width, height } => plane(width * 0.5, height * 0.5),
        }
    }
}

/// CPU-side mesh data ready for upload.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MeshData {
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub const STRIDE: usize = 6;

    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / Self::STRIDE
    }

    pub fn position(&self, index: u32) -> Vec3 {
        let base = index as usize * Self::STRIDE;
        Vec3::from_slice(&self.vertices[base..base + 3])
    }

    pub fn normal(&self, index: u32) -> Vec3 {
        let base = index as usize * Self::STRIDE + 3;
        Vec3::from_slice(&self.vertices[base..base + 3])
    }

    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.indices
            .chunks_exact(3)
            .map(|tri| [tri[0], tri[1], tri[2]])
    }

    fn push_vertex(&mut self, position: Vec3, normal: Vec3) -> u32 {
        let index = self.vertex_count() as u32;
        self.vertices.extend_from_slice(&[
            position.x, position.y, position.z, normal.x, normal.y, normal.z,
        ]);
        index
    }

    fn push_quad(&mut self, corners: [Vec3; 4], normal: Vec3) {
        let a = self.push_vertex(corners[0], normal);
        let b = self.push_vertex(corners[1], normal);
        let c = self.push_vertex(corners[2], normal);
        let d = self.push_vertex(corners[3], normal);
        self.indices.extend_from_slice(&[a, b, c, a, c, d]);
    }
}

fn cuboid(half: Vec3) -> MeshData {
    let mut mesh = MeshData::default();
    let (x, y, z) = (half.x, half.y, half.z);
    // counter-clockwise seen from outside
    mesh.push_quad(
        [
            Vec3::new(-x, -y, z),
            Vec3::new(x, -y, z),
            Vec3::new(x, y, z),
            Vec3::new(-x, y, z),
        ],
        Vec3::Z,
    );
    mesh.push_quad(
        [
            Vec3::new(x, -y, -z),
            Vec3::new(-x, -y, -z),
            Vec3::new(-x, y, -z),
            Vec3::new(x, y, -z),
        ],
        Vec3::NEG_Z,
    );
    mesh.push_quad(
        [
            Vec3::new(-x, -y, -z),
            Vec3::new(-x, -y, z),
            Vec3::new(-x, y, z),
            Vec3::new(-x, y, -z),
        ],
        Vec3::NEG_X,
    );
    mesh.push_quad(
        [
            Vec3::new(x, -y, z),
            Vec3::new(x, -y, -z),
            Vec3::new(x, y, -z),
            Vec3::new(x, y, z),
        ],
        Vec3::X,
    );
    mesh.push_quad(
        [
            Vec3::new(-x, y, z),
            Vec3::new(x, y, z),
            Vec3::new(x, y, -z),
            Vec3::new(-x, y, -z),
        ],
        Vec3::Y,
    );
    mesh.push_quad(
        [
            Vec3::new(-x, -y, -z),
            Vec3::new(x, -y, -z),
            Vec3::new(x, -y, z),
            Vec3::new(-x, -y, z),
        ],
        Vec3::NEG_Y,
    );
    mesh
}

fn cylinder(radius_top: f32, radius_bottom: f32, height: f32, segments: u32) -> MeshData {
    let mut mesh = MeshData::default();
    let half = height * 0.5;
    let slope = if height > 0.0 {
        (radius_bottom - radius_top) / height
    } else {
        0.0
    };

    for i in 0..=segments {
        let theta = i as f32 / segments as f32 * TAU;
        let (sin, cos) = theta.sin_cos();
        let normal = Vec3::new(sin, slope, cos).normalize();
        mesh.push_vertex(Vec3::new(radius_top * sin, half, radius_top * cos), normal);
        mesh.push_vertex(
            Vec3::new(radius_bottom * sin, -half, radius_bottom * cos),
            normal,
        );
    }
    for i in 0..segments {
        let top = i * 2;
        let bottom = top + 1;
        let next_top = top + 2;
        let next_bottom = top + 3;
        mesh.indices
            .extend_from_slice(&[top, bottom, next_bottom, top, next_bottom, next_top]);
    }

    cap(&mut mesh, radius_top, half, segments, Vec3::Y);
    cap(&mut mesh, radius_bottom, -half, segments, Vec3::NEG_Y);
    mesh
}

fn cap(mesh: &mut MeshData, radius: f32, y: f32, segments: u32, normal: Vec3) {
    if radius <= 0.0 {
        return;
    }
    let center = mesh.push_vertex(Vec3::new(0.0, y, 0.0), normal);
    let first = mesh.vertex_count() as u32;
    for i in 0..=segments {
        let theta = i as f32 / segments as f32 * TAU;
        let (sin, cos) = theta.sin_cos();
        mesh.push_vertex(Vec3::new(radius * sin, y, radius * cos), normal);
    }
    for i in 0..segments {
        let a = first + i;
        let b = a + 1;
        if normal.y > 0.0 {
            mesh.indices.extend_from_slice(&[center, a, b]);
        } else {
            mesh.indices.extend_from_slice(&[center, b, a]);
        }
    }
}

fn sphere(radius: f32, width_segments: u32, height_segments: u32) -> MeshData {
    let mut mesh = MeshData::default();
    let columns = width_segments + 1;

    for row in 0..=height_segments {
        let v = row as f32 / height_segments as f32;
        let phi = v * PI;
        for column in 0..=width_segments {
            let u = column as f32 / width_segments as f32;
            let theta = u * TAU;
            let normal = Vec3::new(
                -theta.cos() * phi.sin(),
                phi.cos(),
                theta.sin() * phi.sin(),
            );
            mesh.push_vertex(normal * radius, normal);
        }
    }

    for row in 0..height_segments {
        for column in 0..width_segments {
            let a = row * columns + column + 1;
            let b = row * columns + column;
            let c = (row + 1) * columns + column;
            let d = (row + 1) * columns + column + 1;
            if row != 0 {
                mesh.indices.extend_from_slice(&[a, b, d]);
            }
            if row != height_segments - 1 {
                mesh.indices.extend_from_slice(&[b, c, d]);
            }
        }
    }
    mesh
}

fn plane(half_width: f32, half_height: f32) -> MeshData {
    let mut mesh = MeshData::default();
    mesh.push_quad(
        [
            Vec3::new(-half_width, -half_height, 0.0),
            Vec3::new(half_width, -half_height, 0.0),
            Vec3::new(half_width, half_height, 0.0),
            Vec3::new(-half_width, half_height, 0.0),
        ],
        Vec3::Z,
    );
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_outward(mesh: &MeshData) {
        for [a, b, c] in mesh.triangles() {
            let (p0, p1, p2) = (mesh.position(a), mesh.position(b), mesh.position(c));
            let face = (p1 - p0).cross(p2 - p0);
            if face.length_squared() <= f32::EPSILON {
                continue;
            }
            let normal = mesh.normal(a) + mesh.normal(b) + mesh.normal(c);
            assert!(face.dot(normal) > 0.0, "triangle {a},{b},{c} winds inward");
        }
    }

    #[test]
    fn box_has_six_faces() {
        let mesh = Geometry::cuboid(2.0, 4.0, 6.0).tessellate();
        assert_eq!(mesh.vertex_count(), 24);
        assert_eq!(mesh.indices.len(), 36);
        let max = (0..24).map(|i| mesh.position(i)).fold(Vec3::ZERO, Vec3::max);
        assert_eq!(max, Vec3::new(1.0, 2.0, 3.0));
        assert_outward(&mesh);
    }

    #[test]
    fn tapered_cylinder_normals_are_unit_length() {
        let mesh = Geometry::cylinder(0.2, 0.4, 8.0, 8).tessellate();
        for i in 0..mesh.vertex_count() as u32 {
            assert!((mesh.normal(i).length() - 1.0).abs() < 1e-5);
        }
        assert_outward(&mesh);
    }

    #[test]
    fn sphere_vertices_sit_on_radius() {
        let mesh = Geometry::sphere(0.3, 8, 8).tessellate();
        for i in 0..mesh.vertex_count() as u32 {
            assert!((mesh.position(i).length() - 0.3).abs() < 1e-5);
        }
        assert_outward(&mesh);
    }

    #[test]
    fn plane_faces_positive_z() {
        let mesh = Geometry::plane(100.0, 100.0).tessellate();
        assert_eq!(mesh.indices.len(), 6);
        assert_eq!(mesh.normal(0), Vec3::Z);
        assert_outward(&mesh);
    }

    #[test]
    fn extents_report_widest_radius() {
        let extents = Geometry::cylinder(0.2, 0.4, 8.0, 8).extents();
        assert!((extents.x - 0.8).abs() < 1e-6);
        assert_eq!(extents.y, 8.0);
    }
}
