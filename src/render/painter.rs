//! Software projection used by surfaces without a depth buffer.
//!
//! Triangles are transformed to world space, flat shaded, fogged, clipped
//! against the near plane and returned back-to-front so they can be filled in
//! order (painter's algorithm).

use std::cmp::Ordering;
use std::collections::HashMap;

use glam::{Vec2, Vec3, Vec4};

use crate::camera::PerspectiveCamera;
use crate::geometry::MeshData;
use crate::scene::Scene;

/// A screen-space polygon with its final fill color.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    /// Vertices in physical pixels, origin top-left.
    pub points: Vec<Vec2>,
    /// Eye distance of the source triangle's centroid.
    pub depth: f32,
    pub fill: Vec3,
}

#[derive(Debug, Default)]
pub struct Painter {
    meshes: HashMap<String, MeshData>,
}

impl Painter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tessellated geometries kept around between frames.
    pub fn cached_meshes(&self) -> usize {
        self.meshes.len()
    }

    /// Projects every visible triangle of `scene` onto a `size` pixel target.
    pub fn paint(
        &mut self,
        scene: &Scene,
        camera: &PerspectiveCamera,
        size: (u32, u32),
    ) -> Vec<Polygon> {
        let view_proj = camera.params().view_proj;
        let eye = camera.position;
        let lighting = scene.lighting();
        let to_light = -lighting.sun_direction;
        let (width, height) = (size.0 as f32, size.1 as f32);

        let mut polygons = Vec::new();
        for item in scene.draw_list() {
            let mesh = self
                .meshes
                .entry(item.mesh.geometry.cache_key())
                .or_insert_with(|| item.mesh.geometry.tessellate());
            let albedo = item.mesh.material.color.rgb();

            for [a, b, c] in mesh.triangles() {
                let world = [a, b, c].map(|index| item.world.transform_point3(mesh.position(index)));
                let normal = (world[1] - world[0]).cross(world[2] - world[0]);
                let centroid = (world[0] + world[1] + world[2]) / 3.0;
                if normal.dot(centroid - eye) >= 0.0 {
                    continue;
                }

                let clipped = clip_near(world.map(|p| view_proj * p.extend(1.0)));
                if clipped.len() < 3 {
                    continue;
                }
                let points: Vec<Vec2> = clipped
                    .iter()
                    .map(|clip| {
                        let ndc = clip.truncate() / clip.w;
                        Vec2::new((ndc.x + 1.0) * 0.5 * width, (1.0 - ndc.y) * 0.5 * height)
                    })
                    .collect();
                if off_screen(&points, width, height) {
                    continue;
                }

                let diffuse = normal.normalize_or_zero().dot(to_light).max(0.0);
                let lit = albedo * (lighting.ambient + lighting.sun_color * diffuse);
                let depth = centroid.distance(eye);
                let fill = match scene.fog {
                    Some(fog) => lit.lerp(fog.color.rgb(), fog.factor(depth)),
                    None => lit,
                };
                polygons.push(Polygon {
                    points,
                    depth,
                    fill,
                });
            }
        }

        polygons.sort_by(|a, b| b.depth.partial_cmp(&a.depth).unwrap_or(Ordering::Equal));
        polygons
    }
}

/// Sutherland-Hodgman against the `z >= 0` clip plane of a 0..1 depth range.
fn clip_near(triangle: [Vec4; 3]) -> Vec<Vec4> {
    let mut out = Vec::with_capacity(4);
    for i in 0..3 {
        let a = triangle[i];
        let b = triangle[(i + 1) % 3];
        let (a_in, b_in) = (a.z >= 0.0, b.z >= 0.0);
        if a_in {
            out.push(a);
        }
        if a_in != b_in {
            out.push(a.lerp(b, a.z / (a.z - b.z)));
        }
    }
    out
}

fn off_screen(points: &[Vec2], width: f32, height: f32) -> bool {
    points.iter().all(|p| p.x < 0.0)
        || points.iter().all(|p| p.x > width)
        || points.iter().all(|p| p.y < 0.0)
        || points.iter().all(|p| p.y > height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::geometry::Geometry;
    use crate::scene::{Fog, Light, Material, Transform};

    fn camera() -> PerspectiveCamera {
        let mut camera = PerspectiveCamera::new(75.0, 1.0, 0.1, 100.0);
        camera.position = Vec3::new(0.0, 0.0, 5.0);
        camera.look_at(Vec3::ZERO);
        camera
    }

    fn cube_scene() -> Scene {
        let mut scene = Scene::new(Color::WHITE);
        scene.lights.push(Light::Ambient {
            color: Color::WHITE,
            intensity: 1.0,
        });
        scene
            .add_mesh(
                scene.root(),
                "cube",
                Geometry::cuboid(1.0, 1.0, 1.0),
                Material::matte(Color(0xff0000)),
                Transform::default(),
            )
            .unwrap();
        scene
    }

    #[test]
    fn cube_seen_head_on_shows_one_face() {
        let mut painter = Painter::new();
        let polygons = painter.paint(&cube_scene(), &camera(), (200, 200));
        assert_eq!(polygons.len(), 2);
        for polygon in &polygons {
            assert!((polygon.fill - Vec3::X).length() < 1e-5);
            for point in &polygon.points {
                assert!(point.x > 0.0 && point.x < 200.0);
                assert!(point.y > 0.0 && point.y < 200.0);
            }
        }
        assert_eq!(painter.cached_meshes(), 1);
    }

    #[test]
    fn polygons_come_back_to_front() {
        let mut scene = cube_scene();
        scene
            .add_mesh(
                scene.root(),
                "far-cube",
                Geometry::cuboid(1.0, 1.0, 1.0),
                Material::matte(Color::WHITE),
                Transform::at(Vec3::new(1.5, 0.0, -4.0)),
            )
            .unwrap();
        let polygons = Painter::new().paint(&scene, &camera(), (200, 200));
        assert!(polygons.windows(2).all(|pair| pair[0].depth >= pair[1].depth));
    }

    #[test]
    fn fog_tints_distant_faces() {
        let mut scene = cube_scene();
        scene.fog = Some(Fog {
            color: Color(0x0000ff),
            near: 0.0,
            far: 1.0,
        });
        let polygons = Painter::new().paint(&scene, &camera(), (200, 200));
        assert!(polygons.iter().all(|p| (p.fill - Vec3::Z).length() < 1e-5));
    }

    #[test]
    fn geometry_behind_the_camera_is_dropped() {
        let mut scene = Scene::new(Color::WHITE);
        scene
            .add_mesh(
                scene.root(),
                "behind",
                Geometry::cuboid(1.0, 1.0, 1.0),
                Material::matte(Color::WHITE),
                Transform::at(Vec3::new(0.0, 0.0, 10.0)),
            )
            .unwrap();
        assert!(Painter::new().paint(&scene, &camera(), (200, 200)).is_empty());
    }

    #[test]
    fn near_plane_clipping_keeps_the_visible_part() {
        let clip = clip_near([
            Vec4::new(0.0, 0.0, -1.0, 1.0),
            Vec4::new(1.0, 0.0, 1.0, 1.0),
            Vec4::new(0.0, 1.0, 1.0, 1.0),
        ]);
        assert_eq!(clip.len(), 4);
        assert!(clip.iter().all(|v| v.z >= 0.0));
    }
}
