//! Retained-mode scene graph.
//!
//! Nodes live in an arena owned by [`Scene`] and are addressed by [`NodeId`]
//! handles. Every node other than the root is created under an existing group,
//! so each node has exactly one parent for its whole life.

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::color::Color;
use crate::geometry::Geometry;

/// Handle into the scene arena. Handles are never invalidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SceneError {
    #[error("node {0:?} does not exist")]
    UnknownNode(NodeId),
    #[error("node {0:?} is a mesh and cannot own children")]
    NotAGroup(NodeId),
}

/// Local transform. Rotation is Euler angles in radians applied in XYZ order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn matrix(&self) -> Mat4 {
        let rotation = Mat4::from_rotation_x(self.rotation.x)
            * Mat4::from_rotation_y(self.rotation.y)
            * Mat4::from_rotation_z(self.rotation.z);
        Mat4::from_translation(self.position) * rotation * Mat4::from_scale(self.scale)
    }
}

/// Surface appearance of a mesh.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub color: Color,
    pub metalness: f32,
    pub roughness: f32,
}

impl Material {
    pub fn matte(color: Color) -> Self {
        Self {
            color,
            metalness: 0.0,
            roughness: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub geometry: Geometry,
    pub material: Material,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    Group,
    Mesh(Mesh),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub kind: NodeKind,
    pub transform: Transform,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn mesh(&self) -> Option<&Mesh> {
        match &self.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            NodeKind::Group => None,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self.kind, NodeKind::Group)
    }
}

/// Linear distance fog.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fog {
    pub color: Color,
    pub near: f32,
    pub far: f32,
}

impl Fog {
    /// Blend factor towards the fog color for a fragment at `distance` from the eye.
    pub fn factor(&self, distance: f32) -> f32 {
        if self.far <= self.near {
            return if distance >= self.far { 1.0 } else { 0.0 };
        }
        ((distance - self.near) / (self.far - self.near)).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Light {
    Ambient {
        color: Color,
        intensity: f32,
    },
    /// Shines from `position` towards the origin.
    Directional {
        color: Color,
        intensity: f32,
        position: Vec3,
        cast_shadow: bool,
    },
}

/// Ambient and directional terms summed from a light list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightingSummary {
    pub ambient: Vec3,
    pub sun_direction: Vec3,
    pub sun_color: Vec3,
}

/// One renderable mesh with its resolved world matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawItem {
    pub node: NodeId,
    pub world: Mat4,
    pub mesh: Mesh,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    nodes: Vec<Node>,
    pub background: Color,
    pub fog: Option<Fog>,
    pub lights: Vec<Light>,
}

impl Scene {
    pub const ROOT: NodeId = NodeId(0);

    pub fn new(background: Color) -> Self {
        Self {
            nodes: vec![Node {
                name: "root".to_string(),
                kind: NodeKind::Group,
                transform: Transform::default(),
                parent: None,
                children: Vec::new(),
            }],
            background,
            fog: None,
            lights: Vec::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        Self::ROOT
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn transform_mut(&mut self, id: NodeId) -> Option<&mut Transform> {
        self.nodes.get_mut(id.0).map(|node| &mut node.transform)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (NodeId(index), node))
    }

    /// Adds an empty group under `parent`.
    pub fn add_group(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        transform: Transform,
    ) -> Result<NodeId, SceneError> {
        self.attach(parent, name.into(), NodeKind::Group, transform)
    }

    /// Adds a mesh under `parent`.
    pub fn add_mesh(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        geometry: Geometry,
        material: Material,
        transform: Transform,
    ) -> Result<NodeId, SceneError> {
        let kind = NodeKind::Mesh(Mesh { geometry, material });
        self.attach(parent, name.into(), kind, transform)
    }

    fn attach(
        &mut self,
        parent: NodeId,
        name: String,
        kind: NodeKind,
        transform: Transform,
    ) -> Result<NodeId, SceneError> {
        let parent_node = self
            .nodes
            .get(parent.0)
            .ok_or(SceneError::UnknownNode(parent))?;
        if !parent_node.is_group() {
            return Err(SceneError::NotAGroup(parent));
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            name,
            kind,
            transform,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        Ok(id)
    }

    /// Composes local transforms from the root down to `id`.
    pub fn world_matrix(&self, id: NodeId) -> Result<Mat4, SceneError> {
        let mut node = self.node(id).ok_or(SceneError::UnknownNode(id))?;
        let mut matrix = node.transform.matrix();
        while let Some(parent) = node.parent {
            node = &self.nodes[parent.0];
            matrix = node.transform.matrix() * matrix;
        }
        Ok(matrix)
    }

    /// Returns `true` if `ancestor` lies on the parent chain of `id`.
    pub fn is_descendant(&self, id: NodeId, ancestor: NodeId) -> bool {
        let mut current = self.node(id).and_then(Node::parent);
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.node(parent).and_then(Node::parent);
        }
        false
    }

    /// Collects every mesh with its world matrix in depth-first order.
    pub fn draw_list(&self) -> Vec<DrawItem> {
        let mut items = Vec::new();
        let mut stack = vec![(Self::ROOT, Mat4::IDENTITY)];
        while let Some((id, parent_world)) = stack.pop() {
            let node = &self.nodes[id.0];
            let world = parent_world * node.transform.matrix();
            if let Some(mesh) = node.mesh() {
                items.push(DrawItem {
                    node: id,
                    world,
                    mesh: *mesh,
                });
            }
            for child in node.children.iter().rev() {
                stack.push((*child, world));
            }
        }
        items
    }

    pub fn lighting(&self) -> LightingSummary {
        let mut summary = LightingSummary {
            ambient: Vec3::ZERO,
            sun_direction: Vec3::NEG_Y,
            sun_color: Vec3::ZERO,
        };
        for light in &self.lights {
            match *light {
                Light::Ambient { color, intensity } => summary.ambient += color.rgb() * intensity,
                Light::Directional {
                    color,
                    intensity,
                    position,
                    ..
                } => {
                    summary.sun_direction = (-position).normalize_or_zero();
                    summary.sun_color += color.rgb() * intensity;
                }
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use super::*;

    fn white() -> Material {
        Material::matte(Color::WHITE)
    }

    #[test]
    fn children_keep_single_parent() {
        let mut scene = Scene::new(Color(0xf0f0f0));
        let group = scene
            .add_group(scene.root(), "world", Transform::default())
            .unwrap();
        let mesh = scene
            .add_mesh(
                group,
                "cube",
                Geometry::cuboid(1.0, 1.0, 1.0),
                white(),
                Transform::default(),
            )
            .unwrap();
        assert_eq!(scene.node(mesh).unwrap().parent(), Some(group));
        assert_eq!(scene.node(group).unwrap().children(), &[mesh]);
        assert_eq!(scene.node(scene.root()).unwrap().children(), &[group]);
        assert!(scene.is_descendant(mesh, scene.root()));
        assert!(!scene.is_descendant(group, mesh));
    }

    #[test]
    fn meshes_cannot_own_children() {
        let mut scene = Scene::new(Color::WHITE);
        let mesh = scene
            .add_mesh(
                scene.root(),
                "cube",
                Geometry::cuboid(1.0, 1.0, 1.0),
                white(),
                Transform::default(),
            )
            .unwrap();
        let err = scene
            .add_group(mesh, "child", Transform::default())
            .unwrap_err();
        assert_eq!(err, SceneError::NotAGroup(mesh));
    }

    #[test]
    fn unknown_parent_is_rejected() {
        let mut scene = Scene::new(Color::WHITE);
        let err = scene
            .add_group(NodeId(42), "orphan", Transform::default())
            .unwrap_err();
        assert_eq!(err, SceneError::UnknownNode(NodeId(42)));
        assert_eq!(scene.len(), 1);
    }

    #[test]
    fn world_matrix_composes_parent_chain() {
        let mut scene = Scene::new(Color::WHITE);
        let mut outer = Transform::at(Vec3::new(1.0, 0.0, 0.0));
        outer.scale = Vec3::splat(2.0);
        let group = scene.add_group(scene.root(), "outer", outer).unwrap();
        let mesh = scene
            .add_mesh(
                group,
                "inner",
                Geometry::cuboid(1.0, 1.0, 1.0),
                white(),
                Transform::at(Vec3::new(0.0, 1.0, 0.0)),
            )
            .unwrap();
        let world = scene.world_matrix(mesh).unwrap();
        let origin = world.transform_point3(Vec3::ZERO);
        assert!((origin - Vec3::new(1.0, 2.0, 0.0)).length() < 1e-6);

        let items = scene.draw_list();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].node, mesh);
        assert!(items[0].world.abs_diff_eq(world, 1e-6));
    }

    #[test]
    fn rotation_about_x_lays_plane_flat() {
        let mut transform = Transform::default();
        transform.rotation.x = -FRAC_PI_2;
        let normal = transform.matrix().transform_vector3(Vec3::Z);
        assert!((normal - Vec3::Y).length() < 1e-6);
    }

    #[test]
    fn fog_factor_is_linear_between_near_and_far() {
        let fog = Fog {
            color: Color::WHITE,
            near: 10.0,
            far: 50.0,
        };
        assert_eq!(fog.factor(5.0), 0.0);
        assert!((fog.factor(30.0) - 0.5).abs() < f32::EPSILON);
        assert_eq!(fog.factor(80.0), 1.0);
    }

    #[test]
    fn lighting_sums_ambient_and_sun() {
        let mut scene = Scene::new(Color::WHITE);
        scene.lights.push(Light::Ambient {
            color: Color::WHITE,
            intensity: 0.6,
        });
        scene.lights.push(Light::Directional {
            color: Color::WHITE,
            intensity: 0.8,
            position: Vec3::new(0.0, 10.0, 0.0),
            cast_shadow: true,
        });
        let lighting = scene.lighting();
        assert!((lighting.ambient - Vec3::splat(0.6)).length() < 1e-6);
        assert!((lighting.sun_color - Vec3::splat(0.8)).length() < 1e-6);
        assert!((lighting.sun_direction - Vec3::NEG_Y).length() < 1e-6);
    }
}
