use glam::{Mat4, Vec3};

use crate::config::CameraConfig;

/// Camera parameters consumed by render surfaces.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraParams {
    pub view_proj: Mat4,
    pub view: Mat4,
    pub position: Vec3,
}

/// Perspective camera with an explicit look-at target.
///
/// Like most retained-mode engines, changing `aspect` does not touch the
/// projection until [`PerspectiveCamera::update_projection_matrix`] runs.
#[derive(Clone, Debug, PartialEq)]
pub struct PerspectiveCamera {
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
    pub up: Vec3,
    target: Vec3,
    projection: Mat4,
}

impl PerspectiveCamera {
    pub fn new(fov: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut camera = Self {
            fov,
            aspect,
            near,
            far,
            position: Vec3::ZERO,
            up: Vec3::Y,
            target: Vec3::NEG_Z,
            projection: Mat4::IDENTITY,
        };
        camera.update_projection_matrix();
        camera
    }

    pub fn from_config(config: &CameraConfig, aspect: f32) -> Self {
        let mut camera = Self::new(config.fov, aspect, config.near, config.far);
        camera.position = config.position;
        camera.look_at(config.look_at);
        camera
    }

    /// Aims the camera at `target` from its current position.
    pub fn look_at(&mut self, target: Vec3) {
        self.target = target;
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn update_projection_matrix(&mut self) {
        self.projection = Mat4::perspective_rh(
            self.fov.to_radians(),
            self.aspect.max(0.01),
            self.near,
            self.far,
        );
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection
    }

    pub fn view_matrix(&self) -> Mat4 {
        if (self.target - self.position).length_squared() <= f32::EPSILON {
            return Mat4::from_translation(-self.position);
        }
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    /// Unit vector the camera is facing.
    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).normalize_or_zero()
    }

    pub fn params(&self) -> CameraParams {
        let view = self.view_matrix();
        CameraParams {
            view_proj: self.projection * view,
            view,
            position: self.position,
        }
    }
}
