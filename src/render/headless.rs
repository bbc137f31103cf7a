use std::collections::VecDeque;

use glam::Mat4;

use super::{physical_size, Painter, RenderError, RenderSurface, RendererOptions};
use crate::camera::PerspectiveCamera;
use crate::scene::Scene;

/// Summary of one submitted frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRecord {
    pub index: u64,
    pub draw_calls: usize,
    /// Triangles that survived culling and clipping.
    pub triangles: usize,
    pub view_proj: Mat4,
}

/// Surface without a display that records what it was asked to draw.
///
/// Only the most recent [`HeadlessSurface::HISTORY_LIMIT`] frames are kept.
#[derive(Debug, Default)]
pub struct HeadlessSurface {
    options: RendererOptions,
    size: (u32, u32),
    pixel_ratio: f64,
    frames: u64,
    history: VecDeque<FrameRecord>,
    scripted_failures: VecDeque<RenderError>,
    painter: Painter,
}

impl HeadlessSurface {
    pub const HISTORY_LIMIT: usize = 256;

    pub fn new(options: RendererOptions) -> Self {
        Self {
            options,
            size: (0, 0),
            pixel_ratio: 1.0,
            ..Self::default()
        }
    }

    pub fn options(&self) -> RendererOptions {
        self.options
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn pixel_ratio(&self) -> f64 {
        self.pixel_ratio
    }

    pub fn physical_size(&self) -> (u32, u32) {
        physical_size(self.size.0, self.size.1, self.pixel_ratio)
    }

    /// Number of frames drawn successfully.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Recent frames, oldest first.
    pub fn history(&self) -> &VecDeque<FrameRecord> {
        &self.history
    }

    pub fn last_frame(&self) -> Option<&FrameRecord> {
        self.history.back()
    }

    /// Makes the next render call fail with `error`.
    pub fn fail_next(&mut self, error: RenderError) {
        self.scripted_failures.push_back(error);
    }
}

impl RenderSurface for HeadlessSurface {
    fn set_size(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    fn set_pixel_ratio(&mut self, ratio: f64) {
        self.pixel_ratio = ratio;
    }

    fn render(&mut self, scene: &Scene, camera: &PerspectiveCamera) -> Result<(), RenderError> {
        if let Some(error) = self.scripted_failures.pop_front() {
            return Err(error);
        }
        let size = self.physical_size();
        let record = FrameRecord {
            index: self.frames,
            draw_calls: scene.draw_list().len(),
            triangles: self.painter.paint(scene, camera, size).len(),
            view_proj: camera.params().view_proj,
        };
        self.frames += 1;
        if self.history.len() == Self::HISTORY_LIMIT {
            self.history.pop_front();
        }
        self.history.push_back(record);
        Ok(())
    }
}
