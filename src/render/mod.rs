use thiserror::Error;

use crate::camera::PerspectiveCamera;
use crate::scene::Scene;

mod headless;
mod painter;
#[cfg(not(target_arch = "wasm32"))]
pub mod native;
#[cfg(target_arch = "wasm32")]
pub mod wasm;

pub use headless::{FrameRecord, HeadlessSurface};
pub use painter::{Painter, Polygon};
#[cfg(not(target_arch = "wasm32"))]
pub use native::GpuSurface;
#[cfg(target_arch = "wasm32")]
pub use wasm::CanvasSurface;

/// Construction options shared by all surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RendererOptions {
    pub antialias: bool,
    /// Allow the host page to show through pixels the scene does not cover.
    pub alpha: bool,
}

impl Default for RendererOptions {
    fn default() -> Self {
        Self {
            antialias: true,
            alpha: true,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("render surface was lost or is outdated")]
    SurfaceLost,
    #[error("timed out acquiring the next frame")]
    Timeout,
    #[error("renderer is out of memory")]
    OutOfMemory,
    #[error("render backend error: {0}")]
    Backend(String),
}

impl RenderError {
    /// Fatal errors stop the animation; everything else skips a frame.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::OutOfMemory)
    }
}

/// Output surface the composer draws into.
///
/// Sizes are in CSS/logical pixels; implementations scale their backing store
/// by the pixel ratio.
pub trait RenderSurface {
    fn set_size(&mut self, width: u32, height: u32);

    fn set_pixel_ratio(&mut self, ratio: f64);

    fn render(&mut self, scene: &Scene, camera: &PerspectiveCamera) -> Result<(), RenderError>;
}

impl<S: RenderSurface + ?Sized> RenderSurface for Box<S> {
    fn set_size(&mut self, width: u32, height: u32) {
        (**self).set_size(width, height)
    }

    fn set_pixel_ratio(&mut self, ratio: f64) {
        (**self).set_pixel_ratio(ratio)
    }

    fn render(&mut self, scene: &Scene, camera: &PerspectiveCamera) -> Result<(), RenderError> {
        (**self).render(scene, camera)
    }
}

/// Backing store size in physical pixels, never zero.
pub fn physical_size(width: u32, height: u32, ratio: f64) -> (u32, u32) {
    let ratio = if ratio.is_finite() && ratio > 0.0 {
        ratio
    } else {
        1.0
    };
    let scale = |value: u32| ((value as f64 * ratio).round() as u32).max(1);
    (scale(width), scale(height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn physical_size_scales_and_clamps() {
        assert_eq!(physical_size(800, 600, 2.0), (1600, 1200));
        assert_eq!(physical_size(0, 10, 1.5), (1, 15));
        assert_eq!(physical_size(100, 100, f64::NAN), (100, 100));
    }

    #[test]
    fn only_out_of_memory_is_fatal() {
        assert!(RenderError::OutOfMemory.is_fatal());
        assert!(!RenderError::SurfaceLost.is_fatal());
        assert!(!RenderError::Backend("x".into()).is_fatal());
    }
}
