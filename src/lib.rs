//! Decorative animated hero scene: wind turbines, solar panels and abstract
//! buildings on a gently swaying camera.
//!
//! The crate owns a small retained-mode scene graph and composes the hero
//! scene on top of it. Output goes through the [`RenderSurface`] trait so the
//! composition logic stays testable without a GPU or a browser; a wgpu surface
//! is provided for native builds and a 2-D canvas surface for the web.

pub mod animation;
pub mod camera;
pub mod color;
pub mod composer;
pub mod config;
pub mod error;
pub mod geometry;
pub mod render;
pub mod scene;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use animation::{AnimationDriver, Clock, DriverState, ManualClock};
#[cfg(not(target_arch = "wasm32"))]
pub use animation::SystemClock;
pub use camera::{CameraParams, PerspectiveCamera};
pub use color::Color;
pub use composer::{Building, SceneComposer, Turbine, Viewport};
pub use config::SceneConfig;
pub use error::HeroError;
pub use geometry::{Geometry, MeshData};
pub use render::{HeadlessSurface, RenderError, RenderSurface, RendererOptions};
pub use scene::{Light, Material, NodeId, Scene, SceneError, Transform};
