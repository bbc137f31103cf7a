use thiserror::Error;

use crate::render::RenderError;
use crate::scene::SceneError;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HeroError {
    #[error("scene graph error: {0}")]
    Scene(#[from] SceneError),
    #[error("render error: {0}")]
    Render(#[from] RenderError),
    #[error("invalid scene config: {0}")]
    InvalidConfig(String),
}

pub type Result<T, E = HeroError> = std::result::Result<T, E>;
