//! Central error handling for the glade3d scene library.
//!
//! Construction-time failures (missing assets, bad shader sources) are fatal
//! and propagate as `SceneError`. Per-frame operations never return errors;
//! they use sentinel values (`f32::NEG_INFINITY` for out-of-domain height
//! queries) or cached fallback state (occlusion results).

use std::path::PathBuf;

/// Centralized error type for all scene construction operations.
#[derive(thiserror::Error, Debug)]
pub enum SceneError {
    #[error("Asset error for {path:?}: {message}")]
    Asset { path: PathBuf, message: String },

    #[error("No loader registered for extension {0:?}")]
    UnknownExtension(String),

    #[error("Cached asset {path:?} is not a {expected}")]
    TypeMismatch {
        path: PathBuf,
        expected: &'static str,
    },

    #[error("Shader error: {0}")]
    Shader(String),

    #[error("Device error: {0}")]
    Device(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),
}

impl SceneError {
    pub fn asset<P: Into<PathBuf>, T: ToString>(path: P, msg: T) -> Self {
        SceneError::Asset {
            path: path.into(),
            message: msg.to_string(),
        }
    }

    pub fn shader<T: ToString>(msg: T) -> Self {
        SceneError::Shader(msg.to_string())
    }

    pub fn device<T: ToString>(msg: T) -> Self {
        SceneError::Device(msg.to_string())
    }
}

/// Convenient Result type alias used throughout the crate.
pub type SceneResult<T> = Result<T, SceneError>;
