//! Error taxonomy for the Rain compiler.
//!
//! Rendering itself never fails: absence and malformed input degrade to empty
//! content. These errors only travel between internal stages and are logged
//! at the engine boundary.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RainError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid stylesheet: {0}")]
    Css(String),

    #[error("invalid model definition in {}: {message}", path.display())]
    Model { path: PathBuf, message: String },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl RainError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RainError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, RainError>;
