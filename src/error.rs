//! Error types for the SpaceScout view.

use std::io;

/// Errors produced by the view layer and its backend transport.
#[derive(Debug, thiserror::Error)]
pub enum ViewError {
    #[error("Please enter a path to scan")]
    EmptyScanPath,

    #[error("{0}")]
    Backend(String),

    #[error("backend disconnected")]
    Disconnected,

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ViewError>;
