//! Error types for the Twinsong server.

use std::path::PathBuf;

/// Server error type.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// IO error.
    #[error("IO error at {path}: {message}")]
    Io { path: PathBuf, message: String },

    /// Core error (codec, store, model).
    #[error("core error: {0}")]
    Core(#[from] twinsong_core::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A kernel process could not be spawned.
    #[error("kernel spawn failed: {0}")]
    KernelSpawn(String),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(String),
}

impl From<std::io::Error> for ServerError {
    fn from(e: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::new(),
            message: e.to_string(),
        }
    }
}

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
