//! Error types for twinsong-core.

use thiserror::Error;

/// Result type for twinsong-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in twinsong-core.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// IPC communication error with a kernel process.
    #[error("IPC error: {0}")]
    Ipc(String),

    /// A notebook file is malformed or carries an unknown version.
    #[error("invalid notebook: {0}")]
    InvalidNotebook(String),

    /// An editor tree violated a structural invariant.
    #[error("invalid editor tree: {0}")]
    InvalidEditorTree(String),
}
