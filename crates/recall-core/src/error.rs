use std::path::PathBuf;

use thiserror::Error;

/// Failure taxonomy shared by every retrieval component.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("External service failed: {0}")]
    ExternalService(String),

    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Corrupt index file {}: {reason}", path.display())]
    PersistenceCorruption { path: PathBuf, reason: String },

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::PersistenceCorruption { path: path.into(), reason: reason.to_string() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
