//! Error types for the deployment engine

use thiserror::Error;

/// Main error type for the deployment engine
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An active deployment (or a forbidden status transition) blocks the
    /// requested operation. Recoverable by retrying later; never retried
    /// automatically.
    #[error("{0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Queue error: {0}")]
    Queue(String),

    /// Failure inside deployment execution (git clone, docker build, ...).
    /// Captured into the deployment's error log, never retried.
    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for EngineError {
    fn from(err: anyhow::Error) -> Self {
        EngineError::Internal(err.to_string())
    }
}
