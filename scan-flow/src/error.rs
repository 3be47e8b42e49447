use thiserror::Error;

/// Errors surfaced by pipeline execution and session storage
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("Stage not found: {0}")]
    StageNotFound(String),

    #[error("Stage execution failed: {0}")]
    StageFailed(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Storage error: {0}")]
    StorageError(String),
}

pub type Result<T> = std::result::Result<T, FlowError>;
