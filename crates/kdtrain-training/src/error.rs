use std::path::PathBuf;
use thiserror::Error;

pub type TrainingResult<T> = std::result::Result<T, TrainingError>;

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("invalid training configuration: {0}")]
    InvalidConfig(String),

    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("batch must contain at least one example")]
    EmptyBatch,

    #[error("shape mismatch: {0}")]
    Shape(String),

    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("collaborator error: {0}")]
    Collaborator(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
