use crate::shared::InferenceError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FreeformError {
    #[error("Completion service error: {0}")]
    Service(#[from] InferenceError),

    #[error("{0}")]
    Query(#[from] sqlx::Error),

    #[error("You can only execute one statement at a time.")]
    MultipleStatements,

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("{0}")]
    Snippet(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FreeformError>;
