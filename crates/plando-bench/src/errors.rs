use thiserror::Error;

/// Errors emitted by the weights benchmark.
#[derive(Debug, Error)]
pub enum BenchError {
    #[error("invalid benchmark input: {0}")]
    InvalidInput(String),
    #[error("dataset directory not found: {0}")]
    MissingDataset(String),
    #[error("schema error: {0}")]
    Schema(#[from] plando_core::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BenchError>;
