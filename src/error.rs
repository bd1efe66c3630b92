use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Could not find replicate level '{requested}' in the table column metadata. Valid options are: {available:?}")]
    MissingReplicateLevel {
        requested: String,
        available: Vec<String>,
    },
    #[error("Metadata does not match the data table: {0}")]
    MetadataMismatch(String),
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("Layer inputs do not line up: {0}")]
    LayerMismatch(String),
    #[error("Worker task failed: {0}")]
    Worker(String),
    #[error("Failed to read CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
