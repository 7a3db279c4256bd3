use arrow::error::ArrowError;
use parquet::errors::ParquetError;

pub type Result<T, E = ExtractError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("invalid location '{location}': {reason}")]
    InvalidLocation { location: String, reason: String },

    #[error("no object store for location '{location}'")]
    UnsupportedScheme { location: String },

    #[error("no readable objects at '{location}'")]
    PartitionNotFound { location: String },

    #[error("column '{column}' missing from {context}")]
    MissingColumn { column: String, context: String },

    #[error("column '{column}' has unexpected type {found}")]
    UnexpectedType { column: String, found: String },

    #[error(transparent)]
    Storage(#[from] object_store::Error),

    #[error(transparent)]
    Parquet(#[from] ParquetError),

    #[error(transparent)]
    Arrow(#[from] ArrowError),

    #[error("transform task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("failed to build transform pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
