use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("embedding has {got} dimensions, index expects {expected}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("{documents} documents but {embeddings} embeddings")]
    LengthMismatch { documents: usize, embeddings: usize },

    #[error("table not found: {0}")]
    TableNotFound(String),

    #[cfg(feature = "lancedb")]
    #[error("lancedb error: {0}")]
    Lance(#[from] ::lancedb::Error),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("{0}")]
    Other(String),
}
