use thiserror::Error;

#[derive(Error, Debug)]
pub enum StatementError {
    #[error("Table rejected: {0}")]
    ValidationFailed(String),

    #[error("Could not resolve required column(s): {0}")]
    UnresolvedSchema(String),

    #[error("Vector index has not been built; ingest transactions or load a persisted index first")]
    IndexNotInitialized,

    #[error("Embedding request failed: {0}")]
    EmbeddingFailed(String),

    #[error("Answering capability failed: {0}")]
    AnswerFailed(String),

    #[error("Failed to {operation} vector index at '{path}': {details}")]
    PersistenceError {
        operation: &'static str,
        path: String,
        details: String,
    },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StatementError>;
