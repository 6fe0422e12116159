use thiserror::Error;

use crate::document::validate::ValidationError;

/// Failures surfaced by a version store or its transaction.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("row {0} does not exist")]
    MissingRow(i64),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// Errors returned by the document service.
///
/// "Not found" is never an error: lookups and mutations return `Option`.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unknown content type: {0}")]
    UnknownContentType(String),

    #[error("storage error: {0}")]
    Storage(StoreError),
}

impl From<StoreError> for DocumentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => DocumentError::Conflict(msg),
            other => DocumentError::Storage(other),
        }
    }
}

pub type DocumentResult<T> = Result<T, DocumentError>;
pub type StoreResult<T> = Result<T, StoreError>;
