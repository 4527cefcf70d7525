use thiserror::Error;

use crate::query::QueryError;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Entity store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Media not found: {0}")]
    NotFound(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(#[from] QueryError),

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, MediaError>;
