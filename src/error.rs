//! Error types shared by the directory store and the HTTP layer.

use thiserror::Error;

/// Errors returned by the directory store operations.
///
/// The HTTP layer maps each variant to a status code; everything else in the
/// crate works with `anyhow`.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The referenced record does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// The request failed validation.
    #[error("invalid request: {0}")]
    Invalid(String),

    /// The datastore rejected or failed the query.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored JSON column could not be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(#[from] serde_json::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

pub(crate) fn invalid(message: impl Into<String>) -> StoreError {
    StoreError::Invalid(message.into())
}
