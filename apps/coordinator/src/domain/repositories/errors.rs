use thiserror::Error;

/// Failures reported by a storage adapter
///
/// These indicate a broken collaborator, not a scheduling outcome, and are
/// always propagated to the caller.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Corrupt record {id}: {reason}")]
    CorruptRecord { id: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        RepositoryError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;
