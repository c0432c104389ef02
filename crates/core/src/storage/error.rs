use thiserror::Error;

use crate::keyspace::KeyspaceError;

/// Errors that can occur during repository operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("{entity_type} not found: {id}")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },
    #[error("{0}")]
    InvalidEntity(String),
    #[error("Unrecognized key pattern: ({pk}, {sk})")]
    UnrecognizedKeyPattern { pk: String, sk: String },
    #[error("{entity_type} already exists: {id}")]
    Conflict {
        entity_type: &'static str,
        id: String,
    },
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("Query failed: {0}")]
    QueryFailed(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl RepositoryError {
    /// Only transient store failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

impl From<KeyspaceError> for RepositoryError {
    fn from(error: KeyspaceError) -> Self {
        match error {
            KeyspaceError::InvalidEntity { .. } => Self::InvalidEntity(error.to_string()),
            KeyspaceError::UnrecognizedKeyPattern { pk, sk } => {
                Self::UnrecognizedKeyPattern { pk, sk }
            }
            KeyspaceError::UnrecognizedIndexKey(_) => Self::InvalidData(error.to_string()),
        }
    }
}

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, RepositoryError>;
