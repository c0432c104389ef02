use learnbyshorts_core::auth::AuthError;
use learnbyshorts_core::storage::{repository_error_to_status_code, RepositoryError};
use thiserror::Error;

/// Error returned by [`AccessLayer`](crate::AccessLayer) operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AccessError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("unauthorized: {0}")]
    Unauthorized(#[from] AuthError),
}

impl AccessError {
    /// HTTP status for whatever shim fronts the access layer.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Repository(error) => repository_error_to_status_code(error),
            Self::Unauthorized(_) => 401,
        }
    }

    /// Only transient store failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Repository(error) if error.is_retryable())
    }

    pub(crate) fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::Repository(RepositoryError::NotFound {
            entity_type,
            id: id.into(),
        })
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::Repository(RepositoryError::InvalidEntity(message.into()))
    }
}

pub type Result<T> = std::result::Result<T, AccessError>;
