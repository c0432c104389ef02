use thiserror::Error;

/// Auth errors for the learnbyshorts_auth crate.
///
/// Wraps the core `AuthError` and adds the failures that only happen while
/// wiring the crate up.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Error from the core auth module (credential validation, assertions)
    #[error(transparent)]
    Core(#[from] learnbyshorts_core::auth::AuthError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}
