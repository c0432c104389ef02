use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("no credential supplied")]
    MissingCredential,

    #[error("malformed credential: {0}")]
    MalformedCredential(String),

    #[error("credential expired")]
    ExpiredCredential,

    #[error("invalid identity assertion: {0}")]
    InvalidAssertion(String),

    #[error("failed to sign credential: {0}")]
    Signing(String),
}
