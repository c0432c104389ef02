use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{AuthError, CredentialClaims, IdentityClaims};

/// Result type for auth operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Verifies assertions issued by the third-party identity provider.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Fails with `InvalidAssertion` if the provider does not vouch for it.
    async fn verify(&self, assertion: &str) -> Result<IdentityClaims>;
}

/// Issues and validates the bearer credentials handed to clients.
pub trait CredentialIssuer: Send + Sync {
    /// Issue a credential for `(user_id, email)` valid from `now`.
    fn issue(&self, user_id: &str, email: &str, now: DateTime<Utc>) -> Result<String>;

    /// Validate a credential at `now`.
    ///
    /// Fails with `ExpiredCredential` or `MalformedCredential`.
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<CredentialClaims>;
}
