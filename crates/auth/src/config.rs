use chrono::Duration;

use crate::AuthError;

const DEFAULT_TOKEN_TTL_DAYS: i64 = 7;

/// Complete auth configuration.
#[derive(Clone)]
pub struct AuthConfig {
    /// HMAC secret the bearer credentials are signed with.
    pub jwt_secret: String,
    pub token_ttl: Duration,
}

impl AuthConfig {
    /// Load from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `JWT_SECRET`: HMAC secret for bearer credentials (required)
    /// - `TOKEN_TTL_DAYS`: Credential lifetime in days (default: 7)
    ///
    /// # Errors
    ///
    /// Returns an error if `JWT_SECRET` is missing or empty, or if
    /// `TOKEN_TTL_DAYS` is not a positive integer.
    pub fn from_env() -> Result<Self, AuthError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`AuthConfig::from_env`] with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AuthError> {
        let jwt_secret = lookup("JWT_SECRET")
            .filter(|secret| !secret.is_empty())
            .ok_or_else(|| AuthError::Config("JWT_SECRET must be set".to_string()))?;

        let token_ttl = match lookup("TOKEN_TTL_DAYS") {
            Some(raw) => match raw.parse::<i64>() {
                Ok(days) if days > 0 => Duration::days(days),
                _ => {
                    return Err(AuthError::Config(format!(
                        "TOKEN_TTL_DAYS must be a positive integer, got {raw:?}"
                    )))
                }
            },
            None => Duration::days(DEFAULT_TOKEN_TTL_DAYS),
        };

        Ok(Self {
            jwt_secret,
            token_ttl,
        })
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("token_ttl", &self.token_ttl)
            .finish()
    }
}
