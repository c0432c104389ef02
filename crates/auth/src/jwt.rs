//! HS256 bearer credentials.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use learnbyshorts_core::auth::{AuthError, CredentialClaims, CredentialIssuer, Result};
use serde::{Deserialize, Serialize};

use crate::AuthConfig;

/// Claims carried by an issued token.
#[derive(Debug, Serialize, Deserialize)]
struct TokenClaims {
    user_id: String,
    email: String,
    exp: i64,
    iat: i64,
}

/// Issues and validates HS256-signed JWTs.
///
/// Expiry is checked against the instant passed to
/// [`CredentialIssuer::validate`], not the system time.
#[derive(Clone)]
pub struct JwtIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl JwtIssuer {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.jwt_secret.as_bytes(), config.token_ttl)
    }

    fn validation() -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation
    }
}

impl std::fmt::Debug for JwtIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtIssuer").field("ttl", &self.ttl).finish()
    }
}

impl CredentialIssuer for JwtIssuer {
    fn issue(&self, user_id: &str, email: &str, now: DateTime<Utc>) -> Result<String> {
        let claims = TokenClaims {
            user_id: user_id.to_string(),
            email: email.to_string(),
            exp: (now + self.ttl).timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<CredentialClaims> {
        let data = decode::<TokenClaims>(token, &self.decoding_key, &Self::validation())
            .map_err(|e| AuthError::MalformedCredential(e.to_string()))?;
        let claims = data.claims;

        if claims.exp <= now.timestamp() {
            tracing::debug!(user_id = %claims.user_id, "rejected expired credential");
            return Err(AuthError::ExpiredCredential);
        }

        let to_instant = |secs: i64, name: &str| {
            DateTime::from_timestamp(secs, 0)
                .ok_or_else(|| AuthError::MalformedCredential(format!("{name} out of range")))
        };

        Ok(CredentialClaims {
            issued_at: to_instant(claims.iat, "iat")?,
            expires_at: to_instant(claims.exp, "exp")?,
            user_id: claims.user_id,
            email: claims.email,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn issuer() -> JwtIssuer {
        JwtIssuer::new(b"test-secret", Duration::days(7))
    }

    #[test]
    fn test_issue_then_validate() {
        let issuer = issuer();
        let token = issuer.issue("u1", "a@x.com", now()).unwrap();

        let claims = issuer.validate(&token, now() + Duration::days(1)).unwrap();
        assert_eq!(claims.user_id, "u1");
        assert_eq!(claims.email, "a@x.com");
        assert_eq!(claims.issued_at, now());
        assert_eq!(claims.expires_at, now() + Duration::days(7));
    }

    #[test]
    fn test_expired_token() {
        let issuer = issuer();
        let token = issuer.issue("u1", "a@x.com", now()).unwrap();

        assert_eq!(
            issuer.validate(&token, now() + Duration::days(7)),
            Err(AuthError::ExpiredCredential)
        );
    }

    #[test]
    fn test_wrong_secret_is_malformed() {
        let token = issuer().issue("u1", "a@x.com", now()).unwrap();
        let other = JwtIssuer::new(b"another-secret", Duration::days(7));

        assert!(matches!(
            other.validate(&token, now()),
            Err(AuthError::MalformedCredential(_))
        ));
    }

    #[test]
    fn test_garbage_is_malformed() {
        assert!(matches!(
            issuer().validate("not-a-jwt", now()),
            Err(AuthError::MalformedCredential(_))
        ));
    }

    #[test]
    fn test_token_claim_names() {
        use base64::Engine;

        let token = issuer().issue("u1", "a@x.com", now()).unwrap();
        let payload = token.split('.').nth(1).unwrap();
        let json = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(payload)
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&json).unwrap();

        assert_eq!(value["user_id"], "u1");
        assert_eq!(value["email"], "a@x.com");
        assert_eq!(value["iat"], now().timestamp());
        assert_eq!(value["exp"], (now() + Duration::days(7)).timestamp());
    }
}
