//! Mock identity verifier for development and testing.
//!
//! Assertions are base64-encoded JSON objects carrying the user info a real
//! provider would vouch for:
//! `{"sub": "...", "email": "...", "name": "...", "picture": "..."}`.

use async_trait::async_trait;
use base64::Engine;
use learnbyshorts_core::auth::{AuthError, IdentityClaims, IdentityVerifier, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
struct MockAssertion {
    sub: String,
    email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    picture: Option<String>,
}

/// Identity verifier that trusts any well-formed mock assertion.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockVerifier;

impl MockVerifier {
    pub fn new() -> Self {
        Self
    }

    /// Build the assertion a client would send for the given identity.
    pub fn assertion(sub: &str, email: &str, name: Option<&str>, picture: Option<&str>) -> String {
        let assertion = MockAssertion {
            sub: sub.to_string(),
            email: email.to_string(),
            name: name.map(String::from),
            picture: picture.map(String::from),
        };
        let json = serde_json::to_vec(&assertion).unwrap_or_default();
        base64::engine::general_purpose::STANDARD.encode(json)
    }
}

#[async_trait]
impl IdentityVerifier for MockVerifier {
    async fn verify(&self, assertion: &str) -> Result<IdentityClaims> {
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(assertion)
            .map_err(|e| AuthError::InvalidAssertion(e.to_string()))?;

        let parsed: MockAssertion = serde_json::from_slice(&decoded)
            .map_err(|e| AuthError::InvalidAssertion(e.to_string()))?;

        if parsed.sub.is_empty() || parsed.email.is_empty() {
            return Err(AuthError::InvalidAssertion(
                "assertion must carry `sub` and `email`".to_string(),
            ));
        }

        Ok(IdentityClaims {
            external_id: parsed.sub,
            email: parsed.email,
            display_name: parsed.name,
            avatar_url: parsed.picture,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_verify_assertion() {
        let assertion = MockVerifier::assertion(
            "g1",
            "a@x.com",
            Some("Alice"),
            Some("https://img/a.png"),
        );

        let claims = MockVerifier::new().verify(&assertion).await.unwrap();

        assert_eq!(claims.external_id, "g1");
        assert_eq!(claims.email, "a@x.com");
        assert_eq!(claims.display_name.as_deref(), Some("Alice"));
        assert_eq!(claims.avatar_url.as_deref(), Some("https://img/a.png"));
    }

    #[tokio::test]
    async fn test_verify_without_optional_fields() {
        let assertion = MockVerifier::assertion("g2", "b@x.com", None, None);
        let claims = MockVerifier::new().verify(&assertion).await.unwrap();
        assert_eq!(claims.display_name, None);
        assert_eq!(claims.avatar_url, None);
    }

    #[tokio::test]
    async fn test_verify_rejects_garbage() {
        let result = MockVerifier::new().verify("invalid-assertion!").await;
        assert!(matches!(result, Err(AuthError::InvalidAssertion(_))));
    }

    #[tokio::test]
    async fn test_verify_rejects_missing_email() {
        let assertion = base64::engine::general_purpose::STANDARD
            .encode(serde_json::json!({ "sub": "g1", "email": "" }).to_string());
        let result = MockVerifier::new().verify(&assertion).await;
        assert!(matches!(result, Err(AuthError::InvalidAssertion(_))));
    }
}
