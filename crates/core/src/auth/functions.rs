use super::AuthError;

const BEARER_SCHEME: &str = "Bearer ";

/// Extract the token from an `Authorization` header value.
///
/// A missing or blank header is `MissingCredential`; any other shape than
/// `Bearer <token>` is `MalformedCredential`.
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    let header = match header.map(str::trim) {
        Some(value) if !value.is_empty() => value,
        _ => return Err(AuthError::MissingCredential),
    };

    let token = header.strip_prefix(BEARER_SCHEME).ok_or_else(|| {
        AuthError::MalformedCredential("expected `Bearer <token>`".to_string())
    })?;

    let token = token.trim();
    if token.is_empty() || token.contains(char::is_whitespace) {
        return Err(AuthError::MalformedCredential(
            "bearer token is empty or contains whitespace".to_string(),
        ));
    }

    Ok(token)
}

/// Extract username from email if no name provided.
pub fn email_to_name(email: &str) -> String {
    match email.split('@').next() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => "User".to_string(),
    }
}
