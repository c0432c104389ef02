mod error;
mod functions;
mod traits;
mod types;

pub use error::AuthError;
pub use functions::{bearer_token, email_to_name};
pub use traits::{CredentialIssuer, IdentityVerifier, Result};
pub use types::{CredentialClaims, IdentityClaims};
