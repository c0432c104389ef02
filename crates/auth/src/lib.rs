//! Bearer credentials and identity verification for LearnByShorts.
//!
//! This crate provides:
//! - HS256 JWT credentials implementing `CredentialIssuer`
//! - Auth configuration loaded from the environment
//! - A mock identity verifier for tests and local runs (feature `mock`)

mod config;
mod error;
mod jwt;
mod providers;

pub use config::AuthConfig;
pub use error::AuthError;
pub use jwt::JwtIssuer;
#[cfg(feature = "mock")]
pub use providers::MockVerifier;
