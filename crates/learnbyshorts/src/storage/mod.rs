//! Storage backend implementations.
//!
//! This module provides concrete implementations of the repository traits
//! defined in `learnbyshorts_core::storage`:
//!
//! - `inmemory` (default): ordered in-memory table, used by tests and local runs
//! - `dynamodb`: AWS DynamoDB backend using `aws-sdk-dynamodb`
//!
//! Both backends can be compiled together; the caller picks one when building
//! the [`AccessLayer`](crate::AccessLayer).

#[cfg(not(any(feature = "inmemory", feature = "dynamodb")))]
compile_error!(
    "No storage backend selected. Enable 'inmemory' or 'dynamodb' feature. \
    Example: cargo build -p learnbyshorts --features dynamodb"
);

#[cfg(feature = "inmemory")]
pub mod inmemory;

#[cfg(feature = "dynamodb")]
pub mod dynamodb;

#[cfg(feature = "inmemory")]
pub use inmemory::InMemoryRepository;

#[cfg(feature = "dynamodb")]
pub use dynamodb::DynamoDbRepository;

use learnbyshorts_core::keyspace::IdentityKey;
use learnbyshorts_core::storage::{RepositoryError, Result};

/// Reduce the users found under one index key to at most one.
///
/// Several users under the same key breaks the one-user-per-identity rule;
/// that is reported as `Conflict` instead of picking one arbitrarily.
pub(crate) fn single_user(identity: &IdentityKey, mut user_ids: Vec<String>) -> Result<Option<String>> {
    user_ids.sort();
    user_ids.dedup();

    match user_ids.len() {
        0 => Ok(None),
        1 => Ok(user_ids.pop()),
        found => {
            tracing::warn!(?identity, found, users = ?user_ids, "identity maps to several users");
            Err(RepositoryError::Conflict {
                entity_type: "Identity",
                id: identity
                    .index_key()
                    .unwrap_or_else(|_| format!("{identity:?}")),
            })
        }
    }
}
