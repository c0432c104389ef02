//! In-memory storage backend.
//!
//! Stores every record in one ordered map keyed by `(PK, SK)` and wrapped in
//! `Arc<RwLock<_>>`. Store-side expiry is emulated by
//! [`InMemoryRepository::purge_expired`] and the optional sweeper task.
//!
//! # Example
//!
//! ```rust,ignore
//! use learnbyshorts::storage::inmemory::InMemoryRepository;
//!
//! let repo = InMemoryRepository::new();
//! // Use repo for testing...
//! ```

mod repository;
mod table;

pub use repository::InMemoryRepository;
