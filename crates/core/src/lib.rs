//! Functional core of the LearnByShorts user-data store.
//!
//! Pure domain types, the single-table keyspace codec, and the trait seams
//! the imperative shell implements. Nothing in this crate performs I/O.

pub mod auth;
pub mod clock;
pub mod keyspace;
pub mod learning;
pub mod storage;
