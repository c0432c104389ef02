//! Single-table user-data store for LearnByShorts.
//!
//! This crate is the imperative shell around `learnbyshorts_core`:
//! - `storage`: repository backends (`inmemory` by default, `dynamodb` behind a feature)
//! - `service`: the access-pattern layer every caller goes through
//! - `retry`: bounded exponential backoff for transient store errors
//! - `config`: environment-driven configuration

pub mod config;
pub mod error;
pub mod retry;
pub mod service;
pub mod storage;

pub use config::{Config, StoreConfig};
pub use error::AccessError;
pub use service::{AccessLayer, ClientContext, LoginOutcome};
