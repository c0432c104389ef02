//! DynamoDB storage backend implementation.
//!
//! This module provides a DynamoDB-based implementation of the repository traits
//! using `aws-sdk-dynamodb`. Item conversion and error mapping are pure and
//! tested without a table.

mod conversions;
mod error;
mod repository;

pub use repository::DynamoDbRepository;
