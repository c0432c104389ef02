use std::time::Duration;

use crate::retry::RetryConfig;

const DEFAULT_TABLE_NAME: &str = "learnbyshorts-data";
const DEFAULT_INDEX_NAME: &str = "GSI1";
const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_SESSION_TTL_DAYS: i64 = 7;

/// Where the single table lives.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    /// Table name (default: "learnbyshorts-data")
    pub table_name: String,
    /// Secondary index used for identity lookups (default: "GSI1")
    pub index_name: String,
    /// Custom endpoint, e.g. DynamoDB Local
    pub endpoint_url: Option<String>,
    /// AWS region (default: "us-east-1")
    pub region: String,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub store: StoreConfig,
    /// Session lifetime in days (default: 7)
    pub session_ttl_days: i64,
    /// Backoff and per-attempt timeout for store calls.
    pub retry: RetryConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `DYNAMODB_TABLE_NAME` - Table name (default: "learnbyshorts-data")
    /// - `DYNAMODB_INDEX_NAME` - Identity index name (default: "GSI1")
    /// - `AWS_ENDPOINT_URL` - Custom DynamoDB endpoint (optional)
    /// - `AWS_REGION` - AWS region (default: "us-east-1")
    /// - `SESSION_TTL_DAYS` - Session lifetime in days (default: 7)
    /// - `STORE_RETRY_ATTEMPTS` - Retries after the first attempt (default: 3)
    /// - `STORE_RETRY_BASE_DELAY_MS` - Backoff base delay (default: 100)
    /// - `STORE_TIMEOUT_MS` - Per-attempt timeout (default: 5000)
    ///
    /// Unparsable values fall back to the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::from_env`] with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());
        let retry_defaults = RetryConfig::default();

        Self {
            store: StoreConfig {
                table_name: lookup("DYNAMODB_TABLE_NAME")
                    .filter(|v| !v.is_empty())
                    .unwrap_or_else(|| DEFAULT_TABLE_NAME.to_string()),
                index_name: lookup("DYNAMODB_INDEX_NAME")
                    .filter(|v| !v.is_empty())
                    .unwrap_or_else(|| DEFAULT_INDEX_NAME.to_string()),
                endpoint_url: lookup("AWS_ENDPOINT_URL").filter(|v| !v.is_empty()),
                region: lookup("AWS_REGION")
                    .filter(|v| !v.is_empty())
                    .unwrap_or_else(|| DEFAULT_REGION.to_string()),
            },
            session_ttl_days: parsed("SESSION_TTL_DAYS")
                .filter(|days| *days > 0)
                .map(|days| days as i64)
                .unwrap_or(DEFAULT_SESSION_TTL_DAYS),
            retry: RetryConfig {
                max_attempts: parsed("STORE_RETRY_ATTEMPTS")
                    .map(|n| n.min(u32::MAX as u64) as u32)
                    .unwrap_or(retry_defaults.max_attempts),
                base_delay: parsed("STORE_RETRY_BASE_DELAY_MS")
                    .map(Duration::from_millis)
                    .unwrap_or(retry_defaults.base_delay),
                attempt_timeout: parsed("STORE_TIMEOUT_MS")
                    .filter(|ms| *ms > 0)
                    .map(Duration::from_millis)
                    .unwrap_or(retry_defaults.attempt_timeout),
                ..retry_defaults
            },
        }
    }

    /// Session lifetime as a chrono Duration.
    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.session_ttl_days)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl StoreConfig {
    /// Returns a display string for the target environment.
    pub fn target_display(&self) -> String {
        match &self.endpoint_url {
            Some(url) => format!("{} on local DynamoDB ({})", self.table_name, url),
            None => format!("{} on AWS DynamoDB (region: {})", self.table_name, self.region),
        }
    }
}
