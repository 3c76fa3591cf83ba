//! Error types for the dashboard cache layer.
//!
//! Neither the cache nor the deduplicator surfaces errors of its own on the
//! request path. These types cover configuration loading and the
//! serialization step behind the JSON cache helpers.

use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Environment variable has invalid value
    #[error("Invalid value for {var}: {reason}")]
    InvalidValue { var: String, reason: String },

    /// Failed to load .env file
    #[error("Failed to load .env file: {0}")]
    DotenvError(String),
}

/// Errors raised while encoding or decoding cached payloads.
///
/// These never reach callers of the JSON helpers; they are logged and the
/// operation degrades to a miss or a skipped write.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Failed to serialize cache value: {0}")]
    Serialization(#[source] serde_json::Error),

    #[error("Failed to deserialize cache value: {0}")]
    Deserialization(#[source] serde_json::Error),
}

/// Convenience type alias for Results with ConfigError
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Convenience type alias for Results with CacheError
pub type CacheResult<T> = Result<T, CacheError>;
