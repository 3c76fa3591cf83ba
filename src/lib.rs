//! Dashboard Cache - request-level caching for the admin dashboard backend.
//!
//! Handlers for files, replies and alerts read from a managed document store.
//! This crate keeps them from repeating that work: a TTL cache for recently
//! fetched values and a deduplicator that lets concurrent identical requests
//! share one fetch.
//!
//! # Architecture
//!
//! - **cache**: String-keyed cache with caller-supplied freshness, composite key building
//! - **dedup**: In-flight request deduplication and an opt-in stale-entry sweeper
//! - **loader**: Read-through loading that combines the two for handlers
//! - **config**: Configuration management from environment variables
//! - **error**: Error types for configuration and payload serialization
//! - **observability**: Logging setup and load metrics

pub mod cache;
pub mod config;
pub mod dedup;
pub mod error;
pub mod loader;
pub mod observability;

pub use cache::{build_key, is_fresh, CacheEntry, JsonCache, KeyPart, TtlCache};
pub use config::Config;
pub use dedup::{
    spawn_expiry_sweeper, DeduplicationConfig, DeduplicationStats, RequestDeduplicator,
};
pub use error::{CacheError, ConfigError};
pub use loader::CachedLoader;
pub use observability::{init_tracing, LoaderMetrics, LoaderMetricsSnapshot};
