//! Request deduplication.
//!
//! Concurrent callers asking for the same key share one execution of the
//! underlying operation and all observe its outcome.

pub mod deduplicator;
pub mod sweeper;

pub use deduplicator::{DeduplicationConfig, DeduplicationStats, RequestDeduplicator};
pub use sweeper::spawn_expiry_sweeper;
