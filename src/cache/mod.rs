//! Caching utilities for the dashboard backend.
//!
//! A string-keyed cache whose freshness is judged by the reader, plus helpers
//! for building composite keys and storing JSON payloads.

pub mod json;
pub mod key;
pub mod ttl_cache;

pub use json::JsonCache;
pub use key::{build_key, KeyPart, KEY_DELIMITER};
pub use ttl_cache::{is_fresh, CacheEntry, TtlCache};
