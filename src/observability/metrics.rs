//! Counters for cached loads.
//!
//! Handlers report each load through the loader; a dashboard status endpoint
//! can serialize [`LoaderMetrics::snapshot`] as-is.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shared counters for a [`CachedLoader`](crate::loader::CachedLoader).
#[derive(Debug, Clone, Default)]
pub struct LoaderMetrics {
    cache_hits_total: Arc<AtomicU64>,
    cache_misses_total: Arc<AtomicU64>,
    load_failures_total: Arc<AtomicU64>,
}

/// Point-in-time copy of [`LoaderMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LoaderMetricsSnapshot {
    pub cache_hits_total: u64,
    pub cache_misses_total: u64,
    pub load_failures_total: u64,
    pub cache_hit_rate: f64,
}

impl LoaderMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a cache lookup.
    pub fn track_cache_access(&self, key: &str, hit: bool) {
        if hit {
            self.cache_hits_total.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(key = %key, "Cache hit");
        } else {
            self.cache_misses_total.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(key = %key, "Cache miss");
        }
    }

    /// Track a load whose operation failed.
    pub fn track_load_failure(&self, key: &str) {
        self.load_failures_total.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(key = %key, "Load failed, nothing cached");
    }

    pub fn cache_hits_total(&self) -> u64 {
        self.cache_hits_total.load(Ordering::Relaxed)
    }

    pub fn cache_misses_total(&self) -> u64 {
        self.cache_misses_total.load(Ordering::Relaxed)
    }

    pub fn load_failures_total(&self) -> u64 {
        self.load_failures_total.load(Ordering::Relaxed)
    }

    /// Cache hit rate as a percentage (0-100).
    pub fn cache_hit_rate(&self) -> f64 {
        let hits = self.cache_hits_total();
        let total = hits + self.cache_misses_total();

        if total == 0 {
            0.0
        } else {
            (hits as f64 / total as f64) * 100.0
        }
    }

    pub fn snapshot(&self) -> LoaderMetricsSnapshot {
        LoaderMetricsSnapshot {
            cache_hits_total: self.cache_hits_total(),
            cache_misses_total: self.cache_misses_total(),
            load_failures_total: self.load_failures_total(),
            cache_hit_rate: self.cache_hit_rate(),
        }
    }
}
