//! Read-through loading for request handlers.
//!
//! Packages the usual handler sequence: look in the cache, and on a miss or
//! a stale entry run the fetch once no matter how many requests ask for it,
//! then store the result. Failed fetches are never cached.

use crate::cache::TtlCache;
use crate::config::Config;
use crate::dedup::{DeduplicationConfig, RequestDeduplicator};
use crate::observability::LoaderMetrics;
use std::future::Future;
use std::time::Duration;

/// A [`TtlCache`] in front of a [`RequestDeduplicator`].
///
/// ```no_run
/// use dashboard_cache::{cache_key, CachedLoader, Config};
///
/// # async fn fetch_alerts(_: u32) -> Result<Vec<String>, String> { Ok(vec![]) }
/// # async fn handler() -> Result<(), String> {
/// let loader: CachedLoader<Vec<String>, String> = CachedLoader::new(&Config::default());
/// let agent_id = 12;
/// let alerts = loader
///     .load(&cache_key!["alerts", agent_id], None, move || fetch_alerts(agent_id))
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct CachedLoader<T, E>
where
    T: Clone,
{
    cache: TtlCache<T>,
    dedup: RequestDeduplicator<T, E>,
    default_ttl: Duration,
    metrics: LoaderMetrics,
}

impl<T, E> Clone for CachedLoader<T, E>
where
    T: Clone,
{
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            dedup: self.dedup.clone(),
            default_ttl: self.default_ttl,
            metrics: self.metrics.clone(),
        }
    }
}

impl<T, E> CachedLoader<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new(config: &Config) -> Self {
        Self::with_parts(
            TtlCache::new(),
            RequestDeduplicator::new(DeduplicationConfig::from(config)),
            config.cache_default_ttl,
        )
    }

    /// Build a loader around existing components, e.g. a cache shared with
    /// other handlers.
    pub fn with_parts(
        cache: TtlCache<T>,
        dedup: RequestDeduplicator<T, E>,
        default_ttl: Duration,
    ) -> Self {
        Self {
            cache,
            dedup,
            default_ttl,
            metrics: LoaderMetrics::new(),
        }
    }

    /// Return the cached value for `key` if it is younger than `ttl`
    /// (the configured default when `None`), otherwise run `operation`.
    ///
    /// Concurrent misses for the same key share one run of `operation`. A
    /// successful result is cached before any waiter sees it; an error is
    /// returned to every waiter and leaves the cache untouched.
    pub async fn load<F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        operation: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let ttl = ttl.unwrap_or(self.default_ttl);

        if let Some(value) = self.cache.get_fresh(key, ttl) {
            self.metrics.track_cache_access(key, true);
            return Ok(value);
        }
        self.metrics.track_cache_access(key, false);

        let cache = self.cache.clone();
        let cache_key = key.to_string();
        // A load that was invalidated or replaced while running must not
        // overwrite what its successor stores.
        let result = self
            .dedup
            .deduplicate_with_commit(key, operation, move |result| {
                if let Ok(value) = result {
                    cache.set(cache_key, value.clone());
                }
            })
            .await;

        if result.is_err() {
            self.metrics.track_load_failure(key);
        }
        result
    }

    /// Forget the cached value and any in-flight load for `key`.
    ///
    /// Call after a write that changes what `key` would load. A load already
    /// running for `key` still answers its own waiters but no longer writes
    /// to the cache.
    pub fn invalidate(&self, key: &str) {
        // Clear first: a load committing before the clear is then deleted below.
        self.dedup.clear(Some(key));
        self.cache.delete(key);
    }

    pub fn cache(&self) -> &TtlCache<T> {
        &self.cache
    }

    pub fn deduplicator(&self) -> &RequestDeduplicator<T, E> {
        &self.dedup
    }

    pub fn metrics(&self) -> &LoaderMetrics {
        &self.metrics
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }
}

impl<T, E> std::fmt::Debug for CachedLoader<T, E>
where
    T: Clone,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedLoader")
            .field("cache", &self.cache)
            .field("dedup", &self.dedup)
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}
