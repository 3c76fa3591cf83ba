//! Key-value cache with read-time freshness checks.
//!
//! Entries carry the instant they were written and nothing else. How old an
//! entry may be is decided by whoever reads it, so two handlers can share one
//! cached value while holding it to different TTLs.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::time::Instant;

/// A cached value together with the instant it was written.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<V> {
    key: String,
    value: V,
    stored_at: Instant,
}

impl<V> CacheEntry<V> {
    fn new(key: String, value: V) -> Self {
        Self {
            key,
            value,
            stored_at: Instant::now(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn into_value(self) -> V {
        self.value
    }

    /// When this entry was written. Never changes for the life of the entry.
    pub fn stored_at(&self) -> Instant {
        self.stored_at
    }

    /// Time elapsed since the entry was written.
    pub fn age(&self) -> Duration {
        self.stored_at.elapsed()
    }

    /// Whether the entry is younger than `ttl`.
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.age() < ttl
    }
}

/// Returns `false` for a missing entry, otherwise whether it is younger than `ttl`.
///
/// An entry is fresh while `now - stored_at < ttl`; at exactly `ttl` it is stale.
pub fn is_fresh<V>(entry: Option<&CacheEntry<V>>, ttl: Duration) -> bool {
    entry.is_some_and(|entry| entry.is_fresh(ttl))
}

/// A process-local cache keyed by composite strings.
///
/// There is no eviction, no size limit and no background sweep: entries stay
/// until they are overwritten, deleted or the cache is cleared. Clones share
/// the same underlying map.
///
/// ```
/// use dashboard_cache::cache::{is_fresh, TtlCache};
/// use std::time::Duration;
///
/// let cache = TtlCache::new();
/// cache.set("files:42", vec!["a.pdf".to_string()]);
///
/// let entry = cache.get("files:42");
/// assert!(is_fresh(entry.as_ref(), Duration::from_secs(60)));
/// ```
#[derive(Clone)]
pub struct TtlCache<V>
where
    V: Clone,
{
    entries: Arc<RwLock<HashMap<String, CacheEntry<V>>>>,
}

impl<V> TtlCache<V>
where
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Look up an entry without touching it.
    pub fn get(&self, key: &str) -> Option<CacheEntry<V>> {
        let entries = self.entries.read().ok()?;
        entries.get(key).cloned()
    }

    /// Look up a value and return it only if it is younger than `ttl`.
    pub fn get_fresh(&self, key: &str, ttl: Duration) -> Option<V> {
        self.get(key)
            .filter(|entry| entry.is_fresh(ttl))
            .map(CacheEntry::into_value)
    }

    /// Store a value, replacing any existing entry for `key` outright.
    pub fn set(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        let entry = CacheEntry::new(key.clone(), value);

        if let Ok(mut entries) = self.entries.write() {
            entries.insert(key, entry);
        }
    }

    /// Remove the entry for `key`, if any.
    pub fn delete(&self, key: &str) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(key);
        }
    }

    /// Remove every entry.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }

    /// Snapshot of the keys currently stored, stale ones included.
    pub fn keys(&self) -> Vec<String> {
        match self.entries.read() {
            Ok(entries) => entries.keys().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Number of stored entries, stale ones included.
    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V> Default for TtlCache<V>
where
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> std::fmt::Debug for TtlCache<V>
where
    V: Clone,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("entries", &self.len())
            .finish()
    }
}
