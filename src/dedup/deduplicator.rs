//! Collapses concurrent calls for the same key into one execution.
//!
//! The first caller for a key spawns the operation and registers a shared
//! handle to its outcome. Callers arriving before it settles await that same
//! handle. The entry is removed by the operation's own task as it finishes,
//! so by the time any waiter sees the result the key is free again and the
//! next call starts fresh work.

use crate::config::Config;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::Instant;
use tracing::{debug, info};

/// Configuration for request deduplication.
#[derive(Clone, Debug)]
pub struct DeduplicationConfig {
    /// How long a pending request may stay in flight before new callers stop
    /// joining it and start over.
    pub max_in_flight: Duration,
    /// Whether deduplication is enabled. When disabled every call runs its
    /// operation directly.
    pub enabled: bool,
}

impl Default for DeduplicationConfig {
    fn default() -> Self {
        Self {
            max_in_flight: Duration::from_secs(30),
            enabled: true,
        }
    }
}

impl From<&Config> for DeduplicationConfig {
    fn from(config: &Config) -> Self {
        Self {
            max_in_flight: config.dedup_max_in_flight,
            enabled: config.dedup_enabled,
        }
    }
}

/// Snapshot of the pending-request map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeduplicationStats {
    pub pending_requests: usize,
    /// Entries older than the in-flight limit that have not been swept yet.
    pub stale_requests: usize,
}

/// What waiters receive: the operation's own result, or the message of the
/// panic that ended it.
type Settled<T, E> = Result<Result<T, E>, Arc<str>>;

type SharedOutcome<T, E> = Shared<BoxFuture<'static, Settled<T, E>>>;

pub(crate) struct PendingEntry<T, E> {
    id: u64,
    outcome: SharedOutcome<T, E>,
    started_at: Instant,
}

impl<T, E> PendingEntry<T, E> {
    fn is_stale(&self, now: Instant, max_in_flight: Duration) -> bool {
        now.duration_since(self.started_at) >= max_in_flight
    }
}

pub(crate) struct PendingMap<T, E> {
    entries: HashMap<String, PendingEntry<T, E>>,
    next_id: u64,
}

/// Removed entries are handed back to the caller so they are dropped after
/// the lock is released. Dropping the last handle to an operation that is
/// driven by its waiters runs its [`SettleGuard`], which takes the lock.
pub(crate) type Removed<T, E> = Vec<PendingEntry<T, E>>;

impl<T, E> PendingMap<T, E> {
    pub(crate) fn remove_stale(&mut self, max_in_flight: Duration) -> Removed<T, E> {
        let now = Instant::now();
        let stale: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_stale(now, max_in_flight))
            .map(|(key, _)| key.clone())
            .collect();

        stale
            .iter()
            .filter_map(|key| self.entries.remove(key))
            .collect()
    }
}

pub(crate) fn lock<T, E>(pending: &Mutex<PendingMap<T, E>>) -> MutexGuard<'_, PendingMap<T, E>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

fn panic_message(payload: Box<dyn Any + Send>) -> Arc<str> {
    if let Some(message) = payload.downcast_ref::<&str>() {
        Arc::from(*message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        Arc::from(message.as_str())
    } else {
        Arc::from("non-string panic payload")
    }
}

/// Removes a pending entry when the operation that owns it finishes.
///
/// Only the entry with the matching id is removed, so an operation that was
/// superseded (stale or cleared) cannot evict its replacement. Runs on drop,
/// which covers success, failure and panics alike.
struct SettleGuard<T, E> {
    pending: Option<Weak<Mutex<PendingMap<T, E>>>>,
    key: String,
    id: u64,
}

impl<T, E> SettleGuard<T, E> {
    /// Call `commit` and remove the entry, both under the pending lock, if
    /// this run still owns the key.
    fn settle(&mut self, commit: impl FnOnce()) {
        let Some(pending) = self.pending.take().and_then(|weak| weak.upgrade()) else {
            return;
        };
        let mut map = lock(&pending);
        if !map
            .entries
            .get(&self.key)
            .is_some_and(|entry| entry.id == self.id)
        {
            debug!(key = %self.key, "Superseded request settled");
            return;
        }

        commit();
        let removed = map.entries.remove(&self.key);
        drop(map);
        drop(removed);
        debug!(key = %self.key, "In-flight request settled");
    }
}

impl<T, E> Drop for SettleGuard<T, E> {
    fn drop(&mut self) {
        self.settle(|| {});
    }
}

/// Request deduplicator.
///
/// `N` concurrent calls for key `K` run the operation once and all receive
/// the same `Result`. Both `T` and `E` are cloned out to every waiter; wrap a
/// non-`Clone` error in `Arc` to share it.
///
/// Once invoked, an operation runs to completion on the tokio runtime even if
/// every caller stops waiting. The in-flight limit only decides whether a new
/// call joins an existing entry; it never aborts the operation already running. If
/// the operation panics, every waiter panics with the same message.
///
/// Clones share the same pending-request map.
pub struct RequestDeduplicator<T, E> {
    pending: Arc<Mutex<PendingMap<T, E>>>,
    config: DeduplicationConfig,
}

impl<T, E> Clone for RequestDeduplicator<T, E> {
    fn clone(&self) -> Self {
        Self {
            pending: Arc::clone(&self.pending),
            config: self.config.clone(),
        }
    }
}

impl<T, E> Default for RequestDeduplicator<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(DeduplicationConfig::default())
    }
}

impl<T, E> RequestDeduplicator<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new(config: DeduplicationConfig) -> Self {
        Self {
            pending: Arc::new(Mutex::new(PendingMap {
                entries: HashMap::new(),
                next_id: 0,
            })),
            config,
        }
    }

    /// Run `operation` for `key` unless an identical request is already in flight.
    ///
    /// If a live entry exists its outcome is awaited and `operation` is never
    /// called. Otherwise `operation` is invoked exactly once and its outcome
    /// becomes the entry that later callers join. Errors from `operation` are
    /// returned unchanged to every joined caller.
    pub async fn deduplicate<F, Fut>(&self, key: impl Into<String>, operation: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        self.deduplicate_with_commit(key, operation, |_| {}).await
    }

    /// Like [`deduplicate`](Self::deduplicate), and hands the result to
    /// `commit` before any waiter sees it.
    ///
    /// `commit` runs under the pending lock and only while this run still owns
    /// `key`: a run that was cleared or replaced as stale skips it. Keep it
    /// short and never call back into the deduplicator from it.
    pub(crate) async fn deduplicate_with_commit<F, Fut, C>(
        &self,
        key: impl Into<String>,
        operation: F,
        commit: C,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        C: FnOnce(&Result<T, E>) + Send + 'static,
    {
        if !self.config.enabled {
            let result = operation().await;
            commit(&result);
            return result;
        }

        let outcome = self.join_or_start(key.into(), operation, commit);
        match outcome.await {
            Ok(result) => result,
            Err(reason) => panic!("In-flight request panicked: {}", reason),
        }
    }

    /// Look up and register under one lock, with no suspension point in between.
    fn join_or_start<F, Fut, C>(&self, key: String, operation: F, commit: C) -> SharedOutcome<T, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        C: FnOnce(&Result<T, E>) + Send + 'static,
    {
        let mut pending = lock(&self.pending);
        let now = Instant::now();

        if let Some(entry) = pending.entries.get(&key) {
            if !entry.is_stale(now, self.config.max_in_flight) {
                debug!(key = %key, "Joining in-flight request");
                return entry.outcome.clone();
            }
            debug!(
                key = %key,
                age_ms = now.duration_since(entry.started_at).as_millis() as u64,
                "Discarding stale in-flight request"
            );
        }

        let id = pending.next_id;
        pending.next_id += 1;

        // The guard only exists once the work is first polled, which never
        // happens while this lock is held.
        let weak = Arc::downgrade(&self.pending);
        let guard_key = key.clone();
        let work = async move {
            let mut guard = SettleGuard {
                pending: Some(weak),
                key: guard_key,
                id,
            };
            let result = operation().await;
            guard.settle(|| commit(&result));
            result
        };

        let outcome = match Handle::try_current() {
            Ok(handle) => {
                let task = handle.spawn(work);
                async move {
                    task.await.map_err(|err| match err.try_into_panic() {
                        Ok(payload) => panic_message(payload),
                        Err(err) => Arc::from(err.to_string()),
                    })
                }
                .boxed()
                .shared()
            }
            // Outside a tokio runtime the operation is driven by its waiters.
            Err(_) => AssertUnwindSafe(work)
                .catch_unwind()
                .map(|settled| settled.map_err(panic_message))
                .boxed()
                .shared(),
        };

        debug!(key = %key, "Starting new request");
        let replaced = pending.entries.insert(
            key,
            PendingEntry {
                id,
                outcome: outcome.clone(),
                started_at: now,
            },
        );
        drop(pending);
        drop(replaced);

        outcome
    }

    /// Drop the pending entry for `key`, or every entry when `key` is `None`.
    ///
    /// Callers already waiting still receive their outcome; the next call for
    /// a cleared key starts a new operation.
    pub fn clear(&self, key: Option<&str>) {
        let mut pending = lock(&self.pending);
        let removed: Removed<T, E> = match key {
            Some(key) => pending.entries.remove(key).into_iter().collect(),
            None => pending.entries.drain().map(|(_, entry)| entry).collect(),
        };
        drop(pending);

        match key {
            Some(key) if !removed.is_empty() => info!(key = %key, "Cleared in-flight request"),
            Some(_) => {}
            None => info!(count = removed.len(), "Request deduplicator cleared"),
        }
    }

    /// Remove every entry older than the in-flight limit. Returns how many went.
    pub fn clear_expired(&self) -> usize {
        let removed = lock(&self.pending).remove_stale(self.config.max_in_flight);
        if !removed.is_empty() {
            debug!(removed = removed.len(), "Removed stale in-flight requests");
        }
        removed.len()
    }

    /// Whether a live (non-stale) entry exists for `key`.
    pub fn contains(&self, key: &str) -> bool {
        let now = Instant::now();
        lock(&self.pending)
            .entries
            .get(key)
            .is_some_and(|entry| !entry.is_stale(now, self.config.max_in_flight))
    }

    /// Number of registered entries, stale ones included.
    pub fn len(&self) -> usize {
        lock(&self.pending).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> DeduplicationStats {
        let now = Instant::now();
        let pending = lock(&self.pending);
        let stale_requests = pending
            .entries
            .values()
            .filter(|entry| entry.is_stale(now, self.config.max_in_flight))
            .count();

        DeduplicationStats {
            pending_requests: pending.entries.len(),
            stale_requests,
        }
    }

    pub fn config(&self) -> &DeduplicationConfig {
        &self.config
    }

    pub(crate) fn downgrade(&self) -> Weak<Mutex<PendingMap<T, E>>> {
        Arc::downgrade(&self.pending)
    }
}

impl<T, E> std::fmt::Debug for RequestDeduplicator<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestDeduplicator")
            .field("config", &self.config)
            .field("pending", &lock(&self.pending).entries.len())
            .finish()
    }
}
