//! Periodic removal of stale in-flight entries.
//!
//! The deduplicator owns no timer. Callers that want stale entries swept in
//! the background opt in by spawning this task.

use crate::dedup::deduplicator::{lock, RequestDeduplicator};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Spawn a task that calls the equivalent of
/// [`RequestDeduplicator::clear_expired`] every `every`.
///
/// The task holds only a weak reference and exits on its own once every
/// handle to the deduplicator has been dropped. Abort the returned handle to
/// stop it sooner.
///
/// # Panics
///
/// Panics if called outside a tokio runtime or if `every` is zero.
pub fn spawn_expiry_sweeper<T, E>(dedup: &RequestDeduplicator<T, E>, every: Duration) -> JoinHandle<()>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    let pending = dedup.downgrade();
    let max_in_flight = dedup.config().max_in_flight;

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let Some(pending) = pending.upgrade() else {
                debug!("Deduplicator dropped, stopping expiry sweeper");
                break;
            };
            let removed = lock(&pending).remove_stale(max_in_flight);
            drop(pending);

            if !removed.is_empty() {
                debug!(removed = removed.len(), "Swept stale in-flight requests");
            }
        }
    })
}
