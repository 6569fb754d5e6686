//! Snapshot Task
//!
//! Debounced persistence: writes the cache at most once per interval, and
//! only when it changed. The final save on shutdown is done by the caller.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use crate::cache::SharedCache;
use crate::persistence::PersistenceManager;

/// Spawns a task that saves the cache every `interval_secs` if it is dirty.
pub fn spawn_persist_task(
    cache: SharedCache,
    persistence: Arc<PersistenceManager>,
    interval_secs: u64,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            path = %persistence.path().display(),
            "Starting snapshot task with interval of {} seconds",
            interval_secs
        );

        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately; nothing has changed yet
        ticker.tick().await;

        loop {
            ticker.tick().await;
            persistence.save_if_dirty(&cache).await;
        }
    })
}
