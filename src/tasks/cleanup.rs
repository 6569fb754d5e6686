//! TTL Cleanup Task
//!
//! Background task that periodically sweeps expired records out of the cache,
//! so names nobody asks for again do not linger until the next lookup.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::{Clock, SharedCache};

/// Spawns a background task that periodically removes expired cache entries.
///
/// The task runs in an infinite loop, sleeping for the specified interval
/// between sweeps. Each sweep takes the cache lock once.
///
/// # Arguments
/// * `cache` - Shared handle to the cache
/// * `clock` - Source of "now" for expiry decisions
/// * `cleanup_interval_secs` - Interval in seconds between sweeps
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during shutdown.
///
/// # Example
/// ```ignore
/// let handle = spawn_cleanup_task(cache.clone(), Arc::new(SystemClock), 30);
/// // Later, during shutdown:
/// handle.abort();
/// ```
pub fn spawn_cleanup_task(
    cache: SharedCache,
    clock: Arc<dyn Clock>,
    cleanup_interval_secs: u64,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(cleanup_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting TTL cleanup task with interval of {} seconds",
            cleanup_interval_secs
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = cache.sweep_all(clock.now()).await;

            if removed > 0 {
                let stats = cache.stats().await;
                info!(
                    removed,
                    keys = stats.total_keys,
                    records = stats.total_records,
                    hit_rate = stats.hit_rate(),
                    "TTL cleanup: expired resource records removed"
                );
            } else {
                debug!("TTL cleanup: no expired records found");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheKey, ManualClock};
    use crate::dns::ResourceRecord;
    use chrono::{TimeDelta, Utc};

    fn record(ttl: u32) -> ResourceRecord {
        ResourceRecord {
            name: "expire-soon.example.".to_string(),
            record_type: 1,
            dns_class: 1,
            ttl,
            rdata: vec![10, 9, 8, 7],
        }
    }

    #[tokio::test]
    async fn test_cleanup_task_removes_expired_entries() {
        let clock = ManualClock::new(Utc::now());
        let cache = SharedCache::default();
        cache.insert(record(5), clock.now()).await;

        let handle = spawn_cleanup_task(cache.clone(), Arc::new(clock.clone()), 1);

        clock.advance(TimeDelta::seconds(6));
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert!(cache.is_empty().await, "Expired entry should have been swept");
        assert_eq!(cache.stats().await.expired, 1);

        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_preserves_valid_entries() {
        let clock = ManualClock::new(Utc::now());
        let cache = SharedCache::default();
        cache.insert(record(3600), clock.now()).await;

        let handle = spawn_cleanup_task(cache.clone(), Arc::new(clock.clone()), 1);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert!(cache
            .lookup(&CacheKey::new("expire-soon.example", 1), clock.now())
            .await
            .is_some());

        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_can_be_aborted() {
        let cache = SharedCache::default();
        let handle = spawn_cleanup_task(cache, Arc::new(ManualClock::new(Utc::now())), 1);

        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
