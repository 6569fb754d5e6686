//! Shared Cache Module
//!
//! The single store instance for the process, shared by every request task.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::cache::{CacheEntry, CacheKey, CacheStats, CacheStore};
use crate::dns::ResourceRecord;

/// Thread-safe handle to a `CacheStore`.
///
/// Each method takes the lock exactly once, so `lookup`, `insert`,
/// `insert_all` and `sweep_all` are atomic with respect to each other.
/// Clones share the same store.
#[derive(Debug, Clone, Default)]
pub struct SharedCache {
    inner: Arc<RwLock<CacheStore>>,
}

impl SharedCache {
    pub fn new(store: CacheStore) -> Self {
        Self {
            inner: Arc::new(RwLock::new(store)),
        }
    }

    pub async fn lookup(&self, key: &CacheKey, now: DateTime<Utc>) -> Option<Vec<ResourceRecord>> {
        self.inner.write().await.lookup(key, now)
    }

    pub async fn insert(&self, record: ResourceRecord, now: DateTime<Utc>) -> bool {
        self.inner.write().await.insert(record, now)
    }

    /// Inserts a batch under one lock; returns how many records were new.
    pub async fn insert_all(&self, records: Vec<ResourceRecord>, now: DateTime<Utc>) -> usize {
        if records.is_empty() {
            return 0;
        }
        let mut store = self.inner.write().await;
        records
            .into_iter()
            .map(|record| store.insert(record, now))
            .filter(|is_new| *is_new)
            .count()
    }

    pub async fn sweep_all(&self, now: DateTime<Utc>) -> usize {
        self.inner.write().await.sweep_all(now)
    }

    /// Consistent copy of every entry plus the generation it reflects.
    pub async fn snapshot(&self) -> (Vec<CacheEntry>, u64) {
        let store = self.inner.read().await;
        (store.entries(), store.generation())
    }

    pub async fn generation(&self) -> u64 {
        self.inner.read().await.generation()
    }

    pub async fn stats(&self) -> CacheStats {
        self.inner.read().await.stats()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn record(ttl: u32, last_octet: u8) -> ResourceRecord {
        ResourceRecord {
            name: "example.com.".to_string(),
            record_type: 1,
            dns_class: 1,
            ttl,
            rdata: vec![198, 51, 100, last_octet],
        }
    }

    #[tokio::test]
    async fn test_insert_all_counts_new_records() {
        let cache = SharedCache::default();
        let now = Utc::now();

        let added = cache
            .insert_all(vec![record(60, 1), record(60, 2), record(60, 1)], now)
            .await;

        assert_eq!(added, 2);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_clones_share_store() {
        let cache = SharedCache::default();
        let other = cache.clone();
        let now = Utc::now();

        cache.insert(record(60, 1), now).await;

        assert!(other
            .lookup(&CacheKey::new("EXAMPLE.com", 1), now)
            .await
            .is_some());
    }

    #[tokio::test]
    async fn test_concurrent_inserts_are_not_lost() {
        let cache = SharedCache::default();
        let now = Utc::now();

        let handles: Vec<_> = (0..50u8)
            .map(|i| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.insert(record(60, i), now).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(cache.stats().await.total_records, 50);
    }

    #[tokio::test]
    async fn test_snapshot_reports_generation() {
        let cache = SharedCache::default();
        let now = Utc::now();
        cache.insert(record(10, 1), now).await;

        let (entries, generation) = cache.snapshot().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(generation, cache.generation().await);

        cache.sweep_all(now + TimeDelta::seconds(11)).await;
        assert!(cache.generation().await > generation);
        assert!(cache.is_empty().await);
    }
}
