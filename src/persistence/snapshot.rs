//! Snapshot Format
//!
//! On-disk JSON representation of the cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::{CacheEntry, CacheStore};

/// Bumped whenever the layout below changes incompatibly.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Serialized cache contents.
///
/// Entries keep absolute insertion timestamps, so remaining TTLs after a
/// restart account for the time the process was down.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub entries: Vec<CacheEntry>,
}

impl CacheSnapshot {
    pub fn new(entries: Vec<CacheEntry>, saved_at: DateTime<Utc>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            saved_at,
            entries,
        }
    }

    /// Rebuilds a store from the snapshot's entries.
    pub fn into_store(self) -> CacheStore {
        let mut store = CacheStore::new();
        for entry in self.entries {
            store.insert_entry(entry);
        }
        store
    }
}
