//! Persistence Module
//!
//! Loads the cache at startup and writes it back to disk. Nothing here is
//! ever fatal: a missing or broken snapshot means an empty cache, and a
//! failed save is logged and retried on the next occasion.

mod snapshot;

use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::{CacheEntry, CacheStore, SharedCache};
use crate::error::{ResolverError, Result};

pub use snapshot::{CacheSnapshot, SNAPSHOT_VERSION};

/// Reads and writes the cache snapshot file.
#[derive(Debug)]
pub struct PersistenceManager {
    path: PathBuf,
    /// Serializes writers and remembers the generation last written
    last_saved: Mutex<Option<u64>>,
}

impl PersistenceManager {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_saved: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // == Load ==
    /// Loads the snapshot, degrading to an empty store on any failure.
    pub async fn load(&self) -> CacheStore {
        match self.read_snapshot().await {
            Ok(Some(snapshot)) => {
                let count = snapshot.entries.len();
                let store = snapshot.into_store();
                info!(
                    path = %self.path.display(),
                    records = count,
                    keys = store.len(),
                    "Cache snapshot loaded"
                );
                // The restored store has not diverged from disk yet
                *self.last_saved.lock().await = Some(store.generation());
                store
            }
            Ok(None) => {
                info!(path = %self.path.display(), "No cache snapshot found, starting empty");
                CacheStore::new()
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Cannot load cache snapshot, starting empty");
                CacheStore::new()
            }
        }
    }

    async fn read_snapshot(&self) -> Result<Option<CacheSnapshot>> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ResolverError::Persistence(e.to_string())),
        };

        let snapshot: CacheSnapshot = serde_json::from_slice(&bytes)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(ResolverError::Persistence(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }
        if let Some(entry) = snapshot
            .entries
            .iter()
            .find(|entry| entry.checked_expires_at().is_none())
        {
            return Err(ResolverError::Persistence(format!(
                "entry for {} has an out-of-range timestamp",
                entry.record.name
            )));
        }
        Ok(Some(snapshot))
    }

    // == Save ==
    /// Writes the current cache. Failures are logged, never returned.
    pub async fn save(&self, cache: &SharedCache) {
        let mut last_saved = self.last_saved.lock().await;
        let (entries, generation) = cache.snapshot().await;
        self.save_locked(entries, generation, &mut last_saved).await;
    }

    /// Writes the cache only if it changed since the last successful save.
    ///
    /// Returns true if a snapshot was written.
    pub async fn save_if_dirty(&self, cache: &SharedCache) -> bool {
        let mut last_saved = self.last_saved.lock().await;
        let (entries, generation) = cache.snapshot().await;
        if *last_saved == Some(generation) {
            debug!(generation, "Cache unchanged, skipping snapshot");
            return false;
        }
        self.save_locked(entries, generation, &mut last_saved).await
    }

    async fn save_locked(
        &self,
        entries: Vec<CacheEntry>,
        generation: u64,
        last_saved: &mut Option<u64>,
    ) -> bool {
        match self.write_snapshot(entries).await {
            Ok(count) => {
                *last_saved = Some(generation);
                debug!(path = %self.path.display(), records = count, "Cache snapshot saved");
                true
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Cache saving error");
                false
            }
        }
    }

    // == Write Snapshot ==
    /// Serializes `entries` and atomically replaces the snapshot file.
    ///
    /// Writes to `<path>.tmp` first and renames it over the target, so a
    /// crash mid-write leaves the previous snapshot intact.
    pub async fn write_snapshot(&self, entries: Vec<CacheEntry>) -> Result<usize> {
        let count = entries.len();
        let snapshot = CacheSnapshot::new(entries, Utc::now());
        let data = serde_json::to_vec(&snapshot)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ResolverError::Persistence(e.to_string()))?;
        }

        let temp_path = self.temp_path();
        fs::write(&temp_path, &data)
            .await
            .map_err(|e| ResolverError::Persistence(e.to_string()))?;
        fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| ResolverError::Persistence(e.to_string()))?;

        Ok(count)
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}
