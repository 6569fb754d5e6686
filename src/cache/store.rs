//! Cache Store Module
//!
//! Main cache engine: per-key record sets with TTL expiry, backed by a
//! min-heap of expiry marks so a sweep only touches what actually expired.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use chrono::{DateTime, Utc};

use crate::cache::{CacheEntry, CacheKey, CacheStats};
use crate::dns::ResourceRecord;

/// Stale marks tolerated on top of twice the live record count before the
/// expiry heap is rebuilt.
const EXPIRY_SLACK: usize = 64;

/// Identity of a record within its key.
///
/// TTL and owner-name case are left out: upstreams hand back the same record
/// with a decremented TTL on every answer, and those are one record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct RecordId {
    dns_class: u16,
    rdata: Vec<u8>,
}

impl RecordId {
    fn of(record: &ResourceRecord) -> Self {
        Self {
            dns_class: record.dns_class,
            rdata: record.rdata.clone(),
        }
    }
}

/// Heap element: one record scheduled to expire at `expires_at`.
///
/// Marks are never removed eagerly. A mark whose record was already dropped
/// or replaced by a newer observation is stale and ignored when popped.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct ExpiryMark {
    expires_at: DateTime<Utc>,
    inserted_at: DateTime<Utc>,
    key: CacheKey,
    id: RecordId,
}

// == Cache Store ==
/// TTL-bound record cache keyed by (lowercased name, type).
///
/// There is no capacity bound: the number of keys grows with the set of
/// names observed and only TTL expiry removes entries. A deployment exposed
/// to untrusted clients should put a size cap in front of this.
#[derive(Debug, Default)]
pub struct CacheStore {
    /// Record sets; each record keeps its latest observation
    entries: HashMap<CacheKey, HashMap<RecordId, CacheEntry>>,
    /// Expiry schedule, earliest first
    expiry: BinaryHeap<Reverse<ExpiryMark>>,
    /// Number of records across all keys
    records: usize,
    /// Performance statistics
    stats: CacheStats,
    /// Bumped on every change to the stored data
    generation: u64,
}

impl CacheStore {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Insert ==
    /// Records `record` as observed at `now`.
    ///
    /// A record already cached under the same key with the same class and
    /// RDATA is replaced by the newer observation (its TTL included) rather
    /// than stored twice. Returns true if the record was not cached before.
    pub fn insert(&mut self, record: ResourceRecord, now: DateTime<Utc>) -> bool {
        self.insert_entry(CacheEntry::new(record, now))
    }

    // == Insert Entry ==
    /// Inserts an entry keeping its own timestamp (used when restoring a snapshot).
    ///
    /// When the record is already cached the later observation wins; on equal
    /// timestamps the cached one is kept.
    pub fn insert_entry(&mut self, entry: CacheEntry) -> bool {
        let key = CacheKey::for_record(&entry.record);
        let id = RecordId::of(&entry.record);
        let expires_at = entry.expires_at();
        let inserted_at = entry.inserted_at;
        let set = self.entries.entry(key.clone()).or_default();

        let (is_new, changed) = match set.get_mut(&id) {
            Some(existing) if existing.inserted_at >= inserted_at => (false, false),
            Some(existing) => {
                *existing = entry;
                (false, true)
            }
            None => {
                set.insert(id.clone(), entry);
                (true, true)
            }
        };

        if is_new {
            self.records += 1;
            self.stats.record_insert();
        }
        if changed {
            self.expiry.push(Reverse(ExpiryMark {
                expires_at,
                inserted_at,
                key,
                id,
            }));
            self.generation += 1;
            self.compact_expiry();
        }

        is_new
    }

    // == Lookup ==
    /// Returns the valid records cached under `key`.
    ///
    /// Expired records for the key are purged first. Returned records carry
    /// their remaining TTL. `None` means a miss: the key is unknown or all of
    /// its records have expired.
    pub fn lookup(&mut self, key: &CacheKey, now: DateTime<Utc>) -> Option<Vec<ResourceRecord>> {
        let removed = match self.entries.get_mut(key) {
            Some(set) => {
                let before = set.len();
                set.retain(|_, entry| !entry.is_expired(now));
                before - set.len()
            }
            None => 0,
        };

        if removed > 0 {
            self.records -= removed;
            self.stats.record_expired(removed);
            self.generation += 1;
        }

        if self.entries.get(key).is_some_and(HashMap::is_empty) {
            self.entries.remove(key);
        }

        let records: Vec<ResourceRecord> = self
            .entries
            .get(key)
            .map(|set| {
                set.values()
                    .map(|entry| entry.record.with_ttl(entry.remaining_ttl(now)))
                    .collect()
            })
            .unwrap_or_default();

        if records.is_empty() {
            self.stats.record_miss();
            None
        } else {
            self.stats.record_hit();
            Some(records)
        }
    }

    // == Sweep All ==
    /// Removes every entry whose age exceeds its TTL.
    ///
    /// Cost is proportional to the number of expiry marks that are due, not
    /// to the size of the cache. Returns the number of records removed.
    pub fn sweep_all(&mut self, now: DateTime<Utc>) -> usize {
        let mut removed = 0;

        while let Some(Reverse(mark)) = self.expiry.peek() {
            if mark.expires_at >= now {
                break;
            }
            let Some(Reverse(mark)) = self.expiry.pop() else {
                break;
            };

            let Some(set) = self.entries.get_mut(&mark.key) else {
                continue;
            };
            if set
                .get(&mark.id)
                .is_some_and(|entry| entry.inserted_at == mark.inserted_at)
            {
                set.remove(&mark.id);
                removed += 1;
            }
            if set.is_empty() {
                self.entries.remove(&mark.key);
            }
        }

        if removed > 0 {
            self.records -= removed;
            self.stats.record_expired(removed);
            self.generation += 1;
        }
        removed
    }

    /// Rebuilds the expiry heap from the live entries once stale marks
    /// outnumber them.
    fn compact_expiry(&mut self) {
        if self.expiry.len() <= 2 * self.records + EXPIRY_SLACK {
            return;
        }
        self.expiry = self
            .entries
            .iter()
            .flat_map(|(key, set)| {
                set.iter().map(move |(id, entry)| {
                    Reverse(ExpiryMark {
                        expires_at: entry.expires_at(),
                        inserted_at: entry.inserted_at,
                        key: key.clone(),
                        id: id.clone(),
                    })
                })
            })
            .collect();
    }

    // == Entries ==
    /// All cached entries, expired or not, in no particular order.
    pub fn entries(&self) -> Vec<CacheEntry> {
        self.entries
            .values()
            .flat_map(|set| set.values().cloned())
            .collect()
    }

    /// Entries cached under one key, without expiring anything.
    pub fn entries_for(&self, key: &CacheKey) -> Vec<CacheEntry> {
        self.entries
            .get(key)
            .map(|set| set.values().cloned().collect())
            .unwrap_or_default()
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_sizes(self.len(), self.record_count());
        stats
    }

    /// Mutation counter, used to decide whether a snapshot is stale.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    // == Length ==
    /// Returns the number of keys in the cache.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns the number of records across all keys.
    pub fn record_count(&self) -> usize {
        self.records
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }
}
