//! Cache Entry Module
//!
//! A cached resource record together with the instant it was recorded.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::dns::ResourceRecord;

// == Cache Entry ==
/// Represents a single cached record with its insertion time.
///
/// Equality ignores `inserted_at`: two entries are the same if their records are.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The cached record, TTL as originally received
    pub record: ResourceRecord,
    /// When the record was observed
    pub inserted_at: DateTime<Utc>,
}

impl CacheEntry {
    // == Constructor ==
    pub fn new(record: ResourceRecord, inserted_at: DateTime<Utc>) -> Self {
        Self {
            record,
            inserted_at,
        }
    }

    // == Expires At ==
    /// Last instant at which the entry is still valid.
    ///
    /// Saturates at the largest representable instant.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.checked_expires_at().unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Expiry instant, or `None` if it falls outside the representable range.
    pub fn checked_expires_at(&self) -> Option<DateTime<Utc>> {
        self.inserted_at
            .checked_add_signed(TimeDelta::seconds(i64::from(self.record.ttl)))
    }

    // == Is Expired ==
    /// Checks if the entry has outlived its TTL.
    ///
    /// Boundary condition: an entry whose age equals its TTL is still valid;
    /// it expires once the age strictly exceeds the TTL.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at()
    }

    // == Remaining TTL ==
    /// Whole seconds of validity left, 0 once expired.
    pub fn remaining_ttl(&self, now: DateTime<Utc>) -> u32 {
        let remaining = (self.expires_at() - now).num_seconds();
        u32::try_from(remaining.max(0)).unwrap_or(u32::MAX)
    }
}

impl PartialEq for CacheEntry {
    fn eq(&self, other: &Self) -> bool {
        self.record == other.record
    }
}

impl Eq for CacheEntry {}
