//! Cache Key Module
//!
//! DNS names compare case-insensitively, so keys are normalized once on
//! construction: lowercase ASCII, always fully qualified.

use std::fmt;

use hickory_proto::rr::RecordType;
use serde::{Deserialize, Serialize};

use crate::dns::ResourceRecord;

// == Cache Key ==
/// Identifies one RRset: (normalized owner name, record type).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    name: String,
    record_type: u16,
}

impl CacheKey {
    /// Creates a key, normalizing the name.
    pub fn new(name: &str, record_type: u16) -> Self {
        Self {
            name: normalize_name(name),
            record_type,
        }
    }

    /// Key under which a record is stored.
    pub fn for_record(record: &ResourceRecord) -> Self {
        Self::new(&record.name, record.record_type)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn record_type(&self) -> u16 {
        self.record_type
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, RecordType::from(self.record_type))
    }
}

fn normalize_name(name: &str) -> String {
    let mut normalized = name.trim().to_ascii_lowercase();
    if !normalized.ends_with('.') {
        normalized.push('.');
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_case_insensitive() {
        assert_eq!(CacheKey::new("Example.com", 1), CacheKey::new("example.com", 1));
        assert_eq!(CacheKey::new("EXAMPLE.COM.", 1), CacheKey::new("example.com", 1));
    }

    #[test]
    fn test_key_distinguishes_type() {
        assert_ne!(CacheKey::new("example.com", 1), CacheKey::new("example.com", 28));
    }

    #[test]
    fn test_root_name() {
        assert_eq!(CacheKey::new(".", 2).name(), ".");
        assert_eq!(CacheKey::new("", 2).name(), ".");
    }

    #[test]
    fn test_display() {
        assert_eq!(CacheKey::new("Example.com", 1).to_string(), "example.com. A");
    }
}
