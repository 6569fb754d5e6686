//! Cache Module
//!
//! TTL-bound DNS record cache, safe to share between request tasks.

mod clock;
mod entry;
mod key;
mod shared;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::CacheEntry;
pub use key::CacheKey;
pub use shared::SharedCache;
pub use stats::CacheStats;
pub use store::CacheStore;
