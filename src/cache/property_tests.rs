//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the cache invariants over arbitrary operation sequences.

use chrono::{DateTime, TimeDelta, Utc};
use proptest::prelude::*;
use std::collections::HashMap;

use crate::cache::{CacheKey, CacheStore};
use crate::dns::ResourceRecord;

// == Strategies ==
/// Short label names in mixed case so keys collide after normalization
fn name_strategy() -> impl Strategy<Value = String> {
    "[a-cA-C]{1,3}\\.(example|EXAMPLE)\\.".prop_map(|s| s)
}

fn record_strategy() -> impl Strategy<Value = ResourceRecord> {
    (name_strategy(), prop_oneof![Just(1u16), Just(28u16)], 0u32..600, any::<u8>()).prop_map(
        |(name, record_type, ttl, octet)| ResourceRecord {
            name,
            record_type,
            dns_class: 1,
            ttl,
            rdata: vec![10, 0, 0, octet],
        },
    )
}

#[derive(Debug, Clone)]
enum CacheOp {
    Insert { record: ResourceRecord },
    Lookup { name: String, record_type: u16 },
    Sweep,
    Advance { seconds: i64 },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        record_strategy().prop_map(|record| CacheOp::Insert { record }),
        (name_strategy(), prop_oneof![Just(1u16), Just(28u16)])
            .prop_map(|(name, record_type)| CacheOp::Lookup { name, record_type }),
        Just(CacheOp::Sweep),
        (0i64..400).prop_map(|seconds| CacheOp::Advance { seconds }),
    ]
}

fn start() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    // Lookup never hands out a record whose age exceeds its TTL, and every
    // returned TTL is within the original one.
    #[test]
    fn prop_lookup_never_returns_expired(ops in prop::collection::vec(cache_op_strategy(), 1..80)) {
        let mut store = CacheStore::new();
        let mut now = start();
        // Every record ever inserted, with its latest insertion instant
        let mut inserted: Vec<(ResourceRecord, DateTime<Utc>)> = Vec::new();

        for op in ops {
            match op {
                CacheOp::Insert { record } => {
                    store.insert(record.clone(), now);
                    inserted.retain(|(r, _)| *r != record);
                    inserted.push((record, now));
                }
                CacheOp::Lookup { name, record_type } => {
                    let key = CacheKey::new(&name, record_type);
                    if let Some(records) = store.lookup(&key, now) {
                        for returned in records {
                            let payload = returned.with_ttl(0);
                            let backed_by_valid_insert = inserted.iter().any(|(r, at)| {
                                r.with_ttl(0) == payload
                                    && r.ttl >= returned.ttl
                                    && now <= *at + TimeDelta::seconds(i64::from(r.ttl))
                            });
                            prop_assert!(backed_by_valid_insert, "expired record returned: {:?}", returned);
                        }
                    }
                }
                CacheOp::Sweep => {
                    store.sweep_all(now);
                }
                CacheOp::Advance { seconds } => {
                    now += TimeDelta::seconds(seconds);
                }
            }
        }
    }

    // Inserting the same record any number of times stores it once.
    #[test]
    fn prop_insert_idempotent(record in record_strategy(), times in 1usize..10) {
        let mut store = CacheStore::new();
        let now = start();

        for _ in 0..times {
            store.insert(record.clone(), now);
        }

        prop_assert_eq!(store.record_count(), 1);
        prop_assert_eq!(store.entries_for(&CacheKey::for_record(&record)).len(), 1);
        prop_assert_eq!(store.stats().inserts, 1);
    }

    // Names differing only in case land under one key.
    #[test]
    fn prop_keys_case_insensitive(record in record_strategy()) {
        let mut store = CacheStore::new();
        let now = start();
        store.insert(record.clone(), now);

        let upper = CacheKey::new(&record.name.to_ascii_uppercase(), record.record_type);
        let lower = CacheKey::new(&record.name.to_ascii_lowercase(), record.record_type);

        prop_assert_eq!(&upper, &lower);
        prop_assert!(store.lookup(&upper, now).is_some());
    }

    // A full sweep at time t removes exactly the records expired at t.
    #[test]
    fn prop_sweep_removes_exactly_expired(
        records in prop::collection::vec(record_strategy(), 1..40),
        elapsed in 0i64..700
    ) {
        let mut store = CacheStore::new();
        let t0 = start();
        // TTL variants of one record collapse; at equal timestamps the first stays
        let mut unique: HashMap<(CacheKey, u16, Vec<u8>), u32> = HashMap::new();
        for record in records {
            unique
                .entry((CacheKey::for_record(&record), record.dns_class, record.rdata.clone()))
                .or_insert(record.ttl);
            store.insert(record, t0);
        }

        let later = t0 + TimeDelta::seconds(elapsed);
        let expected = unique
            .values()
            .filter(|ttl| i64::from(**ttl) < elapsed)
            .count();

        prop_assert_eq!(store.sweep_all(later), expected);
        prop_assert_eq!(store.record_count(), unique.len() - expected);
        prop_assert!(store.entries().iter().all(|e| !e.is_expired(later)));
    }
}
