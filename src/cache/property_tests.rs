//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the caches against a plain `HashMap` model.

use proptest::prelude::*;
use std::collections::HashMap;

use crate::cache::{MultiValueCache, TypedCache};

// == Strategies ==
/// Generates cache keys from a small alphabet so operations collide often
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-e]{1,2}".prop_map(|s| s)
}

fn value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{0,32}".prop_map(|s| s)
}

/// Generates a sequence of cache operations for testing
#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: String, value: String },
    Get { key: String },
    Delete { key: String },
    Flush,
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        4 => (key_strategy(), value_strategy())
            .prop_map(|(key, value)| CacheOp::Set { key, value }),
        4 => key_strategy().prop_map(|key| CacheOp::Get { key }),
        2 => key_strategy().prop_map(|key| CacheOp::Delete { key }),
        1 => Just(CacheOp::Flush),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Any operation sequence without TTLs behaves exactly like a HashMap.
    #[test]
    fn prop_typed_cache_matches_model(ops in prop::collection::vec(cache_op_strategy(), 1..80)) {
        let cache = TypedCache::new();
        let mut model: HashMap<String, String> = HashMap::new();

        for op in ops {
            match op {
                CacheOp::Set { key, value } => {
                    cache.set(key.clone(), value.clone());
                    model.insert(key, value);
                }
                CacheOp::Get { key } => {
                    prop_assert_eq!(cache.get(&key), model.get(&key).cloned());
                }
                CacheOp::Delete { key } => {
                    cache.delete(&key);
                    model.remove(&key);
                }
                CacheOp::Flush => {
                    cache.flush();
                    model.clear();
                }
            }
            prop_assert_eq!(cache.len(), model.len());
        }

        let mut got = cache.values();
        let mut want: Vec<String> = model.into_values().collect();
        got.sort();
        want.sort();
        prop_assert_eq!(got, want);
    }

    // Hit and miss counters reflect every lookup since the last flush.
    #[test]
    fn prop_statistics_accuracy(ops in prop::collection::vec(cache_op_strategy(), 1..50)) {
        let cache = TypedCache::new();
        let mut expected_hits: u64 = 0;
        let mut expected_misses: u64 = 0;

        for op in ops {
            match op {
                CacheOp::Set { key, value } => cache.set(key, value),
                CacheOp::Get { key } => match cache.get(&key) {
                    Some(_) => expected_hits += 1,
                    None => expected_misses += 1,
                },
                CacheOp::Delete { key } => cache.delete(&key),
                CacheOp::Flush => {
                    cache.flush();
                    expected_hits = 0;
                    expected_misses = 0;
                }
            }
        }

        let stats = cache.stats();
        prop_assert_eq!(stats.hits, expected_hits, "Hits mismatch");
        prop_assert_eq!(stats.misses, expected_misses, "Misses mismatch");
        prop_assert_eq!(stats.total_entries, cache.len(), "Total entries mismatch");
    }

    // Appends come back in insertion order per key.
    #[test]
    fn prop_multi_value_append_order(
        appends in prop::collection::vec((key_strategy(), value_strategy()), 0..100)
    ) {
        let cache = MultiValueCache::new();
        let mut model: HashMap<String, Vec<String>> = HashMap::new();

        for (key, value) in appends {
            cache.append(key.clone(), value.clone());
            model.entry(key).or_default().push(value);
        }

        prop_assert_eq!(cache.key_count(), model.len());
        for (key, values) in &model {
            prop_assert_eq!(&cache.get(key), values);
        }

        cache.flush();
        for key in model.keys() {
            prop_assert!(cache.get(key).is_empty());
        }
    }
}
