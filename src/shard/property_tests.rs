//! Property-Based Tests for Shard Module

use proptest::prelude::*;

use crate::shard::{int_to_key, string_to_key, Shard, ShardRouter};

fn weights_strategy() -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(0u64..10, 1..8).prop_filter("total weight must be positive", |w| {
        w.iter().sum::<u64>() > 0
    })
}

fn router(weights: &[u64]) -> ShardRouter<usize> {
    let shards = weights
        .iter()
        .enumerate()
        .map(|(i, w)| Shard::new(format!("s{i}"), *w, i))
        .collect();
    ShardRouter::new(shards).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    // Every key lands on a shard with non-zero weight.
    #[test]
    fn prop_routes_to_weighted_shard(weights in weights_strategy(), key in any::<i64>()) {
        let router = router(&weights);
        let index = router.shard_index(key);
        prop_assert!(index < weights.len());
        prop_assert!(weights[index] > 0);
        prop_assert_eq!(*router.get_shard(key), index);
    }

    // Keys congruent modulo the total weight share a shard.
    #[test]
    fn prop_congruent_keys_share_shard(weights in weights_strategy(), key in -1_000_000i64..1_000_000) {
        let router = router(&weights);
        let total = router.total_weight() as i64;
        prop_assert_eq!(router.shard_index(key), router.shard_index(key + total));
        prop_assert_eq!(router.shard_index(key), router.shard_index(key - total));
    }

    // One full cycle of positions hits each shard exactly `weight` times.
    #[test]
    fn prop_full_cycle_matches_weights(weights in weights_strategy()) {
        let router = router(&weights);
        let mut counts = vec![0u64; weights.len()];
        for position in 0..router.total_weight() {
            counts[router.shard_index(position)] += 1;
        }
        prop_assert_eq!(counts, weights);
    }

    #[test]
    fn prop_key_derivation_deterministic(s in ".*", i in any::<i64>()) {
        prop_assert_eq!(string_to_key(&s), string_to_key(&s));
        prop_assert_eq!(int_to_key(i), int_to_key(i));
    }
}
