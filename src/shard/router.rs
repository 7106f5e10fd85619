//! Weighted modulo shard router.
//!
//! ```text
//!   weights  [ 1 |    4    ]        total = 5
//!   position   0   1 2 3 4          position = key rem_euclid 5
//!   shard      s2  s3 s3 s3 s3
//! ```
//!
//! Routing is deterministic for a fixed shard list. It is not consistent
//! hashing: changing any weight, or adding or removing a shard, moves a
//! large fraction of keys to a different shard.

use crate::error::{Result, ToolkitError};
use crate::shard::key::{string_to_key, ShardKey};

// == Shard ==
/// A backend handle with its share of the key space.
#[derive(Debug, Clone)]
pub struct Shard<H> {
    /// Human readable name used in logs
    pub name: String,
    /// Relative share of keys; zero means the shard never receives routed keys
    pub weight: u64,
    /// Opaque backend handle (connection pool, client, ...)
    pub handle: H,
}

impl<H> Shard<H> {
    pub fn new(name: impl Into<String>, weight: u64, handle: H) -> Self {
        Self {
            name: name.into(),
            weight,
            handle,
        }
    }
}

// == Shard Router ==
/// Selects one of a fixed set of weighted shards for a key.
///
/// ```
/// use perfkit::shard::{Shard, ShardRouter};
///
/// let router = ShardRouter::new(vec![
///     Shard::new("s2", 1, "db-s2"),
///     Shard::new("s3", 4, "db-s3"),
/// ])
/// .unwrap();
///
/// assert_eq!(*router.get_shard(0i64), "db-s2");
/// assert_eq!(*router.get_shard(1i64), "db-s3");
/// assert_eq!(*router.get_shard(5i64), "db-s2");
/// ```
#[derive(Debug, Clone)]
pub struct ShardRouter<H> {
    shards: Vec<Shard<H>>,
    total_weight: u64,
}

impl<H> ShardRouter<H> {
    // == Constructor ==
    /// Builds a router over `shards`, in the given order.
    ///
    /// Fails if the list is empty, the weights sum to zero, or the sum
    /// overflows `u64`.
    pub fn new(shards: Vec<Shard<H>>) -> Result<Self> {
        if shards.is_empty() {
            return Err(ToolkitError::InvalidShardConfig(
                "at least one shard is required".to_string(),
            ));
        }

        let total_weight = shards
            .iter()
            .try_fold(0u64, |sum, shard| sum.checked_add(shard.weight))
            .ok_or_else(|| {
                ToolkitError::InvalidShardConfig("total shard weight overflows u64".to_string())
            })?;

        if total_weight == 0 {
            return Err(ToolkitError::InvalidShardConfig(
                "total shard weight must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            shards,
            total_weight,
        })
    }

    // == Routing ==
    /// Returns the index of the shard that owns `key`.
    pub fn shard_index<K: ShardKey>(&self, key: K) -> usize {
        let position = key.to_i128().rem_euclid(self.total_weight as i128) as u64;

        let mut boundary = 0u64;
        for (index, shard) in self.shards.iter().enumerate() {
            boundary += shard.weight;
            if position < boundary {
                return index;
            }
        }

        // position < total_weight == final boundary, so the loop always returns.
        self.shards.len() - 1
    }

    /// Returns the handle of the shard that owns `key`.
    pub fn get_shard<K: ShardKey>(&self, key: K) -> &H {
        &self.shards[self.shard_index(key)].handle
    }

    /// Hashes `key` with [`string_to_key`] and routes the result.
    pub fn get_shard_by_str(&self, key: &str) -> &H {
        self.get_shard(string_to_key(key))
    }

    /// Returns the handle at `index`, for queries that fan out to every shard.
    pub fn get_shard_by_index(&self, index: usize) -> Option<&H> {
        self.shards.get(index).map(|shard| &shard.handle)
    }

    // == Accessors ==
    pub fn shards(&self) -> &[Shard<H>] {
        &self.shards
    }

    /// Iterates every handle in configuration order.
    pub fn handles(&self) -> impl Iterator<Item = &H> {
        self.shards.iter().map(|shard| &shard.handle)
    }

    pub fn len(&self) -> usize {
        self.shards.len()
    }

    /// Always false: construction rejects an empty shard list.
    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    pub fn total_weight(&self) -> u64 {
        self.total_weight
    }
}
