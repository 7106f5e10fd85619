//! Typed Cache Module
//!
//! Generic expiring key/value store with lazy and swept TTL expiration.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::cache::stats::StatsCounters;
use crate::cache::{CacheEntry, CacheStats};

// == Typed Cache ==
/// Thread-safe expiring cache from `K` to `V`.
///
/// Every operation is atomic with respect to the others. A lookup never
/// returns a value whose TTL has elapsed, whether or not the entry has been
/// physically removed yet.
///
/// ```
/// use std::time::Duration;
/// use perfkit::cache::TypedCache;
///
/// let cache: TypedCache<u64, String> = TypedCache::new();
/// cache.set(1, "alice".to_string());
/// cache.set_with_expire(2, "bob".to_string(), Duration::from_secs(60));
///
/// assert_eq!(cache.get(&1).as_deref(), Some("alice"));
/// assert_eq!(cache.get(&3), None);
/// ```
#[derive(Debug)]
pub struct TypedCache<K, V> {
    /// Key-value storage
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
    /// TTL applied by `set`, None = entries never expire
    default_ttl: Option<Duration>,
    /// Performance statistics
    stats: StatsCounters,
}

impl<K, V> Default for TypedCache<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> TypedCache<K, V>
where
    K: Eq + Hash,
{
    // == Constructors ==
    /// Creates a cache whose entries never expire unless stored with
    /// [`set_with_expire`](Self::set_with_expire).
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            default_ttl: None,
            stats: StatsCounters::default(),
        }
    }

    /// Creates a cache where [`set`](Self::set) applies `default_ttl`.
    pub fn with_default_ttl(default_ttl: Duration) -> Self {
        Self {
            default_ttl: Some(default_ttl),
            ..Self::new()
        }
    }

    /// Returns the TTL applied by `set`, if any.
    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl
    }

    // == Set ==
    /// Stores `value` under `key` with the cache's default expiration,
    /// overwriting any previous entry.
    pub fn set(&self, key: K, value: V) {
        self.insert(key, CacheEntry::new(value, self.default_ttl));
    }

    /// Stores `value` under `key`, expiring after `ttl`.
    pub fn set_with_expire(&self, key: K, value: V, ttl: Duration) {
        self.insert(key, CacheEntry::new(value, Some(ttl)));
    }

    fn insert(&self, key: K, entry: CacheEntry<V>) {
        self.entries.write().insert(key, entry);
    }

    // == Delete ==
    /// Removes `key`. Deleting an absent key is a no-op.
    pub fn delete(&self, key: &K) {
        self.entries.write().remove(key);
    }

    // == Flush ==
    /// Removes every entry and resets statistics.
    pub fn flush(&self) {
        let mut entries = self.entries.write();
        entries.clear();
        self.stats.reset();
    }

    // == Cleanup Expired ==
    /// Removes all expired entries from the cache.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(now));
        let removed = before - entries.len();
        self.stats.record_expirations(removed as u64);
        removed
    }

    // == Length ==
    /// Returns the number of stored entries, including expired entries not
    /// yet swept.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.len())
    }
}

impl<K, V> TypedCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    // == Get ==
    /// Retrieves a clone of the value stored under `key`.
    ///
    /// Returns `None` if the key was never set, was deleted, or has expired.
    /// An expired entry found here is removed.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        {
            let entries = self.entries.read();
            match entries.get(key) {
                Some(entry) if !entry.is_expired_at(now) => {
                    self.stats.record_hit();
                    return Some(entry.value.clone());
                }
                Some(_) => {}
                None => {
                    self.stats.record_miss();
                    return None;
                }
            }
        }

        // Expired: upgrade to a write lock and re-check, since a concurrent
        // set may have replaced the entry in between.
        let mut entries = self.entries.write();
        match entries.get(key) {
            Some(entry) if !entry.is_expired_at(Instant::now()) => {
                self.stats.record_hit();
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.remove(key);
                self.stats.record_expirations(1);
                self.stats.record_miss();
                None
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    // == Time To Live ==
    /// Returns how long `key` has left before it expires.
    ///
    /// `None` if the key is absent, already expired, or stored without
    /// expiration. Does not touch hit/miss statistics.
    pub fn ttl(&self, key: &K) -> Option<Duration> {
        let now = Instant::now();
        self.entries
            .read()
            .get(key)
            .filter(|entry| !entry.is_expired_at(now))
            .and_then(|entry| entry.ttl_remaining_at(now))
    }

    // == Values ==
    /// Returns a snapshot of all non-expired values.
    ///
    /// Order is unspecified.
    pub fn values(&self) -> Vec<V> {
        let now = Instant::now();
        self.entries
            .read()
            .values()
            .filter(|entry| !entry.is_expired_at(now))
            .map(|entry| entry.value.clone())
            .collect()
    }
}
