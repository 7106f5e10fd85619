//! Multi-Value Cache Module
//!
//! Append-only key to ordered-list store without expiration.

use std::collections::HashMap;
use std::hash::Hash;

use parking_lot::RwLock;

// == Multi-Value Cache ==
/// Thread-safe map from `K` to an insertion-ordered list of `V`.
///
/// Appends and flushes take the exclusive lock; lookups share it. Values
/// persist until [`flush`](Self::flush).
#[derive(Debug)]
pub struct MultiValueCache<K, V> {
    items: RwLock<HashMap<K, Vec<V>>>,
}

impl<K, V> Default for MultiValueCache<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> MultiValueCache<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
        }
    }

    // == Append ==
    /// Appends `value` to the list for `key`, creating the list if absent.
    pub fn append(&self, key: K, value: V) {
        self.items.write().entry(key).or_default().push(value);
    }

    // == With Values ==
    /// Runs `f` over the current list for `key` without cloning it.
    ///
    /// An unknown key yields an empty slice.
    pub fn with_values<R>(&self, key: &K, f: impl FnOnce(&[V]) -> R) -> R {
        let items = self.items.read();
        f(items.get(key).map(Vec::as_slice).unwrap_or(&[]))
    }

    /// Number of values stored under `key`.
    pub fn values_len(&self, key: &K) -> usize {
        self.items.read().get(key).map_or(0, Vec::len)
    }

    /// Number of keys holding at least one value.
    pub fn key_count(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    // == Flush ==
    /// Clears all keys at once.
    pub fn flush(&self) {
        *self.items.write() = HashMap::new();
    }
}

impl<K, V> MultiValueCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    // == Get ==
    /// Returns a copy of the list for `key`, empty if the key is unknown.
    pub fn get(&self, key: &K) -> Vec<V> {
        self.with_values(key, <[V]>::to_vec)
    }
}
