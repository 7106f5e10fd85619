//! Cache Module
//!
//! Provides generic in-memory caches: an expiring key/value store and an
//! append-only multi-value store.

mod entry;
mod multi;
mod stats;
mod typed;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub(crate) use entry::CacheEntry;
pub use multi::MultiValueCache;
pub use stats::CacheStats;
pub use typed::TypedCache;
