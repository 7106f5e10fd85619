//! Shard Module
//!
//! Deterministic weighted routing of keys to backend handles, the key
//! hashing used to spread skewed natural keys, and time-ordered IDs that
//! route evenly as raw keys.

mod id;
mod key;
mod router;
mod weights;

#[cfg(test)]
mod property_tests;

pub use id::{generate_int_id, generate_string_id, generate_uuid, IdGenerator, ID_EPOCH_MS};
pub use key::{int_to_key, string_to_key, ShardKey};
pub use router::{Shard, ShardRouter};
pub use weights::ShardWeights;
