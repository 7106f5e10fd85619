//! Shard key derivation.
//!
//! Natural keys are often skewed (sequential ids, shared prefixes). Hashing
//! them with XXH64 spreads them uniformly before they are reduced modulo the
//! total shard weight.

use xxhash_rust::xxh64::xxh64;

const SEED: u64 = 0;

/// Integer types usable as shard routing keys.
///
/// Covers every primitive integer up to 64 bits. Negative values are
/// supported; the router maps them into range with euclidean remainder.
pub trait ShardKey: Copy {
    /// Widens the key without loss.
    fn to_i128(self) -> i128;
}

macro_rules! impl_shard_key {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ShardKey for $ty {
                #[inline]
                fn to_i128(self) -> i128 {
                    self as i128
                }
            }
        )*
    };
}

impl_shard_key!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

/// Hashes the UTF-8 bytes of `s` into a uniformly distributed 64-bit key.
pub fn string_to_key(s: &str) -> u64 {
    xxh64(s.as_bytes(), SEED)
}

/// Hashes an integer into a uniformly distributed 64-bit key.
///
/// The integer is encoded as 8 little-endian bytes of its two's-complement
/// 64-bit form, so `-1i32` and `-1i64` derive the same key.
pub fn int_to_key<K: ShardKey>(key: K) -> u64 {
    let bits = key.to_i128() as u64;
    xxh64(&bits.to_le_bytes(), SEED)
}
