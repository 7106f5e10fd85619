//! ID Generation Module
//!
//! Time-ordered 64-bit IDs that double as shard keys, plus sortable string
//! IDs and random UUIDs.
//!
//! Integer IDs use the Sonyflake layout:
//!
//! ```text
//! | 39 bits: elapsed 10ms units | 8 bits: sequence | 16 bits: machine id |
//! ```
//!
//! A fixed machine id leaves the low bits constant, which would send every
//! ID to the same residue under `id % total_weight`. A small random offset
//! is added on top so raw IDs spread evenly across weighted shards.

use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::{const_mutex, Mutex};
use rand::Rng;
use uuid::Uuid;

use crate::error::{Result, ToolkitError};

/// Start of the time field, 2014-09-01T00:00:00Z in Unix milliseconds.
pub const ID_EPOCH_MS: u64 = 1_409_529_600_000;

const TIME_UNIT_MS: u64 = 10;
const BITS_TIME: u32 = 39;
const BITS_SEQUENCE: u32 = 8;
const BITS_MACHINE: u32 = 16;
const SEQUENCE_MASK: u16 = (1 << BITS_SEQUENCE) - 1;

/// Exclusive upper bound of the random offset. A multiple of every small
/// total weight, so each residue is equally likely.
const SPREAD: u64 = 10;

static DEFAULT_GENERATOR: IdGenerator = IdGenerator::new(0);

#[derive(Debug)]
struct State {
    /// Time field of the last issued ID
    elapsed: u64,
    /// Sequence within `elapsed`
    sequence: u16,
}

// == Id Generator ==
/// Issues strictly increasing 64-bit IDs for one machine id.
///
/// More than 256 IDs within one 10ms unit borrow the next unit instead of
/// waiting, so during bursts the time field can run ahead of the wall clock.
///
/// ```
/// use perfkit::shard::IdGenerator;
///
/// let ids = IdGenerator::new(7);
/// let a = ids.next_id().unwrap();
/// let b = ids.next_id().unwrap();
/// assert!(b > a);
/// ```
#[derive(Debug)]
pub struct IdGenerator {
    machine_id: u16,
    state: Mutex<State>,
}

impl IdGenerator {
    pub const fn new(machine_id: u16) -> Self {
        Self {
            machine_id,
            state: const_mutex(State {
                elapsed: 0,
                sequence: 0,
            }),
        }
    }

    pub fn machine_id(&self) -> u16 {
        self.machine_id
    }

    // == Next Id ==
    /// Returns the next ID.
    ///
    /// # Errors
    /// `IdSpaceExhausted` once the 39-bit time field overflows.
    pub fn next_id(&self) -> Result<u64> {
        let now = current_elapsed();
        let (elapsed, sequence) = {
            let mut state = self.state.lock();
            if state.elapsed < now {
                state.elapsed = now;
                state.sequence = 0;
            } else {
                state.sequence = (state.sequence + 1) & SEQUENCE_MASK;
                if state.sequence == 0 {
                    state.elapsed += 1;
                }
            }
            (state.elapsed, state.sequence)
        };

        if elapsed >= 1 << BITS_TIME {
            return Err(ToolkitError::IdSpaceExhausted);
        }

        let base = (elapsed << (BITS_SEQUENCE + BITS_MACHINE))
            | (u64::from(sequence) << BITS_MACHINE)
            | u64::from(self.machine_id);
        // Consecutive bases differ by at least 1 << 16, so the offset keeps
        // the order strict.
        Ok(base + rand::thread_rng().gen_range(0..SPREAD))
    }
}

fn current_elapsed() -> u64 {
    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |since| since.as_millis() as u64);
    now_ms.saturating_sub(ID_EPOCH_MS) / TIME_UNIT_MS
}

/// Next ID from the process-wide generator (machine id 0).
///
/// Monotonic, so it can stand in for an auto-increment column, and it can be
/// routed as a raw key with [`ShardRouter::get_shard`](crate::ShardRouter::get_shard).
pub fn generate_int_id() -> Result<u64> {
    DEFAULT_GENERATOR.next_id()
}

/// Sortable string ID: 32 lowercase hex digits of a UUIDv7.
///
/// IDs from different milliseconds sort lexicographically by creation time,
/// which keeps B-tree inserts append-only.
pub fn generate_string_id() -> String {
    Uuid::now_v7().simple().to_string()
}

/// Random UUIDv4 in hyphenated form, for uniformly distributed IDs.
pub fn generate_uuid() -> String {
    Uuid::new_v4().to_string()
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::shard::{Shard, ShardRouter};
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_ids_strictly_increase() {
        let ids = IdGenerator::new(3);
        let mut last = ids.next_id().unwrap();
        for _ in 0..10_000 {
            let next = ids.next_id().unwrap();
            assert!(next > last, "{next} <= {last}");
            last = next;
        }
    }

    #[test]
    fn test_id_layout() {
        let ids = IdGenerator::new(42);
        let id = ids.next_id().unwrap();

        let low = id & ((1 << BITS_MACHINE) - 1);
        assert!((42..42 + SPREAD).contains(&low));
        assert!(id < 1 << 63);

        let elapsed = id >> (BITS_SEQUENCE + BITS_MACHINE);
        assert!(elapsed.abs_diff(current_elapsed()) <= 1);
        assert_eq!(ids.machine_id(), 42);
    }

    #[test]
    fn test_sequence_overflow_borrows_next_unit() {
        let ids = IdGenerator::new(0);
        let first = ids.next_id().unwrap() >> (BITS_SEQUENCE + BITS_MACHINE);

        let mut last = 0;
        for _ in 0..(1 << BITS_SEQUENCE) * 3 {
            last = ids.next_id().unwrap();
        }

        assert!(last >> (BITS_SEQUENCE + BITS_MACHINE) >= first + 3);
    }

    #[test]
    fn test_concurrent_ids_unique() {
        let ids = Arc::new(IdGenerator::new(1));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ids = Arc::clone(&ids);
                thread::spawn(move || {
                    (0..1_000)
                        .map(|_| ids.next_id().unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(seen.len(), 8 * 1_000);
    }

    #[test]
    fn test_ids_spread_across_residues() {
        let ids = IdGenerator::new(0);
        let mut residues = [0usize; 5];
        for _ in 0..10_000 {
            residues[(ids.next_id().unwrap() % 5) as usize] += 1;
        }

        for count in residues {
            assert!((1_600..=2_400).contains(&count), "residues {residues:?}");
        }
    }

    #[test]
    fn test_raw_ids_follow_shard_weights() {
        let router = ShardRouter::new(vec![Shard::new("s2", 1, "s2"), Shard::new("s3", 4, "s3")])
            .unwrap();

        let to_s2 = (0..10_000)
            .map(|_| generate_int_id().unwrap())
            .filter(|id| *router.get_shard(*id) == "s2")
            .count();

        let ratio = to_s2 as f64 / 10_000.0;
        assert!((0.17..=0.23).contains(&ratio), "ratio {ratio}");
    }

    #[test]
    fn test_string_ids_sort_by_time() {
        let first = generate_string_id();
        thread::sleep(Duration::from_millis(2));
        let second = generate_string_id();

        assert_eq!(first.len(), 32);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(second > first);
    }

    #[test]
    fn test_uuids_are_v4() {
        let id = generate_uuid();
        let parsed = Uuid::parse_str(&id).unwrap();

        assert_eq!(id.len(), 36);
        assert_eq!(parsed.get_version_num(), 4);
        assert_ne!(generate_uuid(), id);
    }
}
