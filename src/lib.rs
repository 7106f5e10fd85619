//! perfkit - In-process performance infrastructure toolkit
//!
//! Provides expiring and multi-value caches, single-flight call coalescing,
//! weighted shard routing, interval-batched workers and object pools.

pub mod cache;
pub mod coalesce;
pub mod config;
pub mod error;
pub mod pool;
pub mod shard;
pub mod tasks;

pub use cache::{MultiValueCache, TypedCache};
pub use coalesce::CoalescingGroup;
pub use config::Config;
pub use error::{Result, ToolkitError};
pub use pool::{ObjectPool, Pooled, SlicePool};
pub use shard::{Shard, ShardRouter};
pub use tasks::{spawn_cleanup_task, BatchSender, BatchWorker, BatchWorkerConfig, OverflowPolicy};
