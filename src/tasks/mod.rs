//! Background Tasks Module
//!
//! Contains long-lived tasks that run alongside the application.
//!
//! # Tasks
//! - TTL Cleanup: Removes expired typed cache entries at configured intervals
//! - Batch Worker: Dispatches producer items to a callback on a fixed interval

mod batch;
mod cleanup;

pub use batch::{
    BatchSender, BatchWorker, BatchWorkerConfig, OverflowPolicy, DEFAULT_MAX_CONCURRENT_FLUSHES,
    DEFAULT_QUEUE_CAPACITY,
};
pub use cleanup::spawn_cleanup_task;
