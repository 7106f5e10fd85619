//! Error types for the toolkit
//!
//! Provides unified error handling using thiserror. Cache misses are not
//! errors and never appear here.

use thiserror::Error;

// == Toolkit Error Enum ==
/// Unified error type for the toolkit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolkitError {
    /// Shard list rejected at router construction
    #[error("Invalid shard configuration: {0}")]
    InvalidShardConfig(String),

    /// Configuration value out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Batch intake queue is full and the overflow policy drops new items
    #[error("Batch queue full (capacity {0})")]
    QueueFull(usize),

    /// The batch worker run loop is no longer receiving
    #[error("Batch worker closed")]
    WorkerClosed,

    /// The ID generator's time field overflowed
    #[error("ID space exhausted")]
    IdSpaceExhausted,
}

// == Result Type Alias ==
/// Convenience Result type for the toolkit.
pub type Result<T> = std::result::Result<T, ToolkitError>;
