//! Interval Batch Worker
//!
//! Producers push items through a bounded queue; a background loop collects
//! them and hands the accumulated batch to a callback on a fixed interval.
//!
//! ```text
//!   Idle ──recv──▶ Accumulating ──tick──▶ Dispatching ──▶ Idle
//!                   ▲      │                 (callback runs on its own task)
//!                   └─recv─┘
//! ```
//!
//! Delivery is at-most-once and best effort: a batch whose callback fails or
//! panics is not retried or persisted.

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::error::{Result, ToolkitError};

// == Constants ==
/// Default intake queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100_000;

/// Default number of batches that may be in their callback at once.
pub const DEFAULT_MAX_CONCURRENT_FLUSHES: usize = 4;

// == Overflow Policy ==
/// What [`BatchSender::send`] does when the intake queue is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Suspend the producer until the run loop frees a slot.
    #[default]
    Block,
    /// Reject the item with [`ToolkitError::QueueFull`] and count it as dropped.
    DropNewest,
}

impl FromStr for OverflowPolicy {
    type Err = ToolkitError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "block" => Ok(Self::Block),
            "drop_newest" | "drop-newest" => Ok(Self::DropNewest),
            other => Err(ToolkitError::InvalidConfig(format!(
                "unknown overflow policy '{other}'"
            ))),
        }
    }
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Block => f.write_str("block"),
            Self::DropNewest => f.write_str("drop_newest"),
        }
    }
}

// == Batch Worker Config ==
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchWorkerConfig {
    /// Time between flushes
    pub interval: Duration,
    /// Intake queue capacity
    pub capacity: usize,
    /// Producer behavior when the queue is full
    pub overflow: OverflowPolicy,
    /// Upper bound on callbacks running at the same time
    pub max_concurrent_flushes: usize,
}

impl BatchWorkerConfig {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            capacity: DEFAULT_QUEUE_CAPACITY,
            overflow: OverflowPolicy::default(),
            max_concurrent_flushes: DEFAULT_MAX_CONCURRENT_FLUSHES,
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }

    pub fn with_max_concurrent_flushes(mut self, max: usize) -> Self {
        self.max_concurrent_flushes = max;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(ToolkitError::InvalidConfig(
                "batch interval must be non-zero".to_string(),
            ));
        }
        if self.capacity == 0 {
            return Err(ToolkitError::InvalidConfig(
                "batch queue capacity must be non-zero".to_string(),
            ));
        }
        if self.max_concurrent_flushes == 0 {
            return Err(ToolkitError::InvalidConfig(
                "max concurrent flushes must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

// == Batch Sender ==
/// Cloneable producer handle for a [`BatchWorker`].
///
/// The worker shuts down once every sender has been dropped.
#[derive(Debug)]
pub struct BatchSender<T> {
    tx: mpsc::Sender<T>,
    overflow: OverflowPolicy,
    capacity: usize,
    dropped: Arc<AtomicU64>,
}

impl<T> Clone for BatchSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            overflow: self.overflow,
            capacity: self.capacity,
            dropped: Arc::clone(&self.dropped),
        }
    }
}

impl<T> BatchSender<T> {
    /// Enqueues `item` according to the configured [`OverflowPolicy`].
    ///
    /// Under [`OverflowPolicy::Block`] this suspends only while the queue is
    /// full. Under [`OverflowPolicy::DropNewest`] it never suspends.
    pub async fn send(&self, item: T) -> Result<()> {
        match self.overflow {
            OverflowPolicy::Block => self
                .tx
                .send(item)
                .await
                .map_err(|_| ToolkitError::WorkerClosed),
            OverflowPolicy::DropNewest => self.try_send(item),
        }
    }

    /// Enqueues `item` without ever suspending, whatever the policy.
    pub fn try_send(&self, item: T) -> Result<()> {
        match self.tx.try_send(item) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(capacity = self.capacity, dropped, "batch queue full, dropping item");
                Err(ToolkitError::QueueFull(self.capacity))
            }
            Err(TrySendError::Closed(_)) => Err(ToolkitError::WorkerClosed),
        }
    }

    /// Number of items rejected because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Whether the run loop has stopped receiving.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// == Batch Worker ==
/// Interval-driven batch dispatcher.
///
/// ```no_run
/// use std::time::Duration;
/// use perfkit::tasks::{BatchWorker, BatchWorkerConfig};
///
/// # async fn demo() -> perfkit::error::Result<()> {
/// let (sender, worker) = BatchWorker::new(BatchWorkerConfig::new(Duration::from_secs(1)))?;
/// let handle = worker.spawn(|batch: Vec<u64>| async move {
///     println!("persisting {} rows", batch.len());
/// });
///
/// sender.send(42).await?;
/// drop(sender);
/// handle.await.ok();
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct BatchWorker<T> {
    rx: mpsc::Receiver<T>,
    interval: Duration,
    max_concurrent_flushes: usize,
}

impl<T> BatchWorker<T>
where
    T: Send + 'static,
{
    // == Constructor ==
    /// Creates the producer handle and the worker that drains it.
    pub fn new(config: BatchWorkerConfig) -> Result<(BatchSender<T>, Self)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.capacity);
        let sender = BatchSender {
            tx,
            overflow: config.overflow,
            capacity: config.capacity,
            dropped: Arc::new(AtomicU64::new(0)),
        };
        let worker = Self {
            rx,
            interval: config.interval,
            max_concurrent_flushes: config.max_concurrent_flushes,
        };
        Ok((sender, worker))
    }

    /// Runs [`run`](Self::run) on a new tokio task.
    pub fn spawn<F, Fut>(self, callback: F) -> JoinHandle<()>
    where
        F: Fn(Vec<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(self.run(callback))
    }

    // == Run ==
    /// Collects items and dispatches a batch to `callback` on every tick.
    ///
    /// Each non-empty batch runs on its own task so a slow callback never
    /// delays the next tick. When `max_concurrent_flushes` callbacks are
    /// already running, the batch keeps accumulating until a later tick.
    ///
    /// Returns after every sender is dropped, the final partial batch has
    /// been dispatched, and all running callbacks have finished.
    pub async fn run<F, Fut>(mut self, callback: F)
    where
        F: Fn(Vec<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let callback = Arc::new(callback);
        let permits = Arc::new(Semaphore::new(self.max_concurrent_flushes));
        let mut flushes = JoinSet::new();
        let mut items: Vec<T> = Vec::new();

        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval = ?self.interval, "Starting batch worker");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if items.is_empty() {
                        continue;
                    }
                    match Arc::clone(&permits).try_acquire_owned() {
                        Ok(permit) => {
                            let batch = std::mem::take(&mut items);
                            let callback = Arc::clone(&callback);
                            debug!(size = batch.len(), "dispatching batch");
                            flushes.spawn(async move {
                                let _permit = permit;
                                callback(batch).await;
                            });
                        }
                        Err(_) => {
                            warn!(
                                pending = items.len(),
                                "flush limit reached, deferring batch to next tick"
                            );
                        }
                    }
                }
                received = self.rx.recv() => match received {
                    Some(item) => items.push(item),
                    None => break,
                },
                Some(joined) = flushes.join_next(), if !flushes.is_empty() => {
                    log_flush_result(joined);
                }
            }
        }

        if !items.is_empty() {
            // Shutting down: wait for a slot rather than dropping the tail.
            let permit = Arc::clone(&permits).acquire_owned().await.ok();
            let batch = std::mem::take(&mut items);
            debug!(size = batch.len(), "dispatching final batch");
            flushes.spawn(async move {
                let _permit = permit;
                callback(batch).await;
            });
        }

        while let Some(joined) = flushes.join_next().await {
            log_flush_result(joined);
        }

        info!("Batch worker stopped");
    }
}

fn log_flush_result(joined: std::result::Result<(), JoinError>) {
    if let Err(err) = joined {
        if err.is_panic() {
            error!("batch callback panicked; batch dropped");
        } else {
            error!(error = %err, "batch callback task failed; batch dropped");
        }
    }
}
