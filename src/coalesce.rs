//! Call Coalescing Module
//!
//! Single-flight execution: concurrent callers asking for the same key share
//! one computation and its outcome.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::debug;

type Slot<T, E> = Arc<watch::Sender<Option<Result<T, E>>>>;

// == Coalescing Group ==
/// Deduplicates concurrent computations per key.
///
/// The first caller for a key becomes the owner and runs the computation.
/// Callers arriving while it runs wait and receive a clone of the owner's
/// outcome, error included. Once the owner finishes, the key is released and
/// the next caller starts a fresh computation.
///
/// If the owner panics or its future is dropped, the key is still released.
/// Waiters that were parked on it retry, and one of them becomes the new
/// owner.
///
/// There is no timeout. Wrap [`call`](Self::call) in
/// `tokio::time::timeout` when a deadline is needed.
#[derive(Debug)]
pub struct CoalescingGroup<T, E> {
    calls: Mutex<HashMap<String, Slot<T, E>>>,
}

impl<T, E> Default for CoalescingGroup<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> CoalescingGroup<T, E> {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Number of keys with a computation currently running.
    pub fn in_flight(&self) -> usize {
        self.calls.lock().len()
    }

    /// Detaches the running computation for `key`, if any.
    ///
    /// Callers already waiting still receive its outcome; later callers start
    /// a new computation instead of joining it.
    pub fn forget(&self, key: &str) {
        self.calls.lock().remove(key);
    }
}

impl<T, E> CoalescingGroup<T, E>
where
    T: Clone,
    E: Clone,
{
    // == Call ==
    /// Runs `f` for `key` unless a run is already in flight, in which case
    /// waits for that run instead.
    ///
    /// Returns the outcome and whether it was shared from another caller's
    /// run (`false` for the caller that actually executed `f`).
    pub async fn call<F, Fut>(&self, key: &str, f: F) -> (Result<T, E>, bool)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let slot = loop {
            let mut rx = {
                let mut calls = self.calls.lock();
                match calls.get(key) {
                    Some(slot) => slot.subscribe(),
                    None => {
                        let slot = Arc::new(watch::channel(None).0);
                        calls.insert(key.to_string(), Arc::clone(&slot));
                        break slot;
                    }
                }
            };

            let outcome = match rx.wait_for(Option::is_some).await {
                Ok(value) => (*value).clone(),
                Err(_) => None,
            };
            if let Some(outcome) = outcome {
                return (outcome, true);
            }
            debug!(key, "coalesced call abandoned by its owner, retrying");
        };

        let guard = InFlightGuard {
            calls: &self.calls,
            key,
            slot,
        };
        let outcome = f().await;
        guard.complete(outcome.clone());
        (outcome, false)
    }
}

// == In-Flight Guard ==
/// Releases the key on every exit path of the owner.
struct InFlightGuard<'a, T, E> {
    calls: &'a Mutex<HashMap<String, Slot<T, E>>>,
    key: &'a str,
    slot: Slot<T, E>,
}

impl<T, E> InFlightGuard<'_, T, E> {
    fn release(&self) {
        let mut calls = self.calls.lock();
        // `forget` may already have replaced this key with a newer run.
        if calls
            .get(self.key)
            .is_some_and(|current| Arc::ptr_eq(current, &self.slot))
        {
            calls.remove(self.key);
        }
    }

    fn complete(self, outcome: Result<T, E>) {
        self.release();
        self.slot.send_replace(Some(outcome));
    }
}

impl<T, E> Drop for InFlightGuard<'_, T, E> {
    fn drop(&mut self) {
        self.release();
    }
}
