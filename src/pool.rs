//! Object Pool Module
//!
//! Reuses objects on hot paths instead of allocating fresh ones. Objects are
//! handed out behind a guard that resets and returns them when released.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

/// Default number of idle objects a pool retains.
pub const DEFAULT_MAX_IDLE: usize = 64;

type Factory<T> = Box<dyn Fn() -> T + Send + Sync>;
type Reset<T> = Box<dyn Fn(&mut T) + Send + Sync>;

// == Object Pool ==
/// Pool of reusable `T` values.
///
/// ```
/// use perfkit::pool::ObjectPool;
///
/// let pool = ObjectPool::new(String::new, String::clear);
/// {
///     let mut buf = pool.acquire();
///     buf.push_str("scratch");
/// } // reset and returned here
///
/// assert_eq!(pool.idle_count(), 1);
/// assert!(pool.acquire().is_empty());
/// ```
pub struct ObjectPool<T> {
    /// Idle objects ready for reuse
    idle: Mutex<Vec<T>>,
    /// Builds an object when none is idle
    factory: Factory<T>,
    /// Restores an object to its clean state on release
    reset: Reset<T>,
    /// Maximum number of idle objects to keep
    max_idle: usize,
    /// Total objects built by `factory`
    created: AtomicUsize,
}

impl<T> ObjectPool<T> {
    // == Constructor ==
    pub fn new<F, R>(factory: F, reset: R) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
        R: Fn(&mut T) + Send + Sync + 'static,
    {
        Self {
            idle: Mutex::new(Vec::new()),
            factory: Box::new(factory),
            reset: Box::new(reset),
            max_idle: DEFAULT_MAX_IDLE,
            created: AtomicUsize::new(0),
        }
    }

    /// Caps how many released objects are kept; extras are dropped.
    pub fn with_max_idle(mut self, max_idle: usize) -> Self {
        self.max_idle = max_idle;
        self
    }

    // == Acquire ==
    /// Takes an idle object, or builds one if the pool is empty.
    ///
    /// The object returns to the pool when the guard is released or dropped.
    pub fn acquire(&self) -> Pooled<'_, T> {
        let object = match self.idle.lock().pop() {
            Some(object) => object,
            None => {
                self.created.fetch_add(1, Ordering::Relaxed);
                (self.factory)()
            }
        };

        Pooled {
            pool: self,
            object: Some(object),
        }
    }

    fn put_back(&self, mut object: T) {
        (self.reset)(&mut object);
        let mut idle = self.idle.lock();
        if idle.len() < self.max_idle {
            idle.push(object);
        }
    }

    /// Number of objects currently idle in the pool.
    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }

    /// Total number of objects ever built by the factory.
    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    /// Drops every idle object.
    pub fn clear(&self) {
        self.idle.lock().clear();
    }
}

impl<T> fmt::Debug for ObjectPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectPool")
            .field("idle", &self.idle_count())
            .field("created", &self.created_count())
            .field("max_idle", &self.max_idle)
            .finish()
    }
}

// == Pooled Guard ==
/// Scoped handle to a pooled object.
///
/// Released exactly once: explicitly through [`release`](Self::release), or
/// implicitly when dropped.
pub struct Pooled<'a, T> {
    pool: &'a ObjectPool<T>,
    /// Present until released or detached
    object: Option<T>,
}

impl<T> Pooled<'_, T> {
    /// Resets the object and returns it to the pool.
    pub fn release(self) {
        drop(self);
    }

    /// Takes the object out of the pool for good.
    pub fn detach(mut self) -> T {
        match self.object.take() {
            Some(object) => object,
            None => unreachable!("pooled object is only taken on consume"),
        }
    }
}

impl<T> Deref for Pooled<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        match self.object.as_ref() {
            Some(object) => object,
            None => unreachable!("pooled object is only taken on consume"),
        }
    }
}

impl<T> DerefMut for Pooled<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        match self.object.as_mut() {
            Some(object) => object,
            None => unreachable!("pooled object is only taken on consume"),
        }
    }
}

impl<T> Drop for Pooled<'_, T> {
    fn drop(&mut self) {
        // `detach` leaves nothing to return.
        if let Some(object) = self.object.take() {
            self.pool.put_back(object);
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Pooled<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pooled").field(&**self).finish()
    }
}

// == Slice Pool ==
/// Pool of `Vec<T>` buffers pre-allocated to a default capacity and cleared
/// on release.
#[derive(Debug)]
pub struct SlicePool<T> {
    inner: ObjectPool<Vec<T>>,
}

impl<T> SlicePool<T>
where
    T: 'static,
{
    pub fn new(default_capacity: usize) -> Self {
        Self {
            inner: ObjectPool::new(move || Vec::with_capacity(default_capacity), Vec::clear),
        }
    }

    pub fn with_max_idle(self, max_idle: usize) -> Self {
        Self {
            inner: self.inner.with_max_idle(max_idle),
        }
    }

    /// Takes an empty buffer with at least the default capacity.
    pub fn acquire(&self) -> Pooled<'_, Vec<T>> {
        self.inner.acquire()
    }

    pub fn idle_count(&self) -> usize {
        self.inner.idle_count()
    }

    pub fn created_count(&self) -> usize {
        self.inner.created_count()
    }
}
