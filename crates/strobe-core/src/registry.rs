//! Timer callback registry
//!
//! Periodic callbacks are kept as a copy-on-write snapshot: registration builds a
//! new list and swaps it in under a short write lock, while a fan-out clones the
//! current `Arc` and iterates it with no lock held. A fan-out therefore never sees
//! a half-updated list, and callbacks may register further callbacks without
//! deadlocking (the change is picked up on the next fan-out).

use crate::error::{SchedulerError, SchedulerResult};
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Signature of a timer callback: receives the 32-bit elapsed microseconds
pub type TimedFn = dyn Fn(u32) + Send + Sync;

/// A periodic timer callback with identity
///
/// Clones of one `TimerProc` are the same callback for deduplication purposes;
/// two procs built from separate closures are always distinct.
#[derive(Clone)]
pub struct TimerProc {
    func: Arc<TimedFn>,
}

impl TimerProc {
    /// Wrap a closure as a timer callback
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(func),
        }
    }

    /// Invoke the callback
    #[inline]
    pub fn call(&self, now_micros: u32) {
        (self.func)(now_micros)
    }

    /// Whether `other` is the same callback as `self`
    pub fn same_as(&self, other: &TimerProc) -> bool {
        // Compare data pointers only; vtable pointers are not unique
        std::ptr::eq(
            Arc::as_ptr(&self.func) as *const (),
            Arc::as_ptr(&other.func) as *const (),
        )
    }
}

impl fmt::Debug for TimerProc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TimerProc({:p})", Arc::as_ptr(&self.func) as *const ())
    }
}

/// Token returned from registration, used to unregister
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

static NEXT_TIMER_HANDLE: AtomicU64 = AtomicU64::new(1);

impl TimerHandle {
    fn next() -> Self {
        TimerHandle(NEXT_TIMER_HANDLE.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw handle value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone)]
struct TimerEntry {
    handle: TimerHandle,
    timer: TimerProc,
}

#[derive(Debug, Clone)]
struct Failsafe {
    timer: TimerProc,
    period_hint_us: u32,
}

/// Bounded, insertion-ordered, deduplicated timer callback list plus the failsafe slot
pub struct TimerRegistry {
    /// Current snapshot, replaced wholesale on every mutation
    entries: RwLock<Arc<Vec<TimerEntry>>>,

    /// Failsafe callback; last registration wins
    failsafe: RwLock<Option<Failsafe>>,

    /// Maximum number of periodic callbacks
    capacity: usize,
}

impl TimerRegistry {
    /// Create an empty registry holding at most `capacity` periodic callbacks
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(Arc::new(Vec::with_capacity(capacity))),
            failsafe: RwLock::new(None),
            capacity,
        }
    }

    /// Register a periodic callback
    ///
    /// Registering a callback that is already present is a no-op returning its
    /// existing handle. When the registry is full the list is left untouched and
    /// [`SchedulerError::TimerCapacity`] is returned.
    pub fn register(&self, timer: TimerProc) -> SchedulerResult<TimerHandle> {
        let mut entries = self.entries.write();

        if let Some(existing) = entries.iter().find(|entry| entry.timer.same_as(&timer)) {
            return Ok(existing.handle);
        }

        if entries.len() >= self.capacity {
            tracing::warn!(capacity = self.capacity, "out of timer processes");
            return Err(SchedulerError::TimerCapacity {
                capacity: self.capacity,
            });
        }

        let handle = TimerHandle::next();
        let mut next = Vec::with_capacity(entries.len() + 1);
        next.extend(entries.iter().cloned());
        next.push(TimerEntry { handle, timer });
        *entries = Arc::new(next);

        tracing::trace!(handle = handle.as_u64(), len = entries.len(), "timer registered");
        Ok(handle)
    }

    /// Remove a periodic callback, keeping the order of the rest
    ///
    /// Returns false if the handle is not registered.
    pub fn unregister(&self, handle: TimerHandle) -> bool {
        let mut entries = self.entries.write();
        if !entries.iter().any(|entry| entry.handle == handle) {
            return false;
        }

        let next: Vec<_> = entries
            .iter()
            .filter(|entry| entry.handle != handle)
            .cloned()
            .collect();
        *entries = Arc::new(next);
        true
    }

    /// Handles of the registered callbacks, in fan-out order
    pub fn handles(&self) -> Vec<TimerHandle> {
        self.entries.read().iter().map(|entry| entry.handle).collect()
    }

    /// Number of registered periodic callbacks
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether no periodic callback is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of periodic callbacks
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Invoke every periodic callback in registration order
    ///
    /// Returns the number of callbacks invoked. Panics from callbacks propagate.
    pub fn fire_periodic(&self, now_micros: u32) -> usize {
        let snapshot = self.entries.read().clone();
        for entry in snapshot.iter() {
            entry.timer.call(now_micros);
        }
        snapshot.len()
    }

    /// Install the failsafe callback, replacing any previous one
    ///
    /// `period_hint_us` is recorded but not enforced: the failsafe runs on every
    /// fan-out.
    pub fn set_failsafe(&self, timer: TimerProc, period_hint_us: u32) {
        *self.failsafe.write() = Some(Failsafe {
            timer,
            period_hint_us,
        });
    }

    /// Whether a failsafe callback is installed
    pub fn has_failsafe(&self) -> bool {
        self.failsafe.read().is_some()
    }

    /// Period hint given with the current failsafe registration
    pub fn failsafe_period_hint(&self) -> Option<u32> {
        self.failsafe.read().as_ref().map(|f| f.period_hint_us)
    }

    /// Invoke the failsafe callback if one is installed
    pub fn fire_failsafe(&self, now_micros: u32) -> bool {
        let failsafe = self.failsafe.read().as_ref().map(|f| f.timer.clone());
        match failsafe {
            Some(timer) => {
                timer.call(now_micros);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for TimerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerRegistry")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .field("failsafe", &self.has_failsafe())
            .finish()
    }
}
