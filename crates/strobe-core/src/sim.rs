//! Deterministic simulated clock and platform
//!
//! Simulated time only moves when someone yields or busy-waits, so delays and
//! elapsed-time arithmetic run instantly and reproducibly. Process termination
//! unwinds with a typed payload ([`SimExit`], [`SimReset`]) instead of ending the
//! process, which lets callers observe fatal paths with `catch_unwind`.

use crate::clock::Clock;
use crate::platform::{ContextSpec, Platform};
use parking_lot::Mutex;
use std::any::Any;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Manually advanced microsecond clock
#[derive(Debug, Default)]
pub struct SimClock {
    now: AtomicU64,
}

impl SimClock {
    /// Create a clock reading `start` microseconds
    pub fn new(start: u64) -> Self {
        Self {
            now: AtomicU64::new(start),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, micros: u64) {
        self.now.fetch_add(micros, Ordering::AcqRel);
    }

    /// Jump the clock to an absolute reading
    pub fn set(&self, micros: u64) {
        self.now.store(micros, Ordering::Release);
    }
}

impl Clock for SimClock {
    fn now_micros(&self) -> u64 {
        self.now.load(Ordering::Acquire)
    }
}

/// Unwind payload raised by [`SimPlatform::exit`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimExit {
    /// Requested exit status
    pub code: i32,
}

/// Unwind payload raised by [`SimPlatform::reset`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimReset;

/// Extract the exit status from a `catch_unwind` payload, if it was a [`SimExit`]
pub fn exit_code(payload: &(dyn Any + Send)) -> Option<i32> {
    payload.downcast_ref::<SimExit>().map(|exit| exit.code)
}

/// Platform whose time is a [`SimClock`]
#[derive(Debug)]
pub struct SimPlatform {
    clock: Arc<SimClock>,
    console: Mutex<Vec<u8>>,
    yields: AtomicU64,
    busy_waits: AtomicU64,
}

impl SimPlatform {
    /// Create a platform driving `clock`
    pub fn new(clock: Arc<SimClock>) -> Self {
        Self {
            clock,
            console: Mutex::new(Vec::new()),
            yields: AtomicU64::new(0),
            busy_waits: AtomicU64::new(0),
        }
    }

    /// Everything written through [`Platform::write_raw`] so far
    pub fn console(&self) -> String {
        String::from_utf8_lossy(&self.console.lock()).into_owned()
    }

    /// Number of [`Platform::yield_for`] calls
    pub fn yield_count(&self) -> u64 {
        self.yields.load(Ordering::Relaxed)
    }

    /// Number of [`Platform::busy_wait_micros`] calls
    pub fn busy_wait_count(&self) -> u64 {
        self.busy_waits.load(Ordering::Relaxed)
    }
}

impl Platform for SimPlatform {
    fn spawn_context(
        &self,
        spec: &ContextSpec,
        body: Box<dyn FnOnce() + Send + 'static>,
    ) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name(spec.name.clone())
            .stack_size(spec.stack_size)
            .spawn(body)
    }

    fn yield_for(&self, duration: Duration) {
        self.yields.fetch_add(1, Ordering::Relaxed);
        self.clock.advance(duration.as_micros() as u64);
        thread::yield_now();
    }

    fn busy_wait_micros(&self, micros: u32) {
        self.busy_waits.fetch_add(1, Ordering::Relaxed);
        // Always make progress so elapsed-time loops terminate
        self.clock.advance(u64::from(micros.max(1)));
    }

    fn write_raw(&self, bytes: &[u8]) {
        self.console.lock().extend_from_slice(bytes);
    }

    fn exit(&self, code: i32) -> ! {
        std::panic::panic_any(SimExit { code })
    }

    fn reset(&self) -> ! {
        std::panic::panic_any(SimReset)
    }
}
