//! Cooperative delays
//!
//! A millisecond delay yields in short slices and, when the requested duration
//! reaches the configured threshold, calls the registered delay callback once per
//! slice so long waits keep other work moving. A shutdown observed mid-delay
//! terminates the process rather than letting the caller continue.

use crate::clock::Clock;
use crate::error::Fatal;
use crate::platform::Platform;
use crate::shutdown::ShutdownSignal;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Signature of a delay callback
pub type DelayFn = dyn Fn() + Send + Sync;

/// Callback invoked while a long delay is in progress
#[derive(Clone)]
pub struct DelayProc {
    func: Arc<DelayFn>,
}

impl DelayProc {
    /// Wrap a closure as a delay callback
    pub fn new<F>(func: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(func),
        }
    }

    /// Invoke the callback
    #[inline]
    pub fn call(&self) {
        (self.func)()
    }
}

impl fmt::Debug for DelayProc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DelayProc({:p})", Arc::as_ptr(&self.func) as *const ())
    }
}

/// Delay callback and the shortest delay that services it
#[derive(Debug, Clone, Default)]
pub struct DelayConfig {
    /// Callback to run once per slice of a long delay
    pub callback: Option<DelayProc>,

    /// Delays shorter than this (in ms) never run the callback
    pub min_interval_ms: u16,
}

impl DelayConfig {
    /// The callback to service during a delay of `ms`, if any
    pub fn callback_for(&self, ms: u16) -> Option<&DelayProc> {
        if ms >= self.min_interval_ms {
            self.callback.as_ref()
        } else {
            None
        }
    }
}

/// Blocking waits driven from caller contexts
pub struct DelayPump {
    clock: Arc<dyn Clock>,
    platform: Arc<dyn Platform>,
    shutdown: ShutdownSignal,
    slice: Duration,
    config: RwLock<DelayConfig>,
}

impl DelayPump {
    /// Create a pump yielding in `slice`-long steps
    pub fn new(
        clock: Arc<dyn Clock>,
        platform: Arc<dyn Platform>,
        shutdown: ShutdownSignal,
        slice: Duration,
    ) -> Self {
        Self {
            clock,
            platform,
            shutdown,
            slice,
            config: RwLock::new(DelayConfig::default()),
        }
    }

    /// Replace the delay callback and its threshold
    pub fn register_callback(&self, callback: DelayProc, min_interval_ms: u16) {
        *self.config.write() = DelayConfig {
            callback: Some(callback),
            min_interval_ms,
        };
    }

    /// Current delay configuration
    pub fn config(&self) -> DelayConfig {
        self.config.read().clone()
    }

    /// Wait at least `ms` milliseconds, yielding between checks
    ///
    /// Does not return if shutdown is requested before the wait completes.
    pub fn delay(&self, ms: u16) {
        let start = self.clock.now_micros();
        let elapsed_ms = || self.clock.now_micros().saturating_sub(start) / 1000;

        while elapsed_ms() < u64::from(ms) {
            self.platform.yield_for(self.slice);

            if self.shutdown.is_raised() {
                self.abort(Fatal::ShutdownDuringDelay);
            }

            let callback = self.config.read().callback_for(ms).cloned();
            if let Some(callback) = callback {
                callback.call();
            }
        }

        if self.shutdown.is_raised() {
            self.abort(Fatal::ShutdownDuringDelay);
        }
    }

    /// Wait at least `us` microseconds without yielding
    ///
    /// Measured on the 32-bit wrapping counter, so a rollover mid-wait is harmless.
    /// Never runs the delay callback.
    pub fn delay_microseconds(&self, us: u16) {
        let target = u32::from(us);
        let start = self.clock.now_micros() as u32;
        loop {
            let elapsed = (self.clock.now_micros() as u32).wrapping_sub(start);
            if elapsed >= target {
                break;
            }
            self.platform.busy_wait_micros(target - elapsed);
        }
    }

    fn abort(&self, fatal: Fatal) -> ! {
        tracing::error!("{fatal}");
        self.platform.write_raw(fatal.to_string().as_bytes());
        self.platform.write_raw(b"\n");
        self.platform.exit(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{self, SimClock, SimPlatform};
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::atomic::{AtomicU64, Ordering};

    fn sim_pump() -> (Arc<SimClock>, Arc<SimPlatform>, ShutdownSignal, DelayPump) {
        let clock = Arc::new(SimClock::new(1_000_000));
        let platform = Arc::new(SimPlatform::new(clock.clone()));
        let shutdown = ShutdownSignal::new();
        let pump = DelayPump::new(
            clock.clone(),
            platform.clone(),
            shutdown.clone(),
            Duration::from_millis(1),
        );
        (clock, platform, shutdown, pump)
    }

    fn counting_callback() -> (Arc<AtomicU64>, DelayProc) {
        let count = Arc::new(AtomicU64::new(0));
        let c = count.clone();
        (
            count,
            DelayProc::new(move || {
                c.fetch_add(1, Ordering::Relaxed);
            }),
        )
    }

    #[test]
    fn test_callback_threshold() {
        let config = DelayConfig {
            callback: Some(DelayProc::new(|| {})),
            min_interval_ms: 100,
        };
        assert!(config.callback_for(50).is_none());
        assert!(config.callback_for(100).is_some());
        assert!(DelayConfig::default().callback_for(500).is_none());
    }

    #[test]
    fn test_delay_waits_requested_time() {
        let (clock, platform, _, pump) = sim_pump();
        let start = clock.now_micros();
        pump.delay(25);
        assert!(clock.now_micros() - start >= 25_000);
        assert_eq!(platform.yield_count(), 25);
    }

    #[test]
    fn test_short_delay_skips_callback() {
        let (_, _, _, pump) = sim_pump();
        let (count, callback) = counting_callback();
        pump.register_callback(callback, 100);

        pump.delay(50);
        assert_eq!(count.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_long_delay_services_callback_each_slice() {
        let (_, platform, _, pump) = sim_pump();
        let (count, callback) = counting_callback();
        pump.register_callback(callback, 10);

        pump.delay(50);
        assert!(count.load(Ordering::Relaxed) >= 1);
        assert_eq!(count.load(Ordering::Relaxed), platform.yield_count());
    }

    #[test]
    fn test_register_callback_last_wins() {
        let (_, _, _, pump) = sim_pump();
        let (first, cb1) = counting_callback();
        let (second, cb2) = counting_callback();
        pump.register_callback(cb1, 1);
        pump.register_callback(cb2, 5);
        assert_eq!(pump.config().min_interval_ms, 5);

        pump.delay(5);
        assert_eq!(first.load(Ordering::Relaxed), 0);
        assert!(second.load(Ordering::Relaxed) > 0);
    }

    #[test]
    fn test_zero_delay_returns_immediately() {
        let (_, platform, _, pump) = sim_pump();
        pump.delay(0);
        assert_eq!(platform.yield_count(), 0);
    }

    #[test]
    fn test_delay_microseconds_busy_waits() {
        let (clock, platform, _, pump) = sim_pump();
        let (count, callback) = counting_callback();
        pump.register_callback(callback, 0);

        let start = clock.now_micros();
        pump.delay_microseconds(1000);
        assert!(clock.now_micros() - start >= 1000);
        assert_eq!(platform.yield_count(), 0);
        assert_eq!(count.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_delay_microseconds_across_rollover() {
        let (clock, _, _, pump) = sim_pump();
        clock.set(u32::MAX as u64 - 100);
        let start = clock.now_micros();
        pump.delay_microseconds(500);
        assert!(clock.now_micros() - start >= 500);
    }

    #[test]
    fn test_shutdown_mid_delay_exits() {
        let (_, platform, shutdown, pump) = sim_pump();
        let calls = Arc::new(AtomicU64::new(0));
        let c = calls.clone();
        let signal = shutdown.clone();
        pump.register_callback(
            DelayProc::new(move || {
                if c.fetch_add(1, Ordering::Relaxed) == 2 {
                    signal.raise();
                }
            }),
            0,
        );

        let err = panic::catch_unwind(AssertUnwindSafe(|| pump.delay(1000))).unwrap_err();
        assert_eq!(sim::exit_code(err.as_ref()), Some(1));
        // Third callback raised shutdown; the next slice observed it
        assert_eq!(calls.load(Ordering::Relaxed), 3);
        assert_eq!(platform.yield_count(), 4);
        assert!(platform.console().contains("shutdown requested during delay"));
    }

    #[test]
    fn test_zero_delay_after_shutdown_exits() {
        let (_, _, shutdown, pump) = sim_pump();
        shutdown.raise();
        let err = panic::catch_unwind(AssertUnwindSafe(|| pump.delay(0))).unwrap_err();
        assert_eq!(sim::exit_code(err.as_ref()), Some(1));
    }
}
