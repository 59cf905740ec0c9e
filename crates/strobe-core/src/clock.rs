//! Monotonic time sources
//!
//! The scheduler only ever asks a clock for a raw microsecond reading. Elapsed
//! time is derived from an [`Epoch`] captured when the scheduler starts, and the
//! microsecond counter handed to timer callbacks is truncated to 32 bits so that
//! `later.wrapping_sub(earlier)` stays correct across wraparound.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// A monotonic microsecond time source
pub trait Clock: Send + Sync {
    /// Raw monotonic reading in microseconds (never goes backwards)
    fn now_micros(&self) -> u64;
}

/// Host clock backed by [`Instant`]
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Create a clock whose zero is the moment of construction
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_micros(&self) -> u64 {
        self.origin.elapsed().as_micros() as u64
    }
}

/// Clock reading captured once at scheduler start
#[derive(Debug, Default)]
pub struct Epoch {
    start: AtomicU64,
}

impl Epoch {
    /// Create an epoch at raw time zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the current reading of `clock` as the epoch
    pub fn capture(&self, clock: &dyn Clock) -> u64 {
        let now = clock.now_micros();
        self.start.store(now, Ordering::Release);
        now
    }

    /// Raw clock value of the epoch
    pub fn raw(&self) -> u64 {
        self.start.load(Ordering::Acquire)
    }

    /// Microseconds since the epoch, truncated to the 32-bit wrapping counter
    #[inline]
    pub fn elapsed_micros(&self, now: u64) -> u32 {
        now.wrapping_sub(self.raw()) as u32
    }

    /// Milliseconds since the epoch
    #[inline]
    pub fn elapsed_millis(&self, now: u64) -> u64 {
        now.saturating_sub(self.raw()) / 1000
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimClock;

    #[test]
    fn test_monotonic_clock_never_goes_backwards() {
        let clock = MonotonicClock::new();
        let a = clock.now_micros();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = clock.now_micros();
        assert!(b >= a + 1000);
    }

    #[test]
    fn test_epoch_offsets_readings() {
        let clock = SimClock::new(5_000_000);
        let epoch = Epoch::new();
        assert_eq!(epoch.capture(&clock), 5_000_000);

        clock.advance(1_500);
        assert_eq!(epoch.elapsed_micros(clock.now_micros()), 1_500);
        assert_eq!(epoch.elapsed_millis(clock.now_micros()), 1);
    }

    #[test]
    fn test_elapsed_micros_truncates_to_32_bits() {
        let epoch = Epoch::new();
        let now = u32::MAX as u64 + 11;
        assert_eq!(epoch.elapsed_micros(now), 10);
        // Millisecond reads keep the full width
        assert_eq!(epoch.elapsed_millis(now), now / 1000);
    }

    #[test]
    fn test_wrapping_difference_survives_rollover() {
        let epoch = Epoch::new();
        let before = epoch.elapsed_micros(u32::MAX as u64 - 4);
        let after = epoch.elapsed_micros(u32::MAX as u64 + 6);
        assert!(after < before);
        assert_eq!(after.wrapping_sub(before), 10);
    }
}
