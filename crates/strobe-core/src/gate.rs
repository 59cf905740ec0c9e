//! Fan-out admission: reentrancy guard and suspend gate
//!
//! At most one fan-out is in progress at any instant. An admitted fan-out then
//! consults the suspend state: while suspended, a dispatcher tick records that a
//! tick was owed instead of running periodic callbacks, and the next resume pays
//! that debt with a single catch-up fan-out.

use std::sync::atomic::{AtomicBool, Ordering};

/// What triggered a fan-out attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickSource {
    /// Periodic tick from the dispatcher context
    Dispatcher,
    /// Catch-up run from `resume`
    Resume,
    /// Explicit run requested by a caller
    Forced,
}

/// Result of a fan-out attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanOutOutcome {
    /// Periodic callbacks ran
    Ran,
    /// Suspended dispatcher tick; the miss was recorded
    Deferred,
    /// Suspended non-dispatcher run; nothing recorded
    Skipped,
    /// Another fan-out was in progress; nothing fired
    Rejected,
}

impl FanOutOutcome {
    /// Whether the failsafe callback was given a chance to run
    pub fn was_admitted(self) -> bool {
        !matches!(self, FanOutOutcome::Rejected)
    }
}

/// Suspend state and reentrancy flag shared by the dispatcher and callers
#[derive(Debug, Default)]
pub struct FanOutGate {
    /// A fan-out is running
    in_fan_out: AtomicBool,

    /// Periodic callbacks are suspended
    suspended: AtomicBool,

    /// A dispatcher tick arrived while suspended
    missed: AtomicBool,
}

/// Held for the duration of an admitted fan-out; clears the flag on drop
#[derive(Debug)]
pub struct FanOutGuard<'a> {
    gate: &'a FanOutGate,
}

impl Drop for FanOutGuard<'_> {
    fn drop(&mut self) {
        self.gate.in_fan_out.store(false, Ordering::Release);
    }
}

impl FanOutGate {
    /// Create an open gate: not suspended, nothing missed, no fan-out running
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to become the single in-progress fan-out
    pub fn try_enter(&self) -> Option<FanOutGuard<'_>> {
        self.in_fan_out
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FanOutGuard { gate: self })
    }

    /// Decide what an admitted fan-out does with the periodic callbacks
    ///
    /// Only a dispatcher tick records a miss while suspended.
    pub fn admit(&self, _guard: &FanOutGuard<'_>, source: TickSource) -> FanOutOutcome {
        if !self.suspended.load(Ordering::Acquire) {
            return FanOutOutcome::Ran;
        }
        match source {
            TickSource::Dispatcher => {
                self.missed.store(true, Ordering::Release);
                FanOutOutcome::Deferred
            }
            TickSource::Resume | TickSource::Forced => FanOutOutcome::Skipped,
        }
    }

    /// Record that periodic callbacks completed; any owed tick is discharged
    pub fn complete(&self, _guard: &FanOutGuard<'_>) {
        self.missed.store(false, Ordering::Release);
    }

    /// Whether a fan-out is in progress
    #[inline]
    pub fn is_in_fan_out(&self) -> bool {
        self.in_fan_out.load(Ordering::Acquire)
    }

    /// Suspend periodic callbacks (idempotent)
    pub fn suspend(&self) {
        self.suspended.store(true, Ordering::Release);
    }

    /// Lift the suspension; returns whether a tick was missed meanwhile
    pub fn resume(&self) -> bool {
        self.suspended.store(false, Ordering::Release);
        self.missed.load(Ordering::Acquire)
    }

    /// Whether periodic callbacks are suspended
    #[inline]
    pub fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::Acquire)
    }

    /// Whether a dispatcher tick is owed
    #[inline]
    pub fn is_missed(&self) -> bool {
        self.missed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_excludes_second_entry() {
        let gate = FanOutGate::new();
        let guard = gate.try_enter().expect("first entry");
        assert!(gate.is_in_fan_out());
        assert!(gate.try_enter().is_none());

        drop(guard);
        assert!(!gate.is_in_fan_out());
        assert!(gate.try_enter().is_some());
    }

    #[test]
    fn test_guard_released_on_unwind() {
        let gate = FanOutGate::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = gate.try_enter().unwrap();
            panic!("callback failed");
        }));
        assert!(result.is_err());
        assert!(!gate.is_in_fan_out());
    }

    #[test]
    fn test_admit_when_running() {
        let gate = FanOutGate::new();
        let guard = gate.try_enter().unwrap();
        assert_eq!(gate.admit(&guard, TickSource::Dispatcher), FanOutOutcome::Ran);
        assert_eq!(gate.admit(&guard, TickSource::Forced), FanOutOutcome::Ran);
        assert!(!gate.is_missed());
    }

    #[test]
    fn test_only_dispatcher_records_miss() {
        let gate = FanOutGate::new();
        gate.suspend();
        let guard = gate.try_enter().unwrap();

        assert_eq!(gate.admit(&guard, TickSource::Forced), FanOutOutcome::Skipped);
        assert!(!gate.is_missed());

        assert_eq!(
            gate.admit(&guard, TickSource::Dispatcher),
            FanOutOutcome::Deferred
        );
        assert!(gate.is_missed());
    }

    #[test]
    fn test_repeated_suspend_keeps_single_miss() {
        let gate = FanOutGate::new();
        gate.suspend();
        {
            let guard = gate.try_enter().unwrap();
            gate.admit(&guard, TickSource::Dispatcher);
        }
        gate.suspend();
        gate.suspend();
        assert!(gate.is_suspended());
        assert!(gate.is_missed());

        assert!(gate.resume());
        assert!(!gate.is_suspended());
    }

    #[test]
    fn test_complete_discharges_miss() {
        let gate = FanOutGate::new();
        gate.suspend();
        {
            let guard = gate.try_enter().unwrap();
            gate.admit(&guard, TickSource::Dispatcher);
        }
        assert!(gate.resume());

        let guard = gate.try_enter().unwrap();
        assert_eq!(gate.admit(&guard, TickSource::Resume), FanOutOutcome::Ran);
        gate.complete(&guard);
        assert!(!gate.is_missed());
    }

    #[test]
    fn test_outcome_admission() {
        assert!(FanOutOutcome::Ran.was_admitted());
        assert!(FanOutOutcome::Deferred.was_admitted());
        assert!(FanOutOutcome::Skipped.was_admitted());
        assert!(!FanOutOutcome::Rejected.was_admitted());
    }
}
