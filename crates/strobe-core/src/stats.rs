//! Scheduler statistics

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time copy of the scheduler counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Dispatcher wake-ups that attempted a fan-out
    pub dispatcher_ticks: u64,

    /// Fan-outs that ran the periodic callbacks
    pub fan_outs: u64,

    /// Dispatcher ticks that arrived while suspended
    pub deferred_ticks: u64,

    /// Fan-out attempts rejected because another was in progress
    pub rejected_fan_outs: u64,

    /// Catch-up fan-outs performed by `resume`
    pub catch_ups: u64,

    /// Failsafe callback invocations
    pub failsafe_calls: u64,
}

/// Live counters, updated from both execution contexts
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    pub(crate) dispatcher_ticks: AtomicU64,
    pub(crate) fan_outs: AtomicU64,
    pub(crate) deferred_ticks: AtomicU64,
    pub(crate) rejected_fan_outs: AtomicU64,
    pub(crate) catch_ups: AtomicU64,
    pub(crate) failsafe_calls: AtomicU64,
}

impl StatsCounters {
    #[inline]
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> SchedulerStats {
        SchedulerStats {
            dispatcher_ticks: self.dispatcher_ticks.load(Ordering::Relaxed),
            fan_outs: self.fan_outs.load(Ordering::Relaxed),
            deferred_ticks: self.deferred_ticks.load(Ordering::Relaxed),
            rejected_fan_outs: self.rejected_fan_outs.load(Ordering::Relaxed),
            catch_ups: self.catch_ups.load(Ordering::Relaxed),
            failsafe_calls: self.failsafe_calls.load(Ordering::Relaxed),
        }
    }
}
