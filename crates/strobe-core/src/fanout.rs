//! Shared fan-out state
//!
//! Everything the dispatcher context needs lives here, so the dispatcher thread
//! holds an `Arc<FanOutCore>` rather than the whole scheduler.

use crate::clock::{Clock, Epoch};
use crate::gate::{FanOutGate, FanOutOutcome, TickSource};
use crate::registry::TimerRegistry;
use crate::stats::StatsCounters;
use std::sync::Arc;

/// Registry, gate, clock and counters shared by the dispatcher and callers
pub struct FanOutCore {
    pub(crate) registry: TimerRegistry,
    pub(crate) gate: FanOutGate,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) epoch: Epoch,
    pub(crate) stats: StatsCounters,
}

impl FanOutCore {
    pub(crate) fn new(clock: Arc<dyn Clock>, capacity: usize) -> Self {
        Self {
            registry: TimerRegistry::new(capacity),
            gate: FanOutGate::new(),
            clock,
            epoch: Epoch::new(),
            stats: StatsCounters::default(),
        }
    }

    /// Elapsed microseconds since the epoch (32-bit wrapping)
    #[inline]
    pub fn now_micros(&self) -> u32 {
        self.epoch.elapsed_micros(self.clock.now_micros())
    }

    /// Elapsed milliseconds since the epoch
    #[inline]
    pub fn now_millis(&self) -> u64 {
        self.epoch.elapsed_millis(self.clock.now_micros())
    }

    /// One dispatcher tick: count it and fan out as the dispatcher
    pub fn dispatch_tick(&self) -> FanOutOutcome {
        StatsCounters::bump(&self.stats.dispatcher_ticks);
        self.fan_out(TickSource::Dispatcher)
    }

    /// Run one fan-out attempt
    ///
    /// 1. Reject if another fan-out is in progress (nothing fires).
    /// 2. Not suspended: run periodic callbacks in order and discharge any owed tick.
    /// 3. Suspended: a dispatcher tick records the miss; other sources skip.
    /// 4. The failsafe runs last on every admitted attempt.
    pub fn fan_out(&self, source: TickSource) -> FanOutOutcome {
        let now = self.now_micros();

        let Some(guard) = self.gate.try_enter() else {
            StatsCounters::bump(&self.stats.rejected_fan_outs);
            return FanOutOutcome::Rejected;
        };

        let outcome = self.gate.admit(&guard, source);
        match outcome {
            FanOutOutcome::Ran => {
                self.registry.fire_periodic(now);
                self.gate.complete(&guard);
                StatsCounters::bump(&self.stats.fan_outs);
                if source == TickSource::Resume {
                    StatsCounters::bump(&self.stats.catch_ups);
                }
            }
            FanOutOutcome::Deferred => {
                StatsCounters::bump(&self.stats.deferred_ticks);
            }
            FanOutOutcome::Skipped | FanOutOutcome::Rejected => {}
        }

        if self.registry.fire_failsafe(now) {
            StatsCounters::bump(&self.stats.failsafe_calls);
        }

        drop(guard);
        outcome
    }
}
