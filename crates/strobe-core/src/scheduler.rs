//! Scheduler facade
//!
//! One `Scheduler` per process, owned by the application and passed explicitly
//! (usually as `Arc<Scheduler>`) to every context that needs it. The dispatcher
//! context only holds the shared fan-out core.

use crate::clock::{Clock, MonotonicClock};
use crate::config::SchedulerConfig;
use crate::delay::{DelayProc, DelayPump};
use crate::dispatcher::{Dispatcher, DispatcherState};
use crate::error::{SchedulerError, SchedulerResult};
use crate::fanout::FanOutCore;
use crate::gate::{FanOutOutcome, TickSource};
use crate::init::InitGate;
use crate::platform::{HostPlatform, Platform};
use crate::registry::{TimerHandle, TimerProc};
use crate::shutdown::ShutdownSignal;
use crate::stats::SchedulerStats;
use std::sync::Arc;

/// Builder for [`Scheduler`]
///
/// Defaults to the host clock and platform and a fresh shutdown signal.
#[derive(Default)]
pub struct SchedulerBuilder {
    config: SchedulerConfig,
    clock: Option<Arc<dyn Clock>>,
    platform: Option<Arc<dyn Platform>>,
    shutdown: Option<ShutdownSignal>,
}

impl SchedulerBuilder {
    /// Start from the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `config`
    pub fn config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// Use `clock` as the time source
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Use `platform` for contexts, yielding, output and termination
    pub fn platform(mut self, platform: Arc<dyn Platform>) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Share an existing process-wide shutdown signal
    pub fn shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Validate the configuration and assemble the scheduler
    pub fn build(self) -> SchedulerResult<Scheduler> {
        self.config.validate()?;

        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(MonotonicClock::new()) as Arc<dyn Clock>);
        let platform = self
            .platform
            .unwrap_or_else(|| Arc::new(HostPlatform::new()) as Arc<dyn Platform>);
        let shutdown = self.shutdown.unwrap_or_default();

        let core = Arc::new(FanOutCore::new(
            clock.clone(),
            self.config.max_timer_procs,
        ));
        let dispatcher = Dispatcher::new(
            core.clone(),
            platform.clone(),
            self.config.dispatcher_context(),
            self.config.tick_period(),
            shutdown.clone(),
        );
        let delay = DelayPump::new(
            clock,
            platform.clone(),
            shutdown.clone(),
            self.config.delay_slice(),
        );

        Ok(Scheduler {
            core,
            dispatcher,
            delay,
            init: InitGate::new(),
            platform,
            shutdown,
            config: self.config,
        })
    }
}

/// Periodic timer scheduler
pub struct Scheduler {
    /// Registry, gate, clock, epoch and counters shared with the dispatcher
    core: Arc<FanOutCore>,

    /// Fixed-rate dispatcher context
    dispatcher: Dispatcher,

    /// Cooperative delays
    delay: DelayPump,

    /// Initialization latch
    init: InitGate,

    /// Host services
    platform: Arc<dyn Platform>,

    /// Process-wide shutdown signal
    shutdown: ShutdownSignal,

    /// Effective configuration
    config: SchedulerConfig,
}

impl Scheduler {
    /// Create a scheduler on the host clock and platform
    pub fn host(config: SchedulerConfig) -> SchedulerResult<Self> {
        SchedulerBuilder::new().config(config).build()
    }

    /// Create a scheduler with explicit collaborators
    pub fn new(
        config: SchedulerConfig,
        clock: Arc<dyn Clock>,
        platform: Arc<dyn Platform>,
    ) -> SchedulerResult<Self> {
        SchedulerBuilder::new()
            .config(config)
            .clock(clock)
            .platform(platform)
            .build()
    }

    /// Capture the epoch and start the dispatcher context
    pub fn start(&self) -> SchedulerResult<()> {
        if self.dispatcher.state() != DispatcherState::Idle {
            return Err(SchedulerError::AlreadyStarted);
        }
        let epoch = self.core.epoch.capture(self.core.clock.as_ref());
        self.dispatcher.start()?;
        tracing::debug!(epoch, "scheduler started");
        Ok(())
    }

    /// Stop the dispatcher and wait for it to exit
    pub fn stop(&self) {
        self.dispatcher.stop();
    }

    /// Dispatcher lifecycle state
    pub fn dispatcher_state(&self) -> DispatcherState {
        self.dispatcher.state()
    }

    // ── Clock ────────────────────────────────────────────────────────

    /// Microseconds since start, as a 32-bit wrapping counter
    pub fn now_micros(&self) -> u32 {
        self.core.now_micros()
    }

    /// Milliseconds since start
    pub fn now_millis(&self) -> u64 {
        self.core.now_millis()
    }

    // ── Timer callbacks ──────────────────────────────────────────────

    /// Register a periodic callback (idempotent for an already registered proc)
    pub fn register_timer_callback(&self, timer: TimerProc) -> SchedulerResult<TimerHandle> {
        self.core.registry.register(timer)
    }

    /// Remove a periodic callback; effective from the next fan-out
    pub fn unregister_timer_callback(&self, handle: TimerHandle) -> bool {
        self.core.registry.unregister(handle)
    }

    /// Number of registered periodic callbacks
    pub fn timer_count(&self) -> usize {
        self.core.registry.len()
    }

    /// Install the failsafe callback, replacing any previous one
    ///
    /// The failsafe runs at the end of every fan-out, suspended or not.
    /// `period_hint_us` is kept for reporting only and does not throttle it.
    pub fn register_failsafe(&self, timer: TimerProc, period_hint_us: u32) {
        tracing::debug!(period_hint_us, "failsafe registered; period hint not enforced");
        self.core.registry.set_failsafe(timer, period_hint_us);
    }

    /// Period hint of the current failsafe
    pub fn failsafe_period_hint(&self) -> Option<u32> {
        self.core.registry.failsafe_period_hint()
    }

    /// Suspend periodic callbacks; ticks arriving meanwhile are coalesced
    pub fn suspend(&self) {
        self.core.gate.suspend();
    }

    /// Resume periodic callbacks
    ///
    /// If a dispatcher tick was missed while suspended, one catch-up fan-out runs
    /// synchronously on the calling context before this returns.
    pub fn resume(&self) {
        if self.core.gate.resume() {
            let outcome = self.core.fan_out(TickSource::Resume);
            tracing::trace!(?outcome, "resume catch-up");
        }
    }

    /// Whether periodic callbacks are suspended
    pub fn is_suspended(&self) -> bool {
        self.core.gate.is_suspended()
    }

    /// Run one fan-out on the calling context
    ///
    /// While suspended this runs only the failsafe and records nothing.
    pub fn run_timers(&self) -> FanOutOutcome {
        self.core.fan_out(TickSource::Forced)
    }

    /// Perform one dispatcher tick on the calling context
    ///
    /// For hosts that drive ticks from their own timer (or a simulation step)
    /// instead of the dispatcher context. Suspended ticks are recorded as missed
    /// exactly as the dispatcher's would be.
    pub fn dispatch_tick(&self) -> FanOutOutcome {
        self.core.dispatch_tick()
    }

    /// Whether a dispatcher tick arrived while suspended and is still owed
    pub fn has_missed_tick(&self) -> bool {
        self.core.gate.is_missed()
    }

    /// Whether a fan-out is in progress on any context
    pub fn is_in_fan_out(&self) -> bool {
        self.core.gate.is_in_fan_out()
    }

    // ── Delays ───────────────────────────────────────────────────────

    /// Wait `ms` milliseconds, servicing the delay callback
    ///
    /// Terminates the process if shutdown is requested before it completes.
    pub fn delay(&self, ms: u16) {
        self.delay.delay(ms);
    }

    /// Busy-wait `us` microseconds
    pub fn delay_microseconds(&self, us: u16) {
        self.delay.delay_microseconds(us);
    }

    /// Install the delay callback and the shortest delay that runs it
    pub fn register_delay_callback(&self, callback: DelayProc, min_interval_ms: u16) {
        self.delay.register_callback(callback, min_interval_ms);
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// True until [`Scheduler::mark_initialized`] has been called
    pub fn is_initializing(&self) -> bool {
        self.init.is_initializing()
    }

    /// Leave the initializing state; a second call panics the system
    pub fn mark_initialized(&self) {
        if let Err(fatal) = self.init.mark_initialized() {
            self.panic(&fatal.to_string());
        }
    }

    /// Report `message` on the raw output and terminate the process
    ///
    /// Raises the shutdown signal before exiting so the dispatcher and any
    /// in-progress delay stop promptly.
    pub fn panic(&self, message: &str) -> ! {
        tracing::error!("{message}");
        self.platform.write_raw(message.as_bytes());
        self.platform.write_raw(b"\n");
        self.delay.delay_microseconds(self.config.panic_flush_us);
        self.shutdown.raise();
        self.platform.exit(1)
    }

    /// Reset the process
    pub fn reboot(&self) -> ! {
        tracing::info!("rebooting");
        self.platform.reset()
    }

    /// The process-wide shutdown signal
    pub fn shutdown_signal(&self) -> &ShutdownSignal {
        &self.shutdown
    }

    /// Counter snapshot
    pub fn stats(&self) -> SchedulerStats {
        self.core.stats.snapshot()
    }

    /// Effective configuration
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.dispatcher.stop();
    }
}
