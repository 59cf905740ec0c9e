//! Fixed-rate dispatcher thread
//!
//! Wakes once per tick period and asks the shared core for a fan-out. The loop
//! exits when the process-wide shutdown signal is raised or when its owner stops
//! it; it never performs a final fan-out on the way out.

use crate::error::{SchedulerError, SchedulerResult};
use crate::fanout::FanOutCore;
use crate::platform::{ContextSpec, Platform};
use crate::shutdown::ShutdownSignal;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Dispatcher lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    /// Constructed, not started
    Idle,
    /// Loop running on its own context
    Running,
    /// Loop exited; terminal
    Stopped,
}

/// Owner of the dispatcher execution context
pub struct Dispatcher {
    /// Shared fan-out state
    core: Arc<FanOutCore>,

    /// Platform used to spawn the context and to yield between ticks
    platform: Arc<dyn Platform>,

    /// Context parameters (name, stack, priority)
    context: ContextSpec,

    /// Target time between wake-ups
    tick_period: Duration,

    /// Process-wide shutdown signal
    shutdown: ShutdownSignal,

    /// Local stop request from the owner
    stop: Arc<AtomicBool>,

    /// Set once `start` has succeeded
    started: AtomicBool,

    /// Thread handle
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Create a dispatcher; nothing runs until [`Dispatcher::start`]
    pub(crate) fn new(
        core: Arc<FanOutCore>,
        platform: Arc<dyn Platform>,
        context: ContextSpec,
        tick_period: Duration,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            core,
            platform,
            context,
            tick_period,
            shutdown,
            stop: Arc::new(AtomicBool::new(false)),
            started: AtomicBool::new(false),
            handle: Mutex::new(None),
        }
    }

    /// Spawn the dispatcher context
    ///
    /// A dispatcher runs at most once; a second call fails with
    /// [`SchedulerError::AlreadyStarted`], including after it has stopped.
    pub fn start(&self) -> SchedulerResult<()> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(SchedulerError::AlreadyStarted);
        }

        let core = self.core.clone();
        let platform = self.platform.clone();
        let shutdown = self.shutdown.clone();
        let stop = self.stop.clone();
        let tick_period = self.tick_period;

        let handle = self
            .platform
            .spawn_context(
                &self.context,
                Box::new(move || {
                    Dispatcher::run_loop(core, platform, tick_period, shutdown, stop);
                }),
            )
            .map_err(|err| {
                self.started.store(false, Ordering::Release);
                SchedulerError::ContextSpawn(err)
            })?;

        *self.handle.lock() = Some(handle);
        tracing::debug!(
            name = %self.context.name,
            tick_period_us = self.tick_period.as_micros() as u64,
            "dispatcher started"
        );
        Ok(())
    }

    /// Dispatcher main loop
    fn run_loop(
        core: Arc<FanOutCore>,
        platform: Arc<dyn Platform>,
        tick_period: Duration,
        shutdown: ShutdownSignal,
        stop: Arc<AtomicBool>,
    ) {
        let should_exit = || shutdown.is_raised() || stop.load(Ordering::Acquire);

        while !should_exit() {
            platform.yield_for(tick_period);

            // Re-check after waking so a shutdown raised mid-sleep
            // never gets one more fan-out
            if should_exit() {
                break;
            }

            core.dispatch_tick();
        }

        tracing::debug!("dispatcher loop exited");
    }

    /// Ask the loop to exit and wait for it
    ///
    /// Safe to call more than once, and from a timer callback (the dispatcher
    /// context does not join itself).
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);

        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                tracing::error!("dispatcher context panicked");
            }
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> DispatcherState {
        if !self.started.load(Ordering::Acquire) {
            return DispatcherState::Idle;
        }
        match self.handle.lock().as_ref() {
            Some(handle) if !handle.is_finished() => DispatcherState::Running,
            _ => DispatcherState::Stopped,
        }
    }

    /// Whether the loop is currently running
    pub fn is_running(&self) -> bool {
        self.state() == DispatcherState::Running
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MonotonicClock;
    use crate::platform::{ContextPriority, HostPlatform};
    use crate::registry::TimerProc;
    use std::sync::atomic::AtomicU64;

    fn test_dispatcher(core: Arc<FanOutCore>, shutdown: ShutdownSignal) -> Dispatcher {
        Dispatcher::new(
            core,
            Arc::new(HostPlatform),
            ContextSpec {
                name: "strobe-timer-test".to_string(),
                stack_size: 64 * 1024,
                priority: ContextPriority::DEFAULT.raised(1),
            },
            Duration::from_millis(1),
            shutdown,
        )
    }

    #[test]
    fn test_dispatcher_creation() {
        let core = Arc::new(FanOutCore::new(Arc::new(MonotonicClock::new()), 4));
        let dispatcher = test_dispatcher(core, ShutdownSignal::new());
        assert_eq!(dispatcher.state(), DispatcherState::Idle);
        assert!(!dispatcher.is_running());
    }

    #[test]
    fn test_dispatcher_start_stop() {
        let core = Arc::new(FanOutCore::new(Arc::new(MonotonicClock::new()), 4));
        let count = Arc::new(AtomicU64::new(0));
        let c = count.clone();
        core.registry
            .register(TimerProc::new(move |_| {
                c.fetch_add(1, Ordering::Relaxed);
            }))
            .unwrap();

        let dispatcher = test_dispatcher(core.clone(), ShutdownSignal::new());
        dispatcher.start().unwrap();
        assert!(dispatcher.is_running());

        thread::sleep(Duration::from_millis(50));
        dispatcher.stop();

        assert_eq!(dispatcher.state(), DispatcherState::Stopped);
        assert!(count.load(Ordering::Relaxed) > 0);
        assert_eq!(
            count.load(Ordering::Relaxed),
            core.stats.snapshot().dispatcher_ticks
        );
    }

    #[test]
    fn test_dispatcher_runs_once() {
        let core = Arc::new(FanOutCore::new(Arc::new(MonotonicClock::new()), 4));
        let dispatcher = test_dispatcher(core, ShutdownSignal::new());
        dispatcher.start().unwrap();
        assert!(matches!(
            dispatcher.start(),
            Err(SchedulerError::AlreadyStarted)
        ));
        dispatcher.stop();
        assert!(matches!(
            dispatcher.start(),
            Err(SchedulerError::AlreadyStarted)
        ));
    }

    #[test]
    fn test_dispatcher_exits_on_shutdown() {
        let core = Arc::new(FanOutCore::new(Arc::new(MonotonicClock::new()), 4));
        let shutdown = ShutdownSignal::new();
        let dispatcher = test_dispatcher(core.clone(), shutdown.clone());
        dispatcher.start().unwrap();

        thread::sleep(Duration::from_millis(10));
        shutdown.raise();
        thread::sleep(Duration::from_millis(100));
        assert_eq!(dispatcher.state(), DispatcherState::Stopped);

        let ticks = core.stats.snapshot().dispatcher_ticks;
        thread::sleep(Duration::from_millis(10));
        assert_eq!(core.stats.snapshot().dispatcher_ticks, ticks);
    }
}
