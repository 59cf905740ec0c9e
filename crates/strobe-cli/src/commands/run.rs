//! `strobe run` — drive the scheduler on the host and report counters.

use anyhow::Context;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use strobe_core::{DelayProc, Scheduler, SchedulerStats, TimerProc};

/// Options for `strobe run`
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub config: Option<PathBuf>,
    pub duration_ms: u16,
    pub timers: usize,
    pub suspend_every_ms: u16,
    pub suspend_for_ms: u16,
    pub delay_callback_min_ms: u16,
}

/// What a run observed
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Milliseconds since the scheduler started
    pub elapsed_ms: u64,
    /// Scheduler counters after the dispatcher stopped
    pub stats: SchedulerStats,
    /// Invocations per registered timer, in registration order
    pub timer_calls: Vec<u64>,
    /// Invocations of the failsafe callback
    pub failsafe_calls: u64,
    /// Invocations of the delay callback
    pub delay_callbacks: u64,
}

fn counting_timer() -> (Arc<AtomicU64>, TimerProc) {
    let count = Arc::new(AtomicU64::new(0));
    let c = count.clone();
    (
        count,
        TimerProc::new(move |_| {
            c.fetch_add(1, Ordering::Relaxed);
        }),
    )
}

/// Failsafe period hint for a tick period, saturating at `u32::MAX`
fn failsafe_period_hint(tick_period_us: u64) -> u32 {
    u32::try_from(tick_period_us).unwrap_or(u32::MAX)
}

/// Run the scheduler as described by `options` and collect the counters
pub fn run(options: &RunOptions) -> anyhow::Result<RunReport> {
    let config = super::load_config(options.config.as_deref())?;
    let scheduler = Arc::new(Scheduler::host(config).context("failed to create scheduler")?);

    let mut timer_counts = Vec::with_capacity(options.timers);
    for index in 0..options.timers {
        let (count, timer) = counting_timer();
        scheduler
            .register_timer_callback(timer)
            .with_context(|| format!("failed to register timer {}", index))?;
        timer_counts.push(count);
    }

    let (failsafe_count, failsafe) = counting_timer();
    let period_hint = failsafe_period_hint(scheduler.config().tick_period_us);
    scheduler.register_failsafe(failsafe, period_hint);

    let delay_count = Arc::new(AtomicU64::new(0));
    let d = delay_count.clone();
    scheduler.register_delay_callback(
        DelayProc::new(move || {
            d.fetch_add(1, Ordering::Relaxed);
        }),
        options.delay_callback_min_ms,
    );

    scheduler.start().context("failed to start scheduler")?;
    scheduler.mark_initialized();
    tracing::info!(
        duration_ms = options.duration_ms,
        timers = options.timers,
        "scheduler running"
    );

    if options.suspend_every_ms == 0 {
        scheduler.delay(options.duration_ms);
    } else {
        let mut remaining = options.duration_ms;
        while remaining > 0 {
            let chunk = remaining.min(options.suspend_every_ms);
            scheduler.delay(chunk);
            remaining -= chunk;

            scheduler.suspend();
            scheduler.delay(options.suspend_for_ms);
            scheduler.resume();
        }
    }

    scheduler.stop();

    Ok(RunReport {
        elapsed_ms: scheduler.now_millis(),
        stats: scheduler.stats(),
        timer_calls: timer_counts
            .iter()
            .map(|count| count.load(Ordering::Relaxed))
            .collect(),
        failsafe_calls: failsafe_count.load(Ordering::Relaxed),
        delay_callbacks: delay_count.load(Ordering::Relaxed),
    })
}

pub fn execute(options: RunOptions) -> anyhow::Result<()> {
    let report = run(&options)?;
    let stats = &report.stats;

    println!("Elapsed:          {} ms", report.elapsed_ms);
    println!("Dispatcher ticks: {}", stats.dispatcher_ticks);
    println!("Fan-outs:         {}", stats.fan_outs);
    println!("Deferred ticks:   {}", stats.deferred_ticks);
    println!("Catch-ups:        {}", stats.catch_ups);
    println!("Rejected:         {}", stats.rejected_fan_outs);
    println!("Failsafe calls:   {}", report.failsafe_calls);
    println!("Delay callbacks:  {}", report.delay_callbacks);
    for (index, calls) in report.timer_calls.iter().enumerate() {
        println!("Timer {:<2}         {}", index, calls);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failsafe_period_hint_saturates() {
        assert_eq!(failsafe_period_hint(1000), 1000);
        assert_eq!(failsafe_period_hint(u64::from(u32::MAX)), u32::MAX);
        assert_eq!(failsafe_period_hint(5_000_000_000), u32::MAX);
    }
}
