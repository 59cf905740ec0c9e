//! Platform collaborators
//!
//! Everything the scheduler needs from the host that is not a clock reading:
//! creating an execution context, yielding, busy-waiting, raw console output,
//! and the process exit/reset primitives. [`HostPlatform`] maps these onto std;
//! [`crate::sim::SimPlatform`] provides a deterministic stand-in.

use std::io::{self, Write};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Scheduling priority requested for an execution context
///
/// Higher values run first. On Linux the host platform applies the difference
/// from [`ContextPriority::DEFAULT`] to the new thread's nice value; elsewhere it
/// is advisory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContextPriority(pub i32);

impl ContextPriority {
    /// Priority of ordinary application contexts
    pub const DEFAULT: Self = Self(100);

    /// A priority `by` levels above this one
    pub const fn raised(self, by: i32) -> Self {
        Self(self.0 + by)
    }

    /// Raw priority value
    pub const fn value(self) -> i32 {
        self.0
    }
}

impl Default for ContextPriority {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Parameters for a new execution context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextSpec {
    /// Thread name
    pub name: String,
    /// Stack size in bytes
    pub stack_size: usize,
    /// Requested priority
    pub priority: ContextPriority,
}

/// Host services consumed by the scheduler
pub trait Platform: Send + Sync {
    /// Start `body` on a new execution context
    fn spawn_context(
        &self,
        spec: &ContextSpec,
        body: Box<dyn FnOnce() + Send + 'static>,
    ) -> io::Result<JoinHandle<()>>;

    /// Give up the CPU for roughly `duration`
    fn yield_for(&self, duration: Duration);

    /// Wait `micros` microseconds without yielding
    fn busy_wait_micros(&self, micros: u32);

    /// Synchronous, unbuffered write to the lowest-level output
    fn write_raw(&self, bytes: &[u8]);

    /// Terminate the process with `code`
    fn exit(&self, code: i32) -> !;

    /// Reset (reboot) the process
    fn reset(&self) -> !;
}

/// std-backed platform
#[derive(Debug, Clone, Copy, Default)]
pub struct HostPlatform;

impl HostPlatform {
    /// Create the host platform
    pub fn new() -> Self {
        Self
    }
}

impl Platform for HostPlatform {
    fn spawn_context(
        &self,
        spec: &ContextSpec,
        body: Box<dyn FnOnce() + Send + 'static>,
    ) -> io::Result<JoinHandle<()>> {
        tracing::debug!(
            name = %spec.name,
            priority = spec.priority.value(),
            stack_size = spec.stack_size,
            "spawning execution context"
        );

        let name = spec.name.clone();
        let priority = spec.priority;
        thread::Builder::new()
            .name(spec.name.clone())
            .stack_size(spec.stack_size)
            .spawn(move || {
                if let Err(err) = apply_thread_priority(priority) {
                    tracing::warn!(
                        name = %name,
                        priority = priority.value(),
                        "could not apply context priority: {err}"
                    );
                }
                body()
            })
    }

    fn yield_for(&self, duration: Duration) {
        thread::sleep(duration);
    }

    fn busy_wait_micros(&self, micros: u32) {
        let deadline = Instant::now() + Duration::from_micros(u64::from(micros));
        while Instant::now() < deadline {
            std::hint::spin_loop();
        }
    }

    fn write_raw(&self, bytes: &[u8]) {
        let mut out = io::stdout().lock();
        let _ = out.write_all(bytes);
        let _ = out.flush();
    }

    fn exit(&self, code: i32) -> ! {
        std::process::exit(code)
    }

    fn reset(&self) -> ! {
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;

            if let Ok(exe) = std::env::current_exe() {
                let err = std::process::Command::new(exe)
                    .args(std::env::args_os().skip(1))
                    .exec();
                tracing::error!("reset: re-exec failed: {err}");
            }
        }
        std::process::exit(1)
    }
}

/// Apply `priority` to the calling thread, relative to the niceness it inherited
///
/// Nice values are per thread on Linux and lower values run first, so each level
/// above [`ContextPriority::DEFAULT`] lowers the nice value by one. Raising
/// priority usually needs `CAP_SYS_NICE` or a permissive `RLIMIT_NICE`.
#[cfg(target_os = "linux")]
fn apply_thread_priority(priority: ContextPriority) -> io::Result<()> {
    let raise = priority.value().saturating_sub(ContextPriority::DEFAULT.value());
    if raise == 0 {
        return Ok(());
    }

    // SAFETY: getpriority/setpriority with who = 0 only touch the calling thread
    let inherited = unsafe { libc::getpriority(libc::PRIO_PROCESS, 0) };
    let nice = inherited.saturating_sub(raise).clamp(-20, 19);
    if unsafe { libc::setpriority(libc::PRIO_PROCESS, 0, nice) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn apply_thread_priority(priority: ContextPriority) -> io::Result<()> {
    if priority == ContextPriority::DEFAULT {
        return Ok(());
    }
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "thread priority is not supported on this platform",
    ))
}
