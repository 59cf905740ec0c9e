//! Strobe timer scheduling core
//!
//! This crate provides the periodic-callback half of a hardware-abstraction
//! scheduler:
//! - Fixed-rate dispatcher running on its own execution context
//! - Bounded, deduplicated timer callback registry with a failsafe slot
//! - Suspend/resume gate that coalesces missed ticks into one catch-up
//! - Cooperative delays that keep servicing a delay callback
//! - One-shot initialization latch and a fail-fast panic path

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod clock;
pub mod config;
pub mod delay;
pub mod dispatcher;
pub mod error;
pub mod fanout;
pub mod gate;
pub mod init;
pub mod platform;
pub mod registry;
pub mod scheduler;
pub mod shutdown;
pub mod sim;
pub mod stats;

pub use clock::{Clock, Epoch, MonotonicClock};
pub use config::{DispatcherConfig, SchedulerConfig};
pub use delay::{DelayConfig, DelayProc, DelayPump};
pub use dispatcher::{Dispatcher, DispatcherState};
pub use error::{Fatal, SchedulerError, SchedulerResult};
pub use gate::{FanOutGate, FanOutOutcome, TickSource};
pub use platform::{ContextPriority, ContextSpec, HostPlatform, Platform};
pub use registry::{TimerHandle, TimerProc, TimerRegistry};
pub use scheduler::{Scheduler, SchedulerBuilder};
pub use shutdown::ShutdownSignal;
pub use stats::SchedulerStats;
