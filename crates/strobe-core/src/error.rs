//! Error types for the scheduler

use thiserror::Error;

/// Result type for recoverable scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Recoverable scheduler errors
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The timer registry is full; the registration was not applied
    #[error("Out of timer processes (capacity {capacity})")]
    TimerCapacity {
        /// Configured registry capacity
        capacity: usize,
    },

    /// `start` was called on a scheduler that has already been started
    #[error("Scheduler already started")]
    AlreadyStarted,

    /// The platform could not create the dispatcher's execution context
    #[error("Failed to spawn execution context: {0}")]
    ContextSpawn(#[source] std::io::Error),

    /// Configuration values out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failed to read a configuration file
    #[error("Failed to read configuration: {0}")]
    ConfigIo(#[source] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Failed to render configuration as TOML
    #[error("Failed to serialize configuration: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),
}

/// Unrecoverable conditions
///
/// These never surface as `Err` to a caller: each one is routed to process
/// termination after its message has been written to the raw output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Fatal {
    /// `mark_initialized` was called a second time
    #[error("PANIC: scheduler::system_initialized called more than once")]
    DoubleInitialize,

    /// Shutdown was requested while a delay was in progress
    #[error("PANIC: shutdown requested during delay")]
    ShutdownDuringDelay,
}
