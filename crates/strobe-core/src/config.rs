//! Scheduler configuration (strobe.toml)
//!
//! Every field has a default, so an empty file is a valid configuration:
//!
//! ```toml
//! max_timer_procs = 8
//! tick_period_us = 1000
//! delay_slice_ms = 1
//! panic_flush_us = 10000
//!
//! [dispatcher]
//! name = "strobe-timer"
//! stack_size = 65536
//! priority = 101
//! ```

use crate::error::{SchedulerError, SchedulerResult};
use crate::platform::{ContextPriority, ContextSpec};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum number of periodic timer callbacks
    pub max_timer_procs: usize,

    /// Target time between dispatcher wake-ups, in microseconds
    pub tick_period_us: u64,

    /// Yield slice used by millisecond delays, in milliseconds
    pub delay_slice_ms: u64,

    /// How long the panic path waits for its message to flush, in microseconds
    pub panic_flush_us: u16,

    /// Dispatcher execution context
    pub dispatcher: DispatcherConfig,
}

/// Dispatcher execution context settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Thread name
    pub name: String,

    /// Stack size in bytes
    pub stack_size: usize,

    /// Priority; defaults to one above ordinary contexts
    pub priority: i32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_timer_procs: 8,
            tick_period_us: 1000,
            delay_slice_ms: 1,
            panic_flush_us: 10_000,
            dispatcher: DispatcherConfig::default(),
        }
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            name: "strobe-timer".to_string(),
            stack_size: 64 * 1024,
            priority: ContextPriority::DEFAULT.raised(1).value(),
        }
    }
}

impl SchedulerConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(input: &str) -> SchedulerResult<Self> {
        let config: SchedulerConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn load(path: &Path) -> SchedulerResult<Self> {
        let content = std::fs::read_to_string(path).map_err(SchedulerError::ConfigIo)?;
        Self::from_toml_str(&content)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> SchedulerResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check value ranges
    pub fn validate(&self) -> SchedulerResult<()> {
        if self.max_timer_procs == 0 {
            return Err(SchedulerError::InvalidConfig(
                "max_timer_procs must be at least 1".to_string(),
            ));
        }
        if self.tick_period_us == 0 {
            return Err(SchedulerError::InvalidConfig(
                "tick_period_us must be at least 1".to_string(),
            ));
        }
        if self.delay_slice_ms == 0 {
            return Err(SchedulerError::InvalidConfig(
                "delay_slice_ms must be at least 1".to_string(),
            ));
        }
        if self.dispatcher.name.is_empty() {
            return Err(SchedulerError::InvalidConfig(
                "dispatcher.name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Dispatcher tick period
    pub fn tick_period(&self) -> Duration {
        Duration::from_micros(self.tick_period_us)
    }

    /// Delay yield slice
    pub fn delay_slice(&self) -> Duration {
        Duration::from_millis(self.delay_slice_ms)
    }

    /// Execution context parameters for the dispatcher
    pub fn dispatcher_context(&self) -> ContextSpec {
        ContextSpec {
            name: self.dispatcher.name.clone(),
            stack_size: self.dispatcher.stack_size,
            priority: ContextPriority(self.dispatcher.priority),
        }
    }
}
