//! CLI command implementations

pub mod config;
pub mod run;

use anyhow::Context;
use std::path::Path;
use strobe_core::SchedulerConfig;

/// Load `path` if given, otherwise the defaults
pub fn load_config(path: Option<&Path>) -> anyhow::Result<SchedulerConfig> {
    match path {
        Some(path) => SchedulerConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(SchedulerConfig::default()),
    }
}
