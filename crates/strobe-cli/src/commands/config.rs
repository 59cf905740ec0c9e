//! `strobe config` — print the effective configuration.

use anyhow::Context;
use std::path::Path;

/// Effective configuration rendered as TOML
pub fn render(path: Option<&Path>) -> anyhow::Result<String> {
    let config = super::load_config(path)?;
    config
        .to_toml_string()
        .context("failed to render configuration")
}

pub fn execute(path: Option<&Path>) -> anyhow::Result<()> {
    print!("{}", render(path)?);
    Ok(())
}
