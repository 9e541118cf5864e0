//! Subcommand implementations

pub mod check;
pub mod replay;
pub mod validate;

use anyhow::{Context, Result};
use serialguard_engine::{FilterRegistry, Settings};
use std::path::Path;

/// Build a registry from an optional settings file, with `pattern` taking
/// precedence over any configured filter.
pub fn load_registry(settings: Option<&Path>, pattern: Option<&str>) -> Result<FilterRegistry> {
    let mut loaded = Settings::load(settings).context("Failed to load settings")?;
    if let Some(pattern) = pattern {
        loaded.filter = Some(pattern.to_string());
    }
    FilterRegistry::from_settings(&loaded).context("Failed to initialize filter registry")
}
