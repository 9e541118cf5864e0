//! Startup settings
//!
//! Layered from an optional TOML file and `SERIALGUARD_*` environment
//! variables (environment wins):
//!
//! - `SERIALGUARD_FILTER`: pattern string installed as the registry filter
//! - `SERIALGUARD_FILTER_FACTORY`: builtin factory identifier (`builtin`, `merge`)
//! - `SERIALGUARD_SET_FILTER_AFTER_READ`: allow streams to change their filter
//!   after objects were read

use crate::registry::ConfigError;
use serde::Deserialize;
use std::path::Path;

/// Prefix of the environment variables read by [`Settings::from_env`].
pub const ENV_PREFIX: &str = "SERIALGUARD";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Pattern string for the process-wide filter
    pub filter: Option<String>,

    /// Identifier of the filter factory
    pub filter_factory: Option<String>,

    /// Permit `StreamFilter::set_filter` after objects have been read
    pub set_filter_after_read: bool,
}

impl Settings {
    /// Settings from the environment only.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Settings from `path` (if given), overridden by the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| ConfigError::Settings(e.to_string()))
    }

    pub fn with_filter(mut self, pattern: impl Into<String>) -> Self {
        self.filter = Some(pattern.into());
        self
    }

    pub fn with_factory(mut self, name: impl Into<String>) -> Self {
        self.filter_factory = Some(name.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "filter = \"maxdepth=8;com.acme.*;!*\"").unwrap();
        writeln!(file, "filter_factory = \"merge\"").unwrap();
        writeln!(file, "set_filter_after_read = true").unwrap();

        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.filter.as_deref(), Some("maxdepth=8;com.acme.*;!*"));
        assert_eq!(settings.filter_factory.as_deref(), Some("merge"));
        assert!(settings.set_filter_after_read);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(matches!(
            Settings::load(Some(&missing)),
            Err(ConfigError::Settings(_))
        ));
    }

    #[test]
    fn test_builders() {
        let settings = Settings::default().with_filter("!*").with_factory("builtin");
        assert_eq!(settings.filter.as_deref(), Some("!*"));
        assert_eq!(settings.filter_factory.as_deref(), Some("builtin"));
        assert!(!settings.set_filter_after_read);
    }
}
