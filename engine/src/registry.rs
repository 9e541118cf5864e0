//! Filter registry
//!
//! Holds the filter and the filter factory that new streams start from. Both
//! slots can be configured once: the filter by the first successful
//! [`FilterRegistry::set_filter`], the factory until any stream has asked for
//! it. A registry can be created explicitly by the composition root, or the
//! process-wide instance can be obtained through [`FilterRegistry::global`].

use crate::factory::Factory;
use crate::filter::Filter;
use crate::pattern::{create_filter, PatternError};
use crate::settings::Settings;
use once_cell::sync::{Lazy, OnceCell};
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{error, info};

/// Configuration-state errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("filter can not be set more than once")]
    FilterAlreadySet,

    #[error("cannot replace filter factory: {0}")]
    FactoryLocked(String),

    #[error("invalid filter pattern \"{pattern}\": {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: PatternError,
    },

    #[error("unknown filter factory: {0}")]
    UnknownFactory(String),

    #[error("invalid settings: {0}")]
    Settings(String),
}

#[derive(Debug)]
struct FactorySlot {
    factory: Factory,
    locked: bool,
}

/// Registry of the filter and factory used by new streams.
#[derive(Debug)]
pub struct FilterRegistry {
    filter: OnceCell<Filter>,
    factory: Mutex<FactorySlot>,
    set_filter_after_read: bool,
}

static GLOBAL: Lazy<Result<FilterRegistry, ConfigError>> = Lazy::new(|| {
    let registry = Settings::from_env().and_then(|settings| FilterRegistry::from_settings(&settings));
    if let Err(e) = &registry {
        error!(error = %e, "filter registry initialization failed, streams cannot be created");
    }
    registry
});

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterRegistry {
    /// Empty registry: no filter, builtin factory, nothing locked.
    pub fn new() -> Self {
        Self {
            filter: OnceCell::new(),
            factory: Mutex::new(FactorySlot {
                factory: Factory::builtin(),
                locked: false,
            }),
            set_filter_after_read: false,
        }
    }

    /// Registry initialized from startup settings.
    ///
    /// A configured pattern installs the filter; a configured factory is
    /// installed and locked. Any invalid setting fails the whole registry.
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let mut registry = Self::new();
        registry.set_filter_after_read = settings.set_filter_after_read;

        if let Some(pattern) = settings.filter.as_deref() {
            let filter = create_filter(pattern).map_err(|source| ConfigError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?;
            if let Some(filter) = filter {
                info!(filter = %filter, "creating serialization filter from settings");
                registry.set_filter(filter)?;
            }
        }

        if let Some(name) = settings.filter_factory.as_deref() {
            let factory =
                Factory::named(name).ok_or_else(|| ConfigError::UnknownFactory(name.to_string()))?;
            info!(factory = %factory, "installing filter factory from settings");
            let slot = registry
                .factory
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner);
            slot.factory = factory;
            slot.locked = true;
        }

        Ok(registry)
    }

    /// The process-wide registry, built from the environment on first use.
    ///
    /// If the environment holds invalid settings every call returns the
    /// initialization error.
    pub fn global() -> Result<&'static FilterRegistry, ConfigError> {
        GLOBAL.as_ref().map_err(Clone::clone)
    }

    /// Compile a pattern string. Does not change any registry state.
    pub fn create_filter(pattern: &str) -> Result<Option<Filter>, PatternError> {
        create_filter(pattern)
    }

    /// The registry filter, if one was configured.
    pub fn filter(&self) -> Option<Filter> {
        self.filter.get().cloned()
    }

    /// Install the registry filter. Fails if a filter is already installed.
    pub fn set_filter(&self, filter: Filter) -> Result<(), ConfigError> {
        let description = filter.to_string();
        self.filter
            .set(filter)
            .map_err(|_| ConfigError::FilterAlreadySet)?;
        info!(filter = %description, "serialization filter installed");
        Ok(())
    }

    fn slot(&self) -> MutexGuard<'_, FactorySlot> {
        self.factory.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The current factory. Does not lock it.
    pub fn factory(&self) -> Factory {
        self.slot().factory.clone()
    }

    /// The factory as seen by a stream. Locks it against replacement.
    pub fn factory_for_stream(&self) -> Factory {
        let mut slot = self.slot();
        slot.locked = true;
        slot.factory.clone()
    }

    /// Replace the factory. Fails once the factory was configured at startup
    /// or any stream has used it.
    pub fn set_factory(&self, factory: Factory) -> Result<(), ConfigError> {
        let mut slot = self.slot();
        if slot.locked {
            return Err(ConfigError::FactoryLocked(slot.factory.to_string()));
        }
        info!(factory = %factory, previous = %slot.factory, "filter factory installed");
        slot.factory = factory;
        slot.locked = true;
        Ok(())
    }

    pub fn is_factory_locked(&self) -> bool {
        self.slot().locked
    }

    /// Whether streams may change their filter after objects were read.
    pub fn set_filter_after_read(&self) -> bool {
        self.set_filter_after_read
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serialguard_shared::{FilterInfo, SerialClass, Status};
    use std::sync::{Arc, Barrier};
    use std::thread;

    fn constant(status: Status) -> Filter {
        Filter::from_fn(status.as_str(), move |_| status)
    }

    #[test]
    fn test_set_filter_once() {
        let registry = FilterRegistry::new();
        assert!(registry.filter().is_none());

        let first = constant(Status::Allowed);
        registry.set_filter(first.clone()).unwrap();
        assert_eq!(
            registry.set_filter(constant(Status::Rejected)),
            Err(ConfigError::FilterAlreadySet)
        );
        assert!(registry.filter().unwrap().ptr_eq(&first));
    }

    #[test]
    fn test_factory_locked_by_stream_use() {
        let registry = FilterRegistry::new();
        assert!(!registry.is_factory_locked());
        // peeking does not lock
        let _ = registry.factory();
        assert!(!registry.is_factory_locked());

        let _ = registry.factory_for_stream();
        assert!(registry.is_factory_locked());
        assert!(matches!(
            registry.set_factory(Factory::merging()),
            Err(ConfigError::FactoryLocked(_))
        ));
        assert_eq!(registry.factory().to_string(), "builtin");
    }

    #[test]
    fn test_set_factory_once() {
        let registry = FilterRegistry::new();
        let merging = Factory::merging();
        registry.set_factory(merging.clone()).unwrap();
        assert!(registry.factory().ptr_eq(&merging));
        assert!(registry.set_factory(Factory::builtin()).is_err());
    }

    #[test]
    fn test_from_settings() {
        let settings = Settings::default()
            .with_filter("maxdepth=3;example.*;java.base/*;!*")
            .with_factory("merge");
        let registry = FilterRegistry::from_settings(&settings).unwrap();

        let filter = registry.filter().unwrap();
        let widget = SerialClass::named("example.Widget");
        assert_eq!(filter.check_input(&FilterInfo::for_class(&widget)), Status::Allowed);
        assert_eq!(
            registry.set_filter(constant(Status::Allowed)),
            Err(ConfigError::FilterAlreadySet)
        );
        assert!(registry.is_factory_locked());
        assert_eq!(registry.factory().to_string(), "merge");
    }

    #[test]
    fn test_from_settings_empty_pattern_installs_nothing() {
        let registry = FilterRegistry::from_settings(&Settings::default().with_filter(";")).unwrap();
        assert!(registry.filter().is_none());
        assert!(!registry.is_factory_locked());
    }

    #[test]
    fn test_from_settings_errors() {
        let bad_pattern = Settings::default().with_filter("maxdepth=-2");
        assert!(matches!(
            FilterRegistry::from_settings(&bad_pattern),
            Err(ConfigError::InvalidPattern { .. })
        ));
        let bad_factory = Settings::default().with_factory("com.acme.Factory");
        assert_eq!(
            FilterRegistry::from_settings(&bad_factory).unwrap_err(),
            ConfigError::UnknownFactory("com.acme.Factory".to_string())
        );
    }

    #[test]
    fn test_create_filter_does_not_install() {
        let registry = FilterRegistry::new();
        let filter = FilterRegistry::create_filter("com.acme.*").unwrap();
        assert!(filter.is_some());
        assert!(registry.filter().is_none());
    }

    #[test]
    fn test_concurrent_set_filter_single_winner() {
        let registry = Arc::new(FilterRegistry::new());
        let barrier = Arc::new(Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    registry.set_filter(constant(Status::Allowed)).is_ok()
                })
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_factory_swap_never_follows_stream_read() {
        for _ in 0..50 {
            let registry = Arc::new(FilterRegistry::new());
            let barrier = Arc::new(Barrier::new(2));

            let reader = {
                let registry = registry.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    registry.factory_for_stream()
                })
            };
            let replacement = Factory::merging();
            let writer = {
                let registry = registry.clone();
                let replacement = replacement.clone();
                thread::spawn(move || {
                    barrier.wait();
                    registry.set_factory(replacement).is_ok()
                })
            };

            let observed = reader.join().unwrap();
            let swapped = writer.join().unwrap();
            // a successful swap must be what the reader saw, or the reader came first
            if swapped {
                assert!(observed.ptr_eq(&replacement));
            } else {
                assert_eq!(observed.to_string(), "builtin");
            }
            assert!(registry.factory().ptr_eq(&observed));
        }
    }
}
