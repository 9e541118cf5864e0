//! Filter factories
//!
//! A factory decides which filter a stream ends up with. It is called with the
//! filter currently bound to the stream (`None` for a new stream) and the
//! filter being requested (the registry filter for a new stream, the caller's
//! filter for an explicit change).

use crate::combinators::merge;
use crate::filter::Filter;
use std::fmt;
use std::sync::Arc;

/// Identifier of the pass-through factory.
pub const BUILTIN_FACTORY: &str = "builtin";

/// Identifier of the factory that merges requested and current filters.
pub const MERGE_FACTORY: &str = "merge";

/// Derives the filter bound to a stream.
pub trait FilterFactory: Send + Sync {
    fn apply(&self, current: Option<&Filter>, requested: Option<&Filter>) -> Option<Filter>;

    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("factory")
    }
}

/// Shared handle to a filter factory.
#[derive(Clone)]
pub struct Factory(Arc<dyn FilterFactory>);

impl Factory {
    pub fn new<F: FilterFactory + 'static>(factory: F) -> Self {
        Factory(Arc::new(factory))
    }

    /// Factory backed by a closure.
    pub fn from_fn<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Option<&Filter>, Option<&Filter>) -> Option<Filter> + Send + Sync + 'static,
    {
        Factory::new(FnFactory {
            name: name.into(),
            f,
        })
    }

    /// Returns the requested filter unchanged.
    pub fn builtin() -> Self {
        Factory::new(BuiltinFactory)
    }

    /// Merges the requested filter with the current one.
    pub fn merging() -> Self {
        Factory::new(MergingFactory)
    }

    /// Look up a builtin factory by identifier.
    pub fn named(name: &str) -> Option<Self> {
        match name {
            BUILTIN_FACTORY => Some(Self::builtin()),
            MERGE_FACTORY => Some(Self::merging()),
            _ => None,
        }
    }

    pub fn apply(&self, current: Option<&Filter>, requested: Option<&Filter>) -> Option<Filter> {
        self.0.apply(current, requested)
    }

    pub fn ptr_eq(&self, other: &Factory) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Default for Factory {
    fn default() -> Self {
        Self::builtin()
    }
}

impl fmt::Display for Factory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.describe(f)
    }
}

impl fmt::Debug for Factory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Factory({})", self)
    }
}

struct BuiltinFactory;

impl FilterFactory for BuiltinFactory {
    fn apply(&self, _current: Option<&Filter>, requested: Option<&Filter>) -> Option<Filter> {
        requested.cloned()
    }

    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(BUILTIN_FACTORY)
    }
}

struct MergingFactory;

impl FilterFactory for MergingFactory {
    fn apply(&self, current: Option<&Filter>, requested: Option<&Filter>) -> Option<Filter> {
        match (current, requested) {
            (_, None) => current.cloned(),
            (None, Some(requested)) => Some(requested.clone()),
            (Some(current), Some(requested)) => {
                Some(merge(requested.clone(), Some(current.clone())))
            }
        }
    }

    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(MERGE_FACTORY)
    }
}

struct FnFactory<F> {
    name: String,
    f: F,
}

impl<F> FilterFactory for FnFactory<F>
where
    F: Fn(Option<&Filter>, Option<&Filter>) -> Option<Filter> + Send + Sync,
{
    fn apply(&self, current: Option<&Filter>, requested: Option<&Filter>) -> Option<Filter> {
        (self.f)(current, requested)
    }

    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serialguard_shared::{FilterInfo, SerialClass, Status};

    fn constant(status: Status) -> Filter {
        Filter::from_fn(status.as_str(), move |_| status)
    }

    #[test]
    fn test_builtin_passes_requested_through() {
        let factory = Factory::builtin();
        let current = constant(Status::Allowed);
        let requested = constant(Status::Rejected);
        assert!(factory.apply(None, None).is_none());
        assert!(factory
            .apply(None, Some(&requested))
            .unwrap()
            .ptr_eq(&requested));
        assert!(factory
            .apply(Some(&current), Some(&requested))
            .unwrap()
            .ptr_eq(&requested));
        assert!(factory.apply(Some(&current), None).is_none());
    }

    #[test]
    fn test_merging_factory() {
        let factory = Factory::merging();
        let current = constant(Status::Allowed);
        let requested = constant(Status::Rejected);

        assert!(factory.apply(None, Some(&requested)).unwrap().ptr_eq(&requested));
        assert!(factory.apply(Some(&current), None).unwrap().ptr_eq(&current));

        let merged = factory.apply(Some(&current), Some(&requested)).unwrap();
        let class = SerialClass::named("a.B");
        assert_eq!(merged.check_input(&FilterInfo::for_class(&class)), Status::Rejected);
        assert_eq!(merged.to_string(), "merge(REJECTED, ALLOWED)");
    }

    #[test]
    fn test_named_lookup() {
        assert_eq!(Factory::named("builtin").unwrap().to_string(), "builtin");
        assert_eq!(Factory::named("merge").unwrap().to_string(), "merge");
        assert!(Factory::named("com.acme.FilterFactory").is_none());
    }

    #[test]
    fn test_closure_factory() {
        let fallback = constant(Status::Rejected);
        let factory = Factory::from_fn("never-null", move |_, requested| {
            Some(requested.cloned().unwrap_or_else(|| fallback.clone()))
        });
        let filter = factory.apply(None, None).unwrap();
        assert_eq!(filter.check_input(&FilterInfo::metrics()), Status::Rejected);
        assert_eq!(format!("{:?}", factory), "Factory(never-null)");
    }
}
