//! The filter capability
//!
//! A filter is a pure decision function from a [`FilterInfo`] to a [`Status`].
//! Anything that implements [`CheckInput`] can be wrapped in a [`Filter`], a
//! cheap shared handle that the registry, the combinators and the per-stream
//! binding pass around.

use serialguard_shared::{FilterInfo, SerialClass, Status};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Decision logic of a filter.
///
/// Implementations must be side-effect free and must not block; they are
/// called once per candidate object on the decoding thread.
pub trait CheckInput: Send + Sync {
    fn check_input(&self, info: &FilterInfo<'_>) -> Status;

    /// Human readable description, used in logs and `Display`.
    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("filter")
    }
}

/// Shared handle to a filter.
#[derive(Clone)]
pub struct Filter(Arc<dyn CheckInput>);

impl Filter {
    pub fn new<C: CheckInput + 'static>(check: C) -> Self {
        Filter(Arc::new(check))
    }

    /// Filter backed by a closure.
    pub fn from_fn<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&FilterInfo<'_>) -> Status + Send + Sync + 'static,
    {
        Filter::new(FnFilter {
            name: name.into(),
            f,
        })
    }

    /// Filter backed by a closure that may fail.
    ///
    /// A failed check produces no status; it is reported as `Rejected`.
    pub fn fallible<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&FilterInfo<'_>) -> anyhow::Result<Status> + Send + Sync + 'static,
    {
        Filter::new(FallibleFilter {
            name: name.into(),
            f,
        })
    }

    pub fn check_input(&self, info: &FilterInfo<'_>) -> Status {
        self.0.check_input(info)
    }

    /// True if both handles point at the same filter instance.
    pub fn ptr_eq(&self, other: &Filter) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.describe(f)
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Filter({})", self)
    }
}

struct FnFilter<F> {
    name: String,
    f: F,
}

impl<F> CheckInput for FnFilter<F>
where
    F: Fn(&FilterInfo<'_>) -> Status + Send + Sync,
{
    fn check_input(&self, info: &FilterInfo<'_>) -> Status {
        (self.f)(info)
    }

    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

struct FallibleFilter<F> {
    name: String,
    f: F,
}

impl<F> CheckInput for FallibleFilter<F>
where
    F: Fn(&FilterInfo<'_>) -> anyhow::Result<Status> + Send + Sync,
{
    fn check_input(&self, info: &FilterInfo<'_>) -> Status {
        match (self.f)(info) {
            Ok(status) => status,
            Err(e) => {
                warn!(filter = %self.name, error = %e, "filter produced no status, rejecting");
                Status::Rejected
            }
        }
    }

    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Which verdict a predicate filter reports when its predicate holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PredicateKind {
    Allow,
    Reject,
}

struct PredicateFilter<P> {
    predicate: P,
    kind: PredicateKind,
    other: Status,
}

impl<P> CheckInput for PredicateFilter<P>
where
    P: Fn(&SerialClass) -> bool + Send + Sync,
{
    fn check_input(&self, info: &FilterInfo<'_>) -> Status {
        let Some(class) = info.serial_class() else {
            return Status::Undecided;
        };
        match ((self.predicate)(class), self.kind) {
            (true, PredicateKind::Allow) => Status::Allowed,
            (true, PredicateKind::Reject) => Status::Rejected,
            (false, _) => self.other,
        }
    }

    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            PredicateKind::Allow => write!(f, "allow_filter(otherwise {})", self.other),
            PredicateKind::Reject => write!(f, "reject_filter(otherwise {})", self.other),
        }
    }
}

/// `Allowed` for classes matching `predicate`, `other` for the rest,
/// `Undecided` when there is no class.
pub fn allow_filter<P>(predicate: P, other: Status) -> Filter
where
    P: Fn(&SerialClass) -> bool + Send + Sync + 'static,
{
    Filter::new(PredicateFilter {
        predicate,
        kind: PredicateKind::Allow,
        other,
    })
}

/// `Rejected` for classes matching `predicate`, `other` for the rest,
/// `Undecided` when there is no class.
pub fn reject_filter<P>(predicate: P, other: Status) -> Filter
where
    P: Fn(&SerialClass) -> bool + Send + Sync + 'static,
{
    Filter::new(PredicateFilter {
        predicate,
        kind: PredicateKind::Reject,
        other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serialguard_shared::Primitive;

    fn in_acme(c: &SerialClass) -> bool {
        c.package_name() == "com.acme"
    }

    #[test]
    fn test_allow_filter() {
        let filter = allow_filter(in_acme, Status::Undecided);
        let widget = SerialClass::named("com.acme.Widget");
        let other = SerialClass::named("org.other.Thing");
        assert_eq!(filter.check_input(&FilterInfo::for_class(&widget)), Status::Allowed);
        assert_eq!(filter.check_input(&FilterInfo::for_class(&other)), Status::Undecided);
        assert_eq!(filter.check_input(&FilterInfo::metrics()), Status::Undecided);
    }

    #[test]
    fn test_reject_filter_other_status() {
        let filter = reject_filter(in_acme, Status::Allowed);
        let widget = SerialClass::named("com.acme.Widget");
        let int = SerialClass::primitive(Primitive::Int);
        assert_eq!(filter.check_input(&FilterInfo::for_class(&widget)), Status::Rejected);
        assert_eq!(filter.check_input(&FilterInfo::for_class(&int)), Status::Allowed);
        assert_eq!(filter.check_input(&FilterInfo::metrics()), Status::Undecided);
    }

    #[test]
    fn test_fallible_error_rejects() {
        let filter = Filter::fallible("flaky", |info| {
            if info.depth() > 2 {
                anyhow::bail!("depth {} unsupported", info.depth());
            }
            Ok(Status::Allowed)
        });
        assert_eq!(filter.check_input(&FilterInfo::metrics()), Status::Allowed);
        assert_eq!(
            filter.check_input(&FilterInfo::metrics().with_depth(3)),
            Status::Rejected
        );
        assert_eq!(filter.to_string(), "flaky");
    }

    #[test]
    fn test_handle_identity() {
        let a = Filter::from_fn("a", |_| Status::Undecided);
        let b = a.clone();
        let c = Filter::from_fn("a", |_| Status::Undecided);
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
        assert_eq!(format!("{:?}", a), "Filter(a)");
    }
}
