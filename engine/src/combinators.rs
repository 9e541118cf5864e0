//! Filter composition
//!
//! [`merge`] joins two independently authored filters; [`reject_undecided_class`]
//! closes the world for classes nobody has an opinion about.

use crate::filter::{CheckInput, Filter};
use serialguard_shared::{FilterInfo, Status};
use std::fmt;

struct MergeFilter {
    first: Filter,
    second: Filter,
}

impl CheckInput for MergeFilter {
    fn check_input(&self, info: &FilterInfo<'_>) -> Status {
        let first = self.first.check_input(info);
        if first.is_rejected() {
            return Status::Rejected;
        }
        first.combine(self.second.check_input(info))
    }

    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "merge({}, {})", self.first, self.second)
    }
}

/// Combine two filters.
///
/// `Rejected` if either rejects (the second is not consulted once the first
/// has rejected), otherwise `Allowed` if either allows, otherwise `Undecided`.
/// Merging with nothing returns `first` unchanged.
pub fn merge(first: Filter, second: Option<Filter>) -> Filter {
    match second {
        Some(second) => Filter::new(MergeFilter { first, second }),
        None => first,
    }
}

struct RejectUndecidedClass {
    filter: Filter,
}

impl CheckInput for RejectUndecidedClass {
    fn check_input(&self, info: &FilterInfo<'_>) -> Status {
        let status = self.filter.check_input(info);
        if !status.is_undecided() {
            return status;
        }
        let Some(class) = info.serial_class() else {
            return Status::Undecided;
        };
        let base = class.base_component();
        if base.is_primitive() {
            return Status::Undecided;
        }
        // the component check keeps the caller's graph metrics
        match self.filter.check_input(&info.with_serial_class(Some(base))) {
            Status::Allowed => Status::Allowed,
            _ => Status::Rejected,
        }
    }

    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reject_undecided_class({})", self.filter)
    }
}

/// Turn `Undecided` into `Rejected` for classes.
///
/// Metrics-only checks and primitive types (and arrays of them) stay
/// `Undecided`. For any other class, including arrays of it, the base
/// component must be explicitly allowed by `filter`.
pub fn reject_undecided_class(filter: Filter) -> Filter {
    Filter::new(RejectUndecidedClass { filter })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::create_filter;
    use serialguard_shared::{Primitive, SerialClass};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn constant(status: Status) -> Filter {
        Filter::from_fn(status.as_str(), move |_| status)
    }

    #[test]
    fn test_merge_algebra() {
        let class = SerialClass::named("a.B");
        let info = FilterInfo::for_class(&class);
        let cases = [
            (Status::Rejected, Status::Allowed, Status::Rejected),
            (Status::Allowed, Status::Rejected, Status::Rejected),
            (Status::Allowed, Status::Undecided, Status::Allowed),
            (Status::Undecided, Status::Allowed, Status::Allowed),
            (Status::Undecided, Status::Undecided, Status::Undecided),
            (Status::Undecided, Status::Rejected, Status::Rejected),
        ];
        for (a, b, expected) in cases {
            let merged = merge(constant(a), Some(constant(b)));
            assert_eq!(merged.check_input(&info), expected, "merge({}, {})", a, b);
        }
    }

    #[test]
    fn test_merge_short_circuits_after_reject() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let second = Filter::from_fn("counting", move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
            Status::Allowed
        });
        let merged = merge(constant(Status::Rejected), Some(second));
        assert_eq!(merged.check_input(&FilterInfo::metrics()), Status::Rejected);
        assert_eq!(calls.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_merge_with_none_is_identity() {
        let first = constant(Status::Allowed);
        let merged = merge(first.clone(), None);
        assert!(merged.ptr_eq(&first));
    }

    #[test]
    fn test_merge_description() {
        let merged = merge(constant(Status::Allowed), Some(constant(Status::Rejected)));
        assert_eq!(merged.to_string(), "merge(ALLOWED, REJECTED)");
    }

    #[test]
    fn test_reject_undecided_closes_world() {
        let filter = reject_undecided_class(create_filter("com.acme.*").unwrap().unwrap());
        let allowed = SerialClass::named("com.acme.Widget");
        let unknown = SerialClass::named("org.other.Thing");
        let int = SerialClass::primitive(Primitive::Int);

        assert_eq!(filter.check_input(&FilterInfo::for_class(&allowed)), Status::Allowed);
        assert_eq!(filter.check_input(&FilterInfo::for_class(&unknown)), Status::Rejected);
        assert_eq!(filter.check_input(&FilterInfo::for_class(&int)), Status::Undecided);
        assert_eq!(filter.check_input(&FilterInfo::metrics()), Status::Undecided);
    }

    #[test]
    fn test_reject_undecided_arrays() {
        // without component checking the pattern leaves every array undecided
        let inner = crate::pattern::GlobalFilter::compile_with("com.acme.*", false)
            .unwrap()
            .into_filter();
        let filter = reject_undecided_class(inner);
        let widgets = SerialClass::named("com.acme.Widget").with_dimensions(2);
        let things = SerialClass::named("org.other.Thing").with_dimensions(1);
        let longs = SerialClass::primitive(Primitive::Long).with_dimensions(3);

        fn info(class: &SerialClass) -> FilterInfo<'_> {
            FilterInfo::for_class(class).with_array_length(3)
        }
        assert_eq!(filter.check_input(&info(&widgets)), Status::Allowed);
        assert_eq!(filter.check_input(&info(&things)), Status::Rejected);
        assert_eq!(filter.check_input(&info(&longs)), Status::Undecided);
    }

    #[test]
    fn test_reject_undecided_passes_decisions_through() {
        let filter = reject_undecided_class(constant(Status::Rejected));
        assert_eq!(filter.check_input(&FilterInfo::metrics()), Status::Rejected);
        let filter = reject_undecided_class(constant(Status::Allowed));
        assert_eq!(filter.check_input(&FilterInfo::metrics()), Status::Allowed);
    }
}
