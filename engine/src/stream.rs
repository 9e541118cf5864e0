//! Per-stream filter binding
//!
//! [`StreamFilter`] is the decoder's side of the registry protocol. It binds a
//! filter when the stream is created, lets the owner request one change, keeps
//! the graph counters the filter is judged against and turns a `Rejected`
//! verdict into an error the decoder can propagate.

use crate::filter::Filter;
use crate::metrics;
use crate::registry::FilterRegistry;
use serialguard_shared::{FilterInfo, SerialClass, Status, NOT_AN_ARRAY};
use thiserror::Error;
use tracing::{debug, trace};

/// Log target for individual filter decisions.
pub const FILTER_LOG_TARGET: &str = "serialguard::filter";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    #[error("filter can not be set more than once")]
    FilterAlreadySet,

    #[error("filter can not be set after an object has been read")]
    ObjectsAlreadyRead,

    #[error("filter can not be replaced with null filter")]
    NullReplacement,

    #[error("filter status: {status} for {}", class.as_deref().unwrap_or("<no class>"))]
    Rejected {
        status: Status,
        class: Option<String>,
    },

    #[error("not an array type: {0}")]
    NotAnArray(String),

    #[error("negative array size: {0}")]
    NegativeArraySize(i64),
}

/// Filter and graph counters of one deserialization stream.
#[derive(Debug)]
pub struct StreamFilter {
    filter: Option<Filter>,
    filter_set: bool,
    allow_set_after_read: bool,
    depth: i64,
    references: i64,
    stream_bytes: i64,
}

impl StreamFilter {
    /// Bind the filter the registry's factory selects for a new stream.
    pub fn new(registry: &FilterRegistry) -> Self {
        let requested = registry.filter();
        let filter = registry
            .factory_for_stream()
            .apply(None, requested.as_ref());
        debug!(
            filter = %filter.as_ref().map(ToString::to_string).unwrap_or_default(),
            "stream filter bound"
        );
        Self {
            filter,
            filter_set: false,
            allow_set_after_read: registry.set_filter_after_read(),
            depth: 0,
            references: 0,
            stream_bytes: 0,
        }
    }

    /// Filter currently bound to the stream.
    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    /// Request a different filter for this stream.
    ///
    /// The factory receives the current and the requested filter. Allowed once,
    /// and only before any object was read unless the registry permits it.
    pub fn set_filter(
        &mut self,
        registry: &FilterRegistry,
        requested: Option<Filter>,
    ) -> Result<(), StreamError> {
        if self.references > 0 && !self.allow_set_after_read {
            return Err(StreamError::ObjectsAlreadyRead);
        }
        if self.filter_set {
            return Err(StreamError::FilterAlreadySet);
        }
        self.filter_set = true;

        let next = registry
            .factory_for_stream()
            .apply(self.filter.as_ref(), requested.as_ref());
        if self.filter.is_some() && next.is_none() {
            return Err(StreamError::NullReplacement);
        }
        debug!(
            filter = %next.as_ref().map(ToString::to_string).unwrap_or_default(),
            "stream filter replaced"
        );
        self.filter = next;
        Ok(())
    }

    /// A nested object starts.
    pub fn enter_object(&mut self) {
        self.depth += 1;
    }

    /// The innermost object completed.
    pub fn exit_object(&mut self) {
        self.depth = (self.depth - 1).max(0);
    }

    /// An object or back-reference was read.
    pub fn record_reference(&mut self) {
        self.references += 1;
    }

    /// `n` more bytes were consumed from the stream.
    pub fn record_bytes(&mut self, n: u64) {
        let n = i64::try_from(n).unwrap_or(i64::MAX);
        self.stream_bytes = self.stream_bytes.saturating_add(n);
    }

    pub fn depth(&self) -> i64 {
        self.depth
    }

    pub fn references(&self) -> i64 {
        self.references
    }

    pub fn stream_bytes(&self) -> i64 {
        self.stream_bytes
    }

    /// Snapshot of the counters for a check of `class`.
    pub fn info<'a>(&self, class: Option<&'a SerialClass>, array_length: i64) -> FilterInfo<'a> {
        FilterInfo::new(class)
            .with_array_length(array_length)
            .with_depth(self.depth)
            .with_references(self.references)
            .with_stream_bytes(self.stream_bytes)
    }

    /// Check a candidate object (or, with no class, the graph metrics alone).
    ///
    /// Without a bound filter every check is `Undecided`. A `Rejected` verdict
    /// is returned as [`StreamError::Rejected`].
    pub fn check(&self, class: Option<&SerialClass>, array_length: i64) -> Result<Status, StreamError> {
        let Some(filter) = &self.filter else {
            metrics::record_check(None);
            return Ok(Status::Undecided);
        };

        let info = self.info(class, array_length);
        let status = filter.check_input(&info);
        metrics::record_check(Some(status));

        let class_name = class.map(ToString::to_string);
        if status.is_rejected() {
            debug!(
                target: FILTER_LOG_TARGET,
                status = %status,
                class = class_name.as_deref().unwrap_or("null"),
                array_length,
                references = self.references,
                depth = self.depth,
                bytes = self.stream_bytes,
                "serialization filter"
            );
            return Err(StreamError::Rejected {
                status,
                class: class_name,
            });
        }
        trace!(
            target: FILTER_LOG_TARGET,
            status = %status,
            class = class_name.as_deref().unwrap_or("null"),
            array_length,
            references = self.references,
            depth = self.depth,
            bytes = self.stream_bytes,
            "serialization filter"
        );
        Ok(status)
    }

    /// Check an object that is not an array.
    pub fn check_class(&self, class: &SerialClass) -> Result<Status, StreamError> {
        self.check(Some(class), NOT_AN_ARRAY)
    }

    /// Check the creation of an array of `length` elements.
    pub fn check_array(&self, class: &SerialClass, length: i64) -> Result<Status, StreamError> {
        if !class.is_array() {
            return Err(StreamError::NotAnArray(class.to_string()));
        }
        if length < 0 {
            return Err(StreamError::NegativeArraySize(length));
        }
        self.check(Some(class), length)
    }

    /// Check the graph metrics alone, e.g. when a back-reference is resolved.
    pub fn check_metrics(&self) -> Result<Status, StreamError> {
        self.check(None, NOT_AN_ARRAY)
    }
}
