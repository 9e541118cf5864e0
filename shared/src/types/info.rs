//! Filter invocation context
//!
//! A [`FilterInfo`] is a snapshot the deserializer builds for every candidate
//! object. Filters only ever read it.

use crate::types::class::SerialClass;
use serde::Serialize;

/// Array length reported for events that are not array creations.
pub const NOT_AN_ARRAY: i64 = -1;

/// Context passed to every filter check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FilterInfo<'a> {
    serial_class: Option<&'a SerialClass>,
    array_length: i64,
    depth: i64,
    references: i64,
    stream_bytes: i64,
}

impl<'a> FilterInfo<'a> {
    /// A check for `serial_class` (or a pure graph-metrics check when `None`)
    /// at depth 1 with no references and no bytes consumed.
    pub fn new(serial_class: Option<&'a SerialClass>) -> Self {
        Self {
            serial_class,
            array_length: NOT_AN_ARRAY,
            depth: 1,
            references: 0,
            stream_bytes: 0,
        }
    }

    /// Metrics-only check with no class.
    pub fn metrics() -> Self {
        Self::new(None)
    }

    /// Check for a class.
    pub fn for_class(serial_class: &'a SerialClass) -> Self {
        Self::new(Some(serial_class))
    }

    pub fn with_array_length(mut self, array_length: i64) -> Self {
        self.array_length = array_length;
        self
    }

    pub fn with_depth(mut self, depth: i64) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_references(mut self, references: i64) -> Self {
        self.references = references;
        self
    }

    pub fn with_stream_bytes(mut self, stream_bytes: i64) -> Self {
        self.stream_bytes = stream_bytes;
        self
    }

    /// Same metrics, different class.
    pub fn with_serial_class<'b>(&self, serial_class: Option<&'b SerialClass>) -> FilterInfo<'b> {
        FilterInfo {
            serial_class,
            array_length: self.array_length,
            depth: self.depth,
            references: self.references,
            stream_bytes: self.stream_bytes,
        }
    }

    /// Class being materialized, `None` when only graph metrics are relevant.
    pub fn serial_class(&self) -> Option<&'a SerialClass> {
        self.serial_class
    }

    /// Length of the array being created, or [`NOT_AN_ARRAY`].
    pub fn array_length(&self) -> i64 {
        self.array_length
    }

    /// Current nesting depth of the object graph.
    pub fn depth(&self) -> i64 {
        self.depth
    }

    /// Back-references resolved so far.
    pub fn references(&self) -> i64 {
        self.references
    }

    /// Bytes consumed from the stream so far.
    pub fn stream_bytes(&self) -> i64 {
        self.stream_bytes
    }
}
