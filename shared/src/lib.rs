//! Shared types for Serialguard
//!
//! This crate contains the data model exchanged between a deserializer and
//! the filter engine: the tri-state [`Status`] verdict, the reflection-free
//! [`SerialClass`] descriptor and the per-call [`FilterInfo`] snapshot.

pub mod types;

// Re-export commonly used types
pub use types::{class::*, info::*, status::*};
