//! Deserialization filter engine
//!
//! Decides, for every object a deserializer is about to create, whether the
//! creation is allowed, rejected or left undecided. Policies are written as
//! pattern strings (see [`pattern`]), composed with [`merge`] and
//! [`reject_undecided_class`], and distributed to streams through a
//! [`FilterRegistry`] and its [`Factory`].

pub mod combinators;
pub mod factory;
pub mod filter;
pub mod metrics;
pub mod pattern;
pub mod registry;
pub mod settings;
pub mod stream;

pub use combinators::{merge, reject_undecided_class};
pub use factory::{Factory, FilterFactory};
pub use filter::{allow_filter, reject_filter, CheckInput, Filter};
pub use pattern::{create_filter, GlobalFilter, Limits, Matcher, PatternError, PatternRule};
pub use registry::{ConfigError, FilterRegistry};
pub use settings::Settings;
pub use stream::{StreamError, StreamFilter};

// Re-export the shared data model
pub use serialguard_shared::{FilterInfo, Primitive, SerialClass, Status};
