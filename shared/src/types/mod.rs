//! Data types passed across the filter boundary

pub mod class;
pub mod info;
pub mod status;
