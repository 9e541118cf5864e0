//! Prometheus metrics for stream filter checks

use once_cell::sync::Lazy;
use prometheus::{register_int_counter_vec, Encoder, IntCounterVec, TextEncoder};
use serialguard_shared::Status;

/// Label used when a stream has no filter bound.
pub const UNFILTERED: &str = "UNFILTERED";

pub static FILTER_CHECKS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "serialguard_filter_checks_total",
        "Filter checks performed by streams, by resulting status",
        &["status"]
    )
    .unwrap()
});

/// Count one check; `None` means the stream had no filter.
pub fn record_check(status: Option<Status>) {
    let label = status.map_or(UNFILTERED, Status::as_str);
    FILTER_CHECKS.with_label_values(&[label]).inc();
}

/// Current value of the check counter for `status`.
pub fn check_count(status: Option<Status>) -> u64 {
    let label = status.map_or(UNFILTERED, Status::as_str);
    FILTER_CHECKS.with_label_values(&[label]).get()
}

/// Render all registered metrics in the Prometheus text format.
pub fn gather() -> anyhow::Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
