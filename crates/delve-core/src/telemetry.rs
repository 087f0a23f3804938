//! Pipeline metrics
//!
//! Recorded through the `metrics` facade; without an installed recorder
//! these calls are no-ops.

use metrics::{counter, histogram};

/// Delegations started by the dispatcher
pub const DISPATCH_ADMITTED: &str = "delve.dispatch.admitted";
/// Delegations rejected by the concurrency cap
pub const DISPATCH_REJECTED: &str = "delve.dispatch.rejected";
/// Supervisor planning iterations per run
pub const SUPERVISOR_ITERATIONS: &str = "delve.supervisor.iterations";
/// Compression attempts that failed
pub const COMPRESSION_FAILURES: &str = "delve.compression.failures";
/// Final-report truncation retries
pub const REPORT_TRUNCATIONS: &str = "delve.report.truncations";
/// Combined findings length before truncation
pub const COMPRESSED_RESEARCH_LENGTH: &str = "delve.report.compressed_research_length";
/// Combined raw-notes length
pub const RAW_NOTES_LENGTH: &str = "delve.report.raw_notes_length";

pub(crate) fn record_dispatch(admitted: usize, rejected: usize) {
    counter!(DISPATCH_ADMITTED).increment(admitted as u64);
    counter!(DISPATCH_REJECTED).increment(rejected as u64);
}

pub(crate) fn record_supervision(iterations: usize) {
    histogram!(SUPERVISOR_ITERATIONS).record(iterations as f64);
}

pub(crate) fn record_compression_failure(length_limit: bool) {
    let kind = if length_limit { "length" } else { "other" };
    counter!(COMPRESSION_FAILURES, "kind" => kind).increment(1);
}

pub(crate) fn record_truncation() {
    counter!(REPORT_TRUNCATIONS).increment(1);
}

pub(crate) fn record_lengths(compressed_research: usize, raw_notes: usize) {
    histogram!(COMPRESSED_RESEARCH_LENGTH).record(compressed_research as f64);
    histogram!(RAW_NOTES_LENGTH).record(raw_notes as f64);
}
