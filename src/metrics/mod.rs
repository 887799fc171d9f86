//! Metrics module
//!
//! Provides Prometheus metrics for upload requests and repository commits.

pub mod server;

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, Counter, CounterVec,
    HistogramVec,
};

lazy_static! {
    // Request metrics
    pub static ref REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "repo_uploadr_requests_total",
        "Upload requests by outcome",
        &["outcome"]  // "success", "rejected" or "failed"
    ).unwrap();

    pub static ref UPLOAD_BYTES_TOTAL: Counter = register_counter!(
        "repo_uploadr_upload_bytes_total",
        "Attachment bytes committed"
    ).unwrap();

    // Commit metrics
    pub static ref COMMITS_TOTAL: CounterVec = register_counter_vec!(
        "repo_uploadr_commits_total",
        "Repository commits",
        &["kind", "status"]  // kind: "metadata" or "file"
    ).unwrap();

    pub static ref COMMIT_DURATION: HistogramVec = register_histogram_vec!(
        "repo_uploadr_commit_duration_seconds",
        "Repository commit duration in seconds",
        &["kind"],
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    ).unwrap();

    // Error metrics
    pub static ref ERRORS_TOTAL: CounterVec = register_counter_vec!(
        "repo_uploadr_errors_total",
        "Total errors",
        &["type"]
    ).unwrap();
}

/// Record the outcome of one upload request
pub fn record_request(outcome: &str) {
    REQUESTS_TOTAL.with_label_values(&[outcome]).inc();
}

/// Record a finished commit and how long it took
pub fn record_commit(kind: &str, success: bool, duration_secs: f64) {
    let status = if success { "success" } else { "failure" };
    COMMITS_TOTAL.with_label_values(&[kind, status]).inc();
    COMMIT_DURATION.with_label_values(&[kind]).observe(duration_secs);
}

/// Record committed attachment bytes
pub fn record_upload_bytes(bytes: u64) {
    UPLOAD_BYTES_TOTAL.inc_by(bytes as f64);
}

/// Record an error
pub fn record_error(error_type: &str) {
    ERRORS_TOTAL.with_label_values(&[error_type]).inc();
}
