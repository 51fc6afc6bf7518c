//! Prometheus metrics for transaction-sync.
//!
//! A sync is a batch run, so nothing scrapes the process. The text exposition
//! is written to a file at the end of the run for a textfile collector.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram, register_int_counter, CounterVec, Encoder,
    Histogram, IntCounter, TextEncoder,
};
use std::path::Path;
use sync_core::error::AppError;

/// Counter for append outcomes (saved / already_present / in_flight).
pub static TRANSACTIONS_PROCESSED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "transaction_sync_transactions_total",
        "Total number of transactions handed to the record store",
        &["outcome"]
    )
    .expect("Failed to register TRANSACTIONS_PROCESSED")
});

/// Counter for invoice pages fetched while building the index.
pub static INVOICE_PAGES: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "transaction_sync_invoice_pages_total",
        "Total number of invoice pages fetched"
    )
    .expect("Failed to register INVOICE_PAGES")
});

/// Counter for sync runs by status.
pub static SYNC_RUNS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "transaction_sync_runs_total",
        "Total number of sync runs",
        &["status"]
    )
    .expect("Failed to register SYNC_RUNS")
});

/// Histogram for sync run duration.
pub static SYNC_DURATION: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "transaction_sync_run_duration_seconds",
        "Sync run duration in seconds",
        vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0]
    )
    .expect("Failed to register SYNC_DURATION")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&TRANSACTIONS_PROCESSED);
    Lazy::force(&INVOICE_PAGES);
    Lazy::force(&SYNC_RUNS);
    Lazy::force(&SYNC_DURATION);
}

/// Get all metrics as Prometheus text format.
pub fn get_metrics() -> Result<String, AppError> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("Failed to encode metrics: {}", e)))?;
    String::from_utf8(buffer)
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("Metrics are not UTF-8: {}", e)))
}

/// Write the text exposition to `path`, replacing any previous run's file.
pub async fn write_metrics_file(path: &Path) -> Result<(), AppError> {
    let metrics = get_metrics()?;
    tokio::fs::write(path, metrics).await?;
    Ok(())
}

/// Record an append outcome.
pub fn record_transaction_outcome(outcome: &str) {
    TRANSACTIONS_PROCESSED.with_label_values(&[outcome]).inc();
}

/// Record a fetched invoice page.
pub fn record_invoice_page() {
    INVOICE_PAGES.inc();
}

/// Record a finished sync run.
pub fn record_sync_run(status: &str, duration_secs: f64) {
    SYNC_RUNS.with_label_values(&[status]).inc();
    SYNC_DURATION.observe(duration_secs);
}
