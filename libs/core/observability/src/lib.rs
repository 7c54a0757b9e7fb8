//! Observability utilities for the library catalog.
//!
//! This crate provides:
//! - Prometheus metrics recorder installation and rendering
//! - `CatalogMetrics`, the recorder used by the loan lifecycle and the
//!   validation pipeline
//!
//! # Example
//!
//! ```rust,ignore
//! use observability::{init_metrics, render_metrics, CatalogMetrics};
//!
//! init_metrics()?;
//!
//! CatalogMetrics::record_loan_started();
//! CatalogMetrics::record_availability_change("Available", "Loaned");
//!
//! println!("{}", render_metrics());
//! ```
//!
//! Recording without an installed recorder is a no-op, so library code can
//! record unconditionally.

pub mod catalog;

pub use catalog::CatalogMetrics;

pub use metrics::{counter, gauge, histogram};

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use thiserror::Error;
use tracing::info;

static METRICS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Failed to install Prometheus recorder: {0}")]
    Install(String),
}

/// Initialize the Prometheus metrics recorder.
///
/// Only the first successful call installs the recorder; later calls return
/// the same handle.
pub fn init_metrics() -> Result<&'static PrometheusHandle, MetricsError> {
    METRICS_HANDLE.get_or_try_init(|| {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| MetricsError::Install(e.to_string()))?;

        info!("Prometheus metrics recorder initialized");

        register_metric_descriptions();

        Ok(handle)
    })
}

/// Get the metrics handle (must call init_metrics first)
pub fn get_metrics_handle() -> Option<&'static PrometheusHandle> {
    METRICS_HANDLE.get()
}

/// Render the Prometheus exposition text
pub fn render_metrics() -> String {
    match get_metrics_handle() {
        Some(handle) => handle.render(),
        None => "# Metrics not initialized\n".to_string(),
    }
}

/// Register metric descriptions for documentation
fn register_metric_descriptions() {
    use metrics::describe_counter;
    use metrics::describe_gauge;
    use metrics::describe_histogram;

    // Loan lifecycle
    describe_counter!(
        "catalog_loans_total",
        "Loan attempts by outcome"
    );
    describe_counter!(
        "catalog_renewals_total",
        "Renewal attempts by outcome"
    );
    describe_counter!(
        "catalog_returns_total",
        "Return attempts by outcome"
    );
    describe_gauge!(
        "catalog_active_loans",
        "Number of loans currently registered as active"
    );
    describe_histogram!(
        "catalog_fines_assessed",
        "Fine amount assessed when an item is returned"
    );

    // Availability fan-out
    describe_counter!(
        "catalog_availability_changes_total",
        "Availability transitions by source and target state"
    );
    describe_counter!(
        "catalog_subscriber_failures_total",
        "Subscriber invocations that failed during fan-out"
    );

    // Validation
    describe_counter!(
        "catalog_validation_failures_total",
        "Rejected inputs by validator"
    );
}
