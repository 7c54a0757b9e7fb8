//! Catalog and loan lifecycle metrics.

use metrics::{counter, gauge, histogram};

/// Catalog metrics recorder
pub struct CatalogMetrics;

impl CatalogMetrics {
    // =========================================================================
    // Loan Lifecycle Metrics
    // =========================================================================

    /// Record a successful loan
    pub fn record_loan_started() {
        counter!("catalog_loans_total", "outcome" => "started").increment(1);
    }

    /// Record a rejected loan attempt
    pub fn record_loan_rejected(reason: &str) {
        counter!(
            "catalog_loans_total",
            "outcome" => "rejected",
            "reason" => reason.to_string()
        )
        .increment(1);
    }

    /// Record a successful renewal
    pub fn record_renewal(renewal_count: u8) {
        counter!("catalog_renewals_total", "outcome" => "renewed").increment(1);

        tracing::debug!(renewal_count = renewal_count, "Renewal recorded");
    }

    /// Record a rejected renewal attempt
    pub fn record_renewal_rejected(reason: &str) {
        counter!(
            "catalog_renewals_total",
            "outcome" => "rejected",
            "reason" => reason.to_string()
        )
        .increment(1);
    }

    /// Record a return and the fine assessed for it
    pub fn record_return(fine: f64) {
        counter!("catalog_returns_total", "outcome" => "returned").increment(1);

        if fine > 0.0 {
            histogram!("catalog_fines_assessed").record(fine);
        }
    }

    /// Record a rejected return attempt
    pub fn record_return_rejected(reason: &str) {
        counter!(
            "catalog_returns_total",
            "outcome" => "rejected",
            "reason" => reason.to_string()
        )
        .increment(1);
    }

    /// Set the number of active loans
    pub fn set_active_loans(count: usize) {
        gauge!("catalog_active_loans").set(count as f64);
    }

    // =========================================================================
    // Fan-out Metrics
    // =========================================================================

    /// Record an availability transition that was persisted and fanned out
    pub fn record_availability_change(from: &str, to: &str) {
        counter!(
            "catalog_availability_changes_total",
            "from" => from.to_string(),
            "to" => to.to_string()
        )
        .increment(1);
    }

    /// Record a subscriber that failed while being notified
    pub fn record_subscriber_failure(subscriber: &str) {
        counter!(
            "catalog_subscriber_failures_total",
            "subscriber" => subscriber.to_string()
        )
        .increment(1);
    }

    // =========================================================================
    // Validation Metrics
    // =========================================================================

    /// Record an input rejected by a validator
    pub fn record_validation_failure(validator: &str) {
        counter!(
            "catalog_validation_failures_total",
            "validator" => validator.to_string()
        )
        .increment(1);
    }
}
