//! Prometheus metrics for the fulfillment engine.
//!
//! Components record through the small recorder types below; an application installs
//! the exporter once with [`MetricsServer::start`].
//!
//! # Example
//!
//! ```rust,no_run
//! use fulfillment_engine::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//! println!("{}", server.render().unwrap_or_default());
//! # Ok(())
//! # }
//! ```

use fulfillment_core::types::CredentialKind;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),

    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus metrics exporter handle.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server for `addr`.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Describe every metric and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed. A recorder that is
    /// already installed (common in tests) is logged and tolerated.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_fulfillment_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(addr = %self.addr, "Metrics recorder installed");
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Address the exporter is meant to be scraped on.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Render current metrics in Prometheus text format.
    ///
    /// Returns `None` if the server hasn't been started.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Describe every `fulfillment_*` metric.
pub fn register_fulfillment_metrics() {
    // Payments
    describe_counter!(
        "fulfillment_payments_total",
        "Payment transactions by target kind and outcome"
    );
    describe_histogram!(
        "fulfillment_payment_duration_seconds",
        "Time taken by a payment transaction, including commit"
    );

    // Ledger
    describe_counter!(
        "fulfillment_stock_decrements_total",
        "Stock decrements by outcome"
    );
    describe_counter!(
        "fulfillment_stock_increments_total",
        "Stock increments (restock and cancellation returns)"
    );
    describe_gauge!(
        "fulfillment_stock_level",
        "Last written quantity per item and location"
    );
    describe_counter!(
        "fulfillment_low_stock_total",
        "Decrements that left a counter at or below its threshold"
    );

    // Credentials
    describe_counter!(
        "fulfillment_credentials_issued_total",
        "Credentials issued by kind"
    );
    describe_counter!(
        "fulfillment_redemptions_total",
        "Redemption attempts by outcome"
    );
    describe_counter!(
        "fulfillment_cascade_failures_total",
        "Redeemed credentials whose entity update failed"
    );

    // Passes
    describe_counter!(
        "fulfillment_passes_issued_total",
        "Entrance passes issued by type"
    );

    // Stores
    describe_counter!(
        "fulfillment_store_errors_total",
        "Store failures by kind (database, lock_timeout, conflict)"
    );
}

/// Payment path recorder.
pub struct PaymentMetrics;

impl PaymentMetrics {
    /// Record one payment attempt.
    pub fn record(target: &'static str, outcome: &'static str, duration: Duration) {
        counter!("fulfillment_payments_total", "target" => target, "outcome" => outcome)
            .increment(1);
        histogram!("fulfillment_payment_duration_seconds", "target" => target)
            .record(duration.as_secs_f64());
    }

    /// Record one issued entrance pass.
    pub fn record_pass(pass_type: &str) {
        counter!("fulfillment_passes_issued_total", "type" => pass_type.to_string()).increment(1);
    }
}

/// Ledger recorder.
pub struct LedgerMetrics;

impl LedgerMetrics {
    /// Record a decrement attempt.
    pub fn record_decrement(outcome: &'static str) {
        counter!("fulfillment_stock_decrements_total", "outcome" => outcome).increment(1);
    }

    /// Record an increment.
    pub fn record_increment() {
        counter!("fulfillment_stock_increments_total").increment(1);
    }

    /// Publish the quantity just written for a counter.
    pub fn record_level(item_id: &str, location: &str, quantity: u32) {
        gauge!(
            "fulfillment_stock_level",
            "item" => item_id.to_string(),
            "location" => location.to_string()
        )
        .set(f64::from(quantity));
    }

    /// Record a decrement that crossed the advisory threshold.
    pub fn record_low_stock(item_id: &str, location: &str) {
        counter!(
            "fulfillment_low_stock_total",
            "item" => item_id.to_string(),
            "location" => location.to_string()
        )
        .increment(1);
    }
}

/// Credential recorder.
pub struct CredentialMetrics;

impl CredentialMetrics {
    /// Record an issued credential.
    pub fn record_issued(kind: CredentialKind) {
        counter!("fulfillment_credentials_issued_total", "kind" => kind.as_str()).increment(1);
    }

    /// Record a redemption attempt.
    pub fn record_redemption(outcome: &'static str) {
        counter!("fulfillment_redemptions_total", "outcome" => outcome).increment(1);
    }

    /// Record a cascade failure.
    pub fn record_cascade_failure(kind: CredentialKind) {
        counter!("fulfillment_cascade_failures_total", "kind" => kind.as_str()).increment(1);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;

    #[test]
    fn render_is_none_before_start() {
        let server = MetricsServer::new("127.0.0.1:9090".parse().unwrap());
        assert!(server.render().is_none());
        assert_eq!(server.addr().port(), 9090);
    }

    #[test]
    fn recorders_are_noops_without_exporter() {
        PaymentMetrics::record("order", "paid", Duration::from_millis(3));
        LedgerMetrics::record_decrement("applied");
        LedgerMetrics::record_level("lager", "bar", 4);
        CredentialMetrics::record_issued(CredentialKind::Order);
        CredentialMetrics::record_redemption("redeemed");
    }
}
