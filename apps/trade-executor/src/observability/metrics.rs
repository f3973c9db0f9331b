//! Prometheus metrics for the trade executor.
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter, so the
//! helpers are safe to call from tests and from `metrics.enabled: false`.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Configuration for the metrics exporter.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Address to bind the metrics HTTP listener.
    pub listen_addr: SocketAddr,
    /// Histogram buckets for broker call latency (in seconds).
    pub latency_buckets: Vec<f64>,
}

impl MetricsConfig {
    /// Create a metrics configuration for an address.
    #[must_use]
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            listen_addr: addr,
            // 5ms to 10s: broker calls cross the network
            latency_buckets: vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
        }
    }
}

/// Initialize the Prometheus metrics exporter.
///
/// Starts an HTTP listener that serves `/metrics`.
///
/// # Errors
///
/// Returns an error if the exporter fails to start (e.g., port already in use).
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    PrometheusBuilder::new()
        .with_http_listener(config.listen_addr)
        .set_buckets(&config.latency_buckets)
        .map_err(|e| MetricsError::Configuration(e.to_string()))?
        .install()
        .map_err(|e| MetricsError::Installation(e.to_string()))?;

    tracing::info!(addr = %config.listen_addr, "Prometheus metrics exporter started");
    Ok(())
}

/// Error type for metrics operations.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Failed to configure metrics exporter.
    #[error("metrics configuration error: {0}")]
    Configuration(String),
    /// Failed to install metrics exporter.
    #[error("metrics installation error: {0}")]
    Installation(String),
}

/// Record an intake call.
///
/// `result` is `accepted` or the error code that rejected it.
pub fn record_trade_received(result: &str) {
    counter!("trades_received_total", "result" => result.to_string()).increment(1);
}

/// Record a successful order submission.
pub fn record_order_submitted(broker: &str, order_type: &str) {
    counter!(
        "orders_submitted_total",
        "broker" => broker.to_string(),
        "order_type" => order_type.to_string()
    )
    .increment(1);
}

/// Record an instruction dropped by a worker.
///
/// * `reason` - `duplicate`, `quote_failed`, `no_price` or `submit_failed`
pub fn record_instruction_dropped(reason: &str) {
    counter!("instructions_dropped_total", "reason" => reason.to_string()).increment(1);
}

/// Record a terminal report applied to a position.
pub fn record_fill_reconciled(status: &str) {
    counter!("fills_reconciled_total", "status" => status.to_string()).increment(1);
}

/// Record a failed reconciliation step (poll or apply).
pub fn record_reconciliation_error() {
    counter!("reconciliation_errors_total").increment(1);
}

/// Set the number of outstanding orders.
#[allow(clippy::cast_precision_loss)]
pub fn update_outstanding_orders(count: usize) {
    gauge!("outstanding_orders").set(count as f64);
}

/// Set the number of instructions buffered in the intake queue.
#[allow(clippy::cast_precision_loss)]
pub fn update_intake_queue_depth(depth: usize) {
    gauge!("intake_queue_depth").set(depth as f64);
}

/// Record broker call latency.
///
/// * `operation` - `quote`, `order` or `trades`
pub fn record_broker_call(operation: &str, seconds: f64) {
    histogram!("broker_call_seconds", "operation" => operation.to_string()).record(seconds);
}
