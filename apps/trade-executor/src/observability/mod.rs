//! Observability module for metrics.
//!
//! Logging is plain `tracing`; the subscriber is installed by the binary.

mod metrics;

pub use metrics::{
    MetricsConfig, MetricsError, init_metrics, record_broker_call, record_fill_reconciled,
    record_instruction_dropped, record_order_submitted, record_reconciliation_error,
    record_trade_received, update_intake_queue_depth, update_outstanding_orders,
};
