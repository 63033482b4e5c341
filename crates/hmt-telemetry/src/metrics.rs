//! Prometheus metrics for the signal gateway.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. A registration failure
//! means duplicate metric names, which must crash at startup rather than
//! silently drop metrics. These panics only occur during static
//! initialization, never at runtime.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram, register_histogram_vec, register_int_counter,
    CounterVec, Encoder, Histogram, HistogramVec, IntCounter, TextEncoder,
};

use crate::error::TelemetryResult;

/// Webhook requests by final audit status.
/// Labels: outcome (success/partial_success/failed/rejected/rejected_time_window/error)
pub static WEBHOOK_REQUESTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "hmt_webhook_requests_total",
        "Total webhook requests by outcome",
        &["outcome"]
    )
    .unwrap()
});

/// End-to-end webhook handling latency in milliseconds.
pub static WEBHOOK_LATENCY_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "hmt_webhook_latency_ms",
        "Webhook handling latency in milliseconds",
        &["outcome"],
        vec![5.0, 25.0, 100.0, 250.0, 500.0, 1000.0, 2000.0, 5000.0, 10000.0]
    )
    .unwrap()
});

/// Signals refused by the platform before execution.
/// Labels: reason (trading_window/duplicate)
pub static SIGNALS_BLOCKED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "hmt_signals_blocked_total",
        "Total signals blocked by platform gates",
        &["reason"]
    )
    .unwrap()
});

/// Entry orders by submission result.
/// Labels: result (placed/failed)
pub static ORDERS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "hmt_orders_total",
        "Total entry market orders by result",
        &["result"]
    )
    .unwrap()
});

/// Per-account execution failures.
/// Labels: stage (connect/position/order/fill/bracket/task)
pub static ACCOUNT_ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "hmt_account_errors_total",
        "Total per-account execution failures by stage",
        &["stage"]
    )
    .unwrap()
});

pub static BRACKETS_CREATED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "hmt_brackets_created_total",
        "Total bracket (HMT GTT) orders persisted"
    )
    .unwrap()
});

/// Fills that fell back to the signal price.
pub static FILL_FALLBACK_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "hmt_fill_fallback_total",
        "Total fill polls that exhausted their budget"
    )
    .unwrap()
});

/// Status calls made per fill poll.
pub static FILL_POLL_ATTEMPTS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "hmt_fill_poll_attempts",
        "Order status calls per fill poll",
        vec![1.0, 2.0, 3.0, 4.0, 5.0, 10.0]
    )
    .unwrap()
});

/// Metrics facade.
pub struct Metrics;

impl Metrics {
    /// Record a finished webhook request.
    pub fn webhook_handled(outcome: &str, latency_ms: f64) {
        WEBHOOK_REQUESTS_TOTAL.with_label_values(&[outcome]).inc();
        WEBHOOK_LATENCY_MS
            .with_label_values(&[outcome])
            .observe(latency_ms);
    }

    pub fn signal_blocked(reason: &str) {
        SIGNALS_BLOCKED_TOTAL.with_label_values(&[reason]).inc();
    }

    pub fn order_placed() {
        ORDERS_TOTAL.with_label_values(&["placed"]).inc();
    }

    pub fn order_failed() {
        ORDERS_TOTAL.with_label_values(&["failed"]).inc();
    }

    pub fn account_error(stage: &str) {
        ACCOUNT_ERRORS_TOTAL.with_label_values(&[stage]).inc();
    }

    pub fn bracket_created() {
        BRACKETS_CREATED_TOTAL.inc();
    }

    /// Record a completed fill poll.
    pub fn fill_polled(attempts: u32, fallback: bool) {
        FILL_POLL_ATTEMPTS.observe(f64::from(attempts));
        if fallback {
            FILL_FALLBACK_TOTAL.inc();
        }
    }

    /// Encode every registered metric in the Prometheus text format.
    pub fn gather_text() -> TelemetryResult<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&prometheus::gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
