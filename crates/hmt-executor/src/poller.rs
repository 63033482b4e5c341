//! Bounded fill-price polling.
//!
//! Market orders usually fill within a second, but the broker reports the
//! average price asynchronously. The poller checks the order a fixed number
//! of times and never fails: exhaustion yields the signal price, tagged as
//! a fallback.

use std::time::Duration;

use hmt_broker::BrokerClient;
use hmt_core::{FillSource, OrderStatus, Price};
use hmt_telemetry::Metrics;
use tracing::{debug, warn};

/// Result of polling one order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FillOutcome {
    /// The broker reported a completed order with a positive average price.
    Filled { price: Price, attempts: u32 },
    /// The budget ran out; `price` is the signal reference price.
    Fallback { price: Price, attempts: u32 },
    /// The broker reported the order as rejected or cancelled.
    Rejected {
        status: OrderStatus,
        reason: String,
        attempts: u32,
    },
}

impl FillOutcome {
    /// Entry price and its provenance, `None` for a rejected order.
    pub fn entry(&self) -> Option<(Price, FillSource)> {
        match self {
            Self::Filled { price, .. } => Some((*price, FillSource::Filled)),
            Self::Fallback { price, .. } => Some((*price, FillSource::Fallback)),
            Self::Rejected { .. } => None,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Self::Filled { attempts, .. }
            | Self::Fallback { attempts, .. }
            | Self::Rejected { attempts, .. } => *attempts,
        }
    }

    /// Order status to record for the entry order.
    pub fn order_status(&self) -> OrderStatus {
        match self {
            Self::Filled { .. } => OrderStatus::Complete,
            Self::Fallback { .. } => OrderStatus::Open,
            Self::Rejected { status, .. } => *status,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FillPoller {
    interval: Duration,
    max_attempts: u32,
}

impl FillPoller {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// Poll `order_id` until filled, terminal, or out of attempts.
    ///
    /// Each attempt waits `interval` first. Status-call errors and unknown
    /// orders consume an attempt.
    pub async fn poll(
        &self,
        broker: &dyn BrokerClient,
        order_id: &str,
        fallback: Price,
    ) -> FillOutcome {
        let outcome = self.poll_inner(broker, order_id, fallback).await;
        Metrics::fill_polled(
            outcome.attempts(),
            matches!(outcome, FillOutcome::Fallback { .. }),
        );
        outcome
    }

    async fn poll_inner(
        &self,
        broker: &dyn BrokerClient,
        order_id: &str,
        fallback: Price,
    ) -> FillOutcome {
        for attempt in 1..=self.max_attempts {
            tokio::time::sleep(self.interval).await;

            match broker.order_status(order_id.to_string()).await {
                Ok(Some(report)) => {
                    if let Some(price) = report.filled_price() {
                        debug!(order_id, %price, attempt, "Order filled");
                        return FillOutcome::Filled {
                            price,
                            attempts: attempt,
                        };
                    }
                    if matches!(report.status, OrderStatus::Rejected | OrderStatus::Cancelled) {
                        let reason = report
                            .status_message
                            .unwrap_or_else(|| report.status.as_str().to_lowercase());
                        warn!(
                            order_id,
                            status = %report.status,
                            %reason,
                            "Order ended without fill"
                        );
                        return FillOutcome::Rejected {
                            status: report.status,
                            reason,
                            attempts: attempt,
                        };
                    }
                    debug!(order_id, status = %report.status, attempt, "Order not filled yet");
                }
                Ok(None) => debug!(order_id, attempt, "Order not visible yet"),
                Err(e) => warn!(order_id, attempt, error = %e, "Order status check failed"),
            }
        }

        warn!(
            order_id,
            attempts = self.max_attempts,
            fallback = %fallback,
            "Fill not confirmed, using signal price"
        );
        FillOutcome::Fallback {
            price: fallback,
            attempts: self.max_attempts,
        }
    }
}
