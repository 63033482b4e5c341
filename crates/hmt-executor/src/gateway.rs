//! Webhook request handling.
//!
//! # Pipeline (in `Gateway::handle`)
//!
//! 1. Normalize       -> 400 Validation
//! 2. Trading window  -> 200 blocked_by_platform (rejected_time_window)
//! 3. Key             -> 401 Auth
//! 4. Accounts        -> 200 error "no accounts mapped"
//! 5. Idempotency     -> 200 blocked_by_platform "duplicate signal"
//! 6. Instrument      -> 200 error (instrument not found)
//! 7. Orchestrate     -> 200 with per-account results
//!
//! Exactly one audit entry is written per request, whichever step ends it.
//! The pipeline runs on its own task, so a caller that disconnects mid-poll
//! still gets its orders audited.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use hmt_broker::DynBrokerFactory;
use hmt_core::{
    AuditStatus, ClaimOutcome, NormalizedSignal, NotificationKind, TradingWindow, WindowCheck,
};
use hmt_store::DynStore;
use hmt_telemetry::Metrics;
use serde_json::Value;
use tracing::{error, info, info_span, warn, Instrument as _};
use uuid::Uuid;

use crate::audit::{AuditContext, AuditLogger};
use crate::clock::{Clock, SystemClock};
use crate::config::ExecutionConfig;
use crate::error::{GatewayError, GatewayResult, INTERNAL_ERROR_MESSAGE};
use crate::instrument::resolve_contract;
use crate::normalizer::{normalize, peek_webhook_key};
use crate::notifier::Notifier;
use crate::orchestrator::{execute_all, ExecutionContext};
use crate::poller::FillPoller;
use crate::resolver::{resolve_accounts, resolve_key};
use crate::response::WebhookResponse;
use crate::tracker::{claim_signal, DUPLICATE_SIGNAL_MESSAGE};

/// HTTP status and body for one webhook request.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayResponse {
    pub status_code: u16,
    pub body: WebhookResponse,
}

/// How the pipeline ended, before auditing.
struct Outcome {
    status_code: u16,
    body: WebhookResponse,
    audit_status: AuditStatus,
    reason: Option<String>,
}

impl Outcome {
    fn from_error(err: GatewayError) -> Self {
        match &err {
            GatewayError::Store(_) | GatewayError::Internal(_) => {
                error!(error = %err, "Webhook failed")
            }
            _ => info!(error = %err, "Webhook rejected"),
        }
        Self {
            status_code: err.status_code(),
            body: WebhookResponse::failure(err.public_message()),
            audit_status: err.audit_status(),
            reason: Some(err.to_string()),
        }
    }
}

#[derive(Clone)]
pub struct Gateway {
    store: DynStore,
    brokers: DynBrokerFactory,
    window: TradingWindow,
    config: Arc<ExecutionConfig>,
    clock: Arc<dyn Clock>,
    notifier: Notifier,
    audit: AuditLogger,
    poller: FillPoller,
}

impl Gateway {
    pub fn new(
        store: DynStore,
        brokers: DynBrokerFactory,
        window: TradingWindow,
        config: ExecutionConfig,
    ) -> Self {
        let poller = FillPoller::new(config.poll_interval(), config.poll_max_attempts);
        Self {
            notifier: Notifier::new(store.clone()),
            audit: AuditLogger::new(store.clone()),
            store,
            brokers,
            window,
            config: Arc::new(config),
            clock: Arc::new(SystemClock),
            poller,
        }
    }

    /// Replace the wall clock (tests, replay).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &DynStore {
        &self.store
    }

    pub fn brokers(&self) -> &DynBrokerFactory {
        &self.brokers
    }

    pub fn window(&self) -> &TradingWindow {
        &self.window
    }

    /// Handle one raw webhook body.
    ///
    /// The work is detached from the returned future: dropping it does not
    /// stop order placement or the audit write.
    pub async fn handle(&self, body: &[u8]) -> GatewayResponse {
        let request_id = Uuid::new_v4();
        let gateway = self.clone();
        let body = body.to_vec();
        let task = tokio::spawn(
            async move { gateway.handle_inner(&body).await }
                .instrument(info_span!("webhook", %request_id)),
        );

        match task.await {
            Ok(response) => response,
            Err(e) => {
                error!(%request_id, error = %e, "Webhook task aborted");
                GatewayResponse {
                    status_code: 500,
                    body: WebhookResponse::failure(INTERNAL_ERROR_MESSAGE),
                }
            }
        }
    }

    async fn handle_inner(&self, body: &[u8]) -> GatewayResponse {
        let started = Instant::now();
        let now = self.clock.now();
        let mut audit = AuditContext::default();

        let (payload, outcome) = match serde_json::from_slice::<Value>(body) {
            Ok(payload) => {
                audit.webhook_key = peek_webhook_key(&payload);
                let outcome = match self.process(&payload, now, &mut audit).await {
                    Ok(outcome) => outcome,
                    Err(err) => Outcome::from_error(err),
                };
                (payload, outcome)
            }
            Err(e) => (
                Value::String(String::from_utf8_lossy(body).into_owned()),
                Outcome::from_error(GatewayError::Validation(format!(
                    "body is not valid JSON: {e}"
                ))),
            ),
        };

        let response_json = serde_json::to_value(&outcome.body).unwrap_or(Value::Null);
        self.audit
            .record(
                &audit,
                outcome.audit_status,
                outcome.reason,
                payload,
                response_json,
                now,
            )
            .await;

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        Metrics::webhook_handled(outcome.audit_status.as_str(), elapsed_ms);
        info!(
            status_code = outcome.status_code,
            outcome = %outcome.audit_status,
            elapsed_ms,
            "Webhook handled"
        );

        GatewayResponse {
            status_code: outcome.status_code,
            body: outcome.body,
        }
    }

    async fn process(
        &self,
        payload: &Value,
        now: DateTime<Utc>,
        audit: &mut AuditContext,
    ) -> GatewayResult<Outcome> {
        // 1. Normalize
        let signal = normalize(payload, &self.config.default_exchange)?;
        info!(
            symbol = %signal.symbol,
            direction = %signal.direction,
            price = %signal.price,
            atr = %signal.atr,
            "Signal received"
        );

        // 2. Trading window
        let check = self.window.check_at(now);
        if !check.allowed {
            Metrics::signal_blocked("trading_window");
            self.notify_outside_window(&signal, &check, audit).await;
            return Ok(Outcome {
                status_code: 200,
                body: WebhookResponse::outside_window(&check),
                audit_status: AuditStatus::RejectedTimeWindow,
                reason: Some(format!(
                    "outside trading window {} at {}",
                    check.allowed_window, check.current_time
                )),
            });
        }

        // 3. Key
        let key = resolve_key(self.store.as_ref(), &signal.webhook_key).await?;
        audit.webhook_key_id = Some(key.id);
        audit.user_id = Some(key.user_id);
        self.touch_key(key.id, now);

        // 4. Accounts
        let accounts = match resolve_accounts(self.store.as_ref(), &key).await {
            Ok(accounts) => accounts,
            Err(err @ GatewayError::Config(_)) => {
                self.notifier
                    .user(
                        key.user_id,
                        NotificationKind::Error,
                        "Signal not executed",
                        &format!(
                            "{} {}: {}",
                            signal.symbol,
                            signal.direction,
                            err.public_message()
                        ),
                    )
                    .await;
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        // 5. Idempotency
        let trade_date = self.window.trading_date(now);
        let claim = claim_signal(self.store.as_ref(), &signal, key.id, trade_date, now).await?;
        if claim == ClaimOutcome::Duplicate {
            Metrics::signal_blocked("duplicate");
            self.notifier
                .per_account(
                    &accounts,
                    NotificationKind::Blocked,
                    "Duplicate signal blocked",
                    &format!(
                        "{} {} @ {} already executed today",
                        signal.symbol, signal.direction, signal.price
                    ),
                )
                .await;
            return Ok(Outcome {
                status_code: 200,
                body: WebhookResponse::blocked(DUPLICATE_SIGNAL_MESSAGE),
                audit_status: AuditStatus::Rejected,
                reason: Some(DUPLICATE_SIGNAL_MESSAGE.to_string()),
            });
        }

        // 6. Instrument
        let resolved =
            resolve_contract(self.store.as_ref(), &signal.symbol, &self.window, now).await;
        let instrument = match resolved {
            Ok(instrument) => instrument,
            Err(err @ GatewayError::InstrumentNotFound(_)) => {
                self.notifier
                    .per_account(
                        &accounts,
                        NotificationKind::Error,
                        "Instrument not found",
                        &err.public_message(),
                    )
                    .await;
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        // 7. Orchestrate
        let settings_rows = self.store.symbol_settings(key.user_id, &signal.symbol).await?;
        let tradingsymbol = instrument.tradingsymbol.clone();
        let ctx = Arc::new(ExecutionContext {
            store: self.store.clone(),
            brokers: self.brokers.clone(),
            notifier: self.notifier.clone(),
            clock: self.clock.clone(),
            config: self.config.clone(),
            poller: self.poller,
            signal,
            key,
            instrument,
            settings_rows,
        });
        let results = execute_all(ctx, accounts).await;

        let body = WebhookResponse::executed(&tradingsymbol, results);
        let success_count = body.success_count.unwrap_or_default();
        let total = body.total.unwrap_or_default();
        let audit_status = match success_count {
            0 => AuditStatus::Failed,
            n if n == total => AuditStatus::Success,
            _ => AuditStatus::PartialSuccess,
        };
        Ok(Outcome {
            status_code: 200,
            reason: body.summary.clone(),
            body,
            audit_status,
        })
    }

    /// Best-effort: tell the key's accounts why nothing happened.
    async fn notify_outside_window(
        &self,
        signal: &NormalizedSignal,
        check: &WindowCheck,
        audit: &mut AuditContext,
    ) {
        let key = match self.store.find_webhook_key(&signal.webhook_key).await {
            Ok(Some(key)) if key.is_active => key,
            Ok(_) => return,
            Err(e) => {
                warn!(error = %e, "Key lookup for blocked signal failed");
                return;
            }
        };
        audit.webhook_key_id = Some(key.id);
        audit.user_id = Some(key.user_id);

        let accounts = match self.store.active_accounts(&key.account_ids).await {
            Ok(accounts) => accounts,
            Err(e) => {
                warn!(error = %e, "Account lookup for blocked signal failed");
                return;
            }
        };
        self.notifier
            .per_account(
                &accounts,
                NotificationKind::Blocked,
                "Signal outside trading window",
                &format!(
                    "{} {} received at {}, allowed {}",
                    signal.symbol, signal.direction, check.current_time, check.allowed_window
                ),
            )
            .await;
    }

    /// Record key usage without delaying the response.
    fn touch_key(&self, key_id: Uuid, at: DateTime<Utc>) {
        let store = self.store.clone();
        tokio::spawn(async move {
            if let Err(e) = store.touch_webhook_key(key_id, at).await {
                warn!(webhook_key_id = %key_id, error = %e, "Failed to update key last_used_at");
            }
        });
    }
}
