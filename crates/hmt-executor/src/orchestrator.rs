//! Parallel per-account execution.
//!
//! Each linked account runs in its own task:
//!
//! 1. Settings       -> symbol disabled?
//! 2. Connect        -> broker client for the account credentials
//! 3. Positions      -> same-direction open position blocks the entry
//! 4. Submit         -> market order, `lot_size * lot_multiplier`
//! 5. Poll           -> fill price or signal-price fallback
//! 6. Bracket        -> levels from the entry price, tick-rounded
//! 7. Persist        -> standing two-leg exit order
//!
//! A failure ends only that account's branch. The entry order is never
//! rolled back once placed.

use std::sync::Arc;

use futures_util::future::join_all;
use hmt_broker::{BrokerClient, DynBrokerFactory, MarketOrderRequest};
use hmt_core::{
    ExecutedOrder, Instrument, LinkedAccount, NormalizedSignal, NotificationKind, OrderStatus,
    SymbolSettings, WebhookKey,
};
use hmt_store::{DynStore, OrderFillUpdate};
use hmt_telemetry::Metrics;
use tracing::{error, info, info_span, warn, Instrument as _};
use uuid::Uuid;

use crate::bracket::{build_bracket, compute_levels, BracketSource};
use crate::clock::Clock;
use crate::config::ExecutionConfig;
use crate::error::AccountError;
use crate::notifier::Notifier;
use crate::poller::{FillOutcome, FillPoller};
use crate::response::AccountResult;
use crate::settings::resolve_settings;

/// Everything an account task needs, shared read-only across tasks.
pub struct ExecutionContext {
    pub store: DynStore,
    pub brokers: DynBrokerFactory,
    pub notifier: Notifier,
    pub clock: Arc<dyn Clock>,
    pub config: Arc<ExecutionConfig>,
    pub poller: FillPoller,
    pub signal: NormalizedSignal,
    pub key: WebhookKey,
    pub instrument: Instrument,
    /// Settings rows for (user, symbol).
    pub settings_rows: Vec<SymbolSettings>,
}

/// Run every account concurrently and collect results in input order.
///
/// A task that panics is reported as that account's error.
pub async fn execute_all(
    ctx: Arc<ExecutionContext>,
    accounts: Vec<LinkedAccount>,
) -> Vec<AccountResult> {
    let mut placeholders = Vec::with_capacity(accounts.len());
    let mut handles = Vec::with_capacity(accounts.len());

    for account in accounts {
        placeholders.push((AccountResult::new(&account), account.clone()));
        let span = info_span!("account", account_id = %account.id);
        handles.push(tokio::spawn(
            execute_account(ctx.clone(), account).instrument(span),
        ));
    }

    let joined = join_all(handles).await;

    let mut results = Vec::with_capacity(joined.len());
    for (outcome, (placeholder, account)) in joined.into_iter().zip(placeholders) {
        match outcome {
            Ok(result) => results.push(result),
            Err(join_error) => {
                let err = AccountError::TaskFailed(join_error.to_string());
                error!(account_id = %account.id, error = %err, "Account task aborted");
                Metrics::account_error(err.stage());
                notify_failure(&ctx, &account, &err).await;
                results.push(placeholder.failed(err.to_string()));
            }
        }
    }
    results
}

async fn execute_account(ctx: Arc<ExecutionContext>, account: LinkedAccount) -> AccountResult {
    let mut result = AccountResult::new(&account);

    match run_account(&ctx, &account, &mut result).await {
        Ok(()) => {
            info!(
                order_id = result.order_id.as_deref().unwrap_or_default(),
                bracket_id = ?result.bracket_id,
                "Account executed"
            );
            notify_success(&ctx, &account, &result).await;
        }
        Err(err) => {
            warn!(error = %err, stage = err.stage(), "Account execution failed");
            Metrics::account_error(err.stage());
            notify_failure(&ctx, &account, &err).await;
            result.error = Some(err.to_string());
        }
    }
    result
}

async fn run_account(
    ctx: &ExecutionContext,
    account: &LinkedAccount,
    result: &mut AccountResult,
) -> Result<(), AccountError> {
    let signal = &ctx.signal;
    let instrument = &ctx.instrument;

    // 1. Settings
    let settings = resolve_settings(&ctx.settings_rows, account.id, &ctx.key, &ctx.config);
    if !settings.is_enabled {
        return Err(AccountError::SymbolDisabled);
    }

    // 2. Connect
    let broker = ctx.brokers.connect(account).map_err(AccountError::Connect)?;

    // 3. Position conflict (fail closed)
    check_position_conflict(broker.as_ref(), signal, instrument).await?;

    // 4. Submit
    let quantity = instrument
        .lot_size
        .checked_mul(settings.lot_multiplier)
        .filter(|q| *q > 0)
        .ok_or_else(|| {
            AccountError::InvalidQuantity(format!(
                "lot size {} x multiplier {}",
                instrument.lot_size, settings.lot_multiplier
            ))
        })?;
    let order = MarketOrderRequest {
        tradingsymbol: instrument.tradingsymbol.clone(),
        exchange: instrument.exchange.clone(),
        direction: signal.direction,
        quantity,
        product: ctx.config.product,
        tag: Some(ctx.config.order_tag.clone()),
    };
    let order_id = match broker.place_market_order(order).await {
        Ok(id) => {
            Metrics::order_placed();
            id
        }
        Err(e) => {
            Metrics::order_failed();
            return Err(AccountError::OrderFailed(e));
        }
    };
    info!(%order_id, tradingsymbol = %instrument.tradingsymbol, quantity, "Entry order placed");
    result.order_placed = true;
    result.order_id = Some(order_id.clone());
    result.quantity = Some(quantity);

    let executed_id = record_submission(ctx, account, &order_id, quantity).await;

    // 5. Poll
    let fill = ctx.poller.poll(broker.as_ref(), &order_id, signal.price).await;
    if let Some(id) = executed_id {
        record_fill(ctx, id, &fill).await;
    }
    let (entry_price, fill_source) = match &fill {
        FillOutcome::Rejected { status, reason, .. } => {
            return Err(AccountError::OrderRejected {
                status: status.as_str().to_lowercase(),
                reason: reason.clone(),
            });
        }
        other => other.entry().ok_or_else(|| {
            AccountError::InvalidBracket("fill outcome has no entry price".to_string())
        })?,
    };
    result.fill_price = Some(entry_price);
    result.fill_source = Some(fill_source);

    // 6. Bracket levels
    let levels = compute_levels(
        signal.direction,
        entry_price,
        signal.atr,
        &settings,
        instrument.tick_size,
    )?;
    result.stop_loss = Some(levels.stop_loss);
    result.target = Some(levels.target);

    // 7. Persist
    let source = BracketSource {
        user_id: account.user_id,
        account_id: account.id,
        webhook_key_id: ctx.key.id,
        signal,
        instrument,
        broker_order_id: &order_id,
        quantity,
        product: ctx.config.product,
        entry_price,
        fill_source,
        settings: &settings,
    };
    let bracket = build_bracket(&source, &levels, ctx.clock.now());
    ctx.store
        .insert_bracket_order(&bracket)
        .await
        .map_err(AccountError::BracketPersist)?;
    Metrics::bracket_created();
    result.bracket_created = true;
    result.bracket_id = Some(bracket.id);
    Ok(())
}

/// Reject when the account already holds the resolved contract in the
/// signal's direction. A failed positions call blocks the entry.
async fn check_position_conflict(
    broker: &dyn BrokerClient,
    signal: &NormalizedSignal,
    instrument: &Instrument,
) -> Result<(), AccountError> {
    let positions = broker
        .positions()
        .await
        .map_err(AccountError::PositionsUnavailable)?;

    let conflict = positions.iter().any(|p| {
        p.tradingsymbol == instrument.tradingsymbol && signal.direction.matches_position(p.quantity)
    });
    if conflict {
        return Err(AccountError::PositionConflict(instrument.tradingsymbol.clone()));
    }
    Ok(())
}

/// Insert the entry order record; failures are logged only.
async fn record_submission(
    ctx: &ExecutionContext,
    account: &LinkedAccount,
    order_id: &str,
    quantity: u32,
) -> Option<Uuid> {
    let now = ctx.clock.now();
    let record = ExecutedOrder {
        id: Uuid::new_v4(),
        user_id: account.user_id,
        account_id: account.id,
        broker_order_id: order_id.to_string(),
        tradingsymbol: ctx.instrument.tradingsymbol.clone(),
        exchange: ctx.instrument.exchange.clone(),
        direction: ctx.signal.direction,
        quantity,
        product: ctx.config.product,
        status: OrderStatus::Submitted,
        fill_price: None,
        fill_source: None,
        created_at: now,
        updated_at: now,
    };
    match ctx.store.insert_executed_order(&record).await {
        Ok(()) => Some(record.id),
        Err(e) => {
            warn!(order_id, error = %e, "Failed to record executed order");
            None
        }
    }
}

async fn record_fill(ctx: &ExecutionContext, id: Uuid, fill: &FillOutcome) {
    let entry = fill.entry();
    let update = OrderFillUpdate {
        status: fill.order_status(),
        fill_price: entry.map(|(price, _)| price),
        fill_source: entry.map(|(_, source)| source),
        updated_at: ctx.clock.now(),
    };
    if let Err(e) = ctx.store.update_executed_order(id, update).await {
        warn!(executed_order_id = %id, error = %e, "Failed to update executed order");
    }
}

async fn notify_success(ctx: &ExecutionContext, account: &LinkedAccount, result: &AccountResult) {
    let fmt_price = |p: Option<hmt_core::Price>| p.map(|p| p.to_string()).unwrap_or_default();
    let message = format!(
        "{}: {} {} {} @ {} | SL {} | TGT {}",
        account.display_name(),
        ctx.signal.direction,
        result.quantity.unwrap_or_default(),
        ctx.instrument.tradingsymbol,
        fmt_price(result.fill_price),
        fmt_price(result.stop_loss),
        fmt_price(result.target),
    );
    ctx.notifier
        .send(hmt_core::Notification::new(
            account.user_id,
            Some(account.id),
            NotificationKind::Executed,
            "Order executed",
            message,
        ))
        .await;
}

async fn notify_failure(ctx: &ExecutionContext, account: &LinkedAccount, err: &AccountError) {
    ctx.notifier
        .per_account(
            std::slice::from_ref(account),
            NotificationKind::Error,
            "Execution failed",
            &format!("{} {}: {err}", ctx.signal.symbol, ctx.signal.direction),
        )
        .await;
}
