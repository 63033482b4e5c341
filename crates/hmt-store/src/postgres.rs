//! PostgreSQL store.
//!
//! The idempotency claim relies on the unique index over the tracker
//! fingerprint (`INSERT ... ON CONFLICT DO NOTHING`), so duplicate
//! suppression holds across any number of gateway instances.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use hmt_core::{
    AuditLogEntry, BracketOrder, ClaimOutcome, ExecutedOrder, ExecutionTracker, Instrument,
    LinkedAccount, Notification, SymbolSettings, WebhookKey,
};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::store::{BoxFuture, OrderFillUpdate, Store};

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a connection pool.
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;
        info!(max_connections, "Connected to PostgreSQL");
        Ok(Self::new(pool))
    }

    /// Apply the bundled schema migrations.
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// ============================================================================
// Row mapping
// ============================================================================

fn non_negative(table: &'static str, field: &str, value: i32) -> StoreResult<u32> {
    u32::try_from(value).map_err(|_| StoreError::InvalidRow {
        table,
        reason: format!("{field} is negative: {value}"),
    })
}

fn optional_non_negative(
    table: &'static str,
    field: &str,
    value: Option<i32>,
) -> StoreResult<Option<u32>> {
    value.map(|v| non_negative(table, field, v)).transpose()
}

fn webhook_key_from_row(row: &PgRow) -> StoreResult<WebhookKey> {
    Ok(WebhookKey {
        id: row.try_get("id")?,
        key: row.try_get("key")?,
        user_id: row.try_get("user_id")?,
        name: row.try_get("name")?,
        is_active: row.try_get("is_active")?,
        account_ids: row.try_get("account_ids")?,
        sl_multiplier: row.try_get("sl_multiplier")?,
        target_multiplier: row.try_get("target_multiplier")?,
        lot_multiplier: optional_non_negative(
            "webhook_keys",
            "lot_multiplier",
            row.try_get("lot_multiplier")?,
        )?,
        last_used_at: row.try_get("last_used_at")?,
        created_at: row.try_get("created_at")?,
    })
}

fn account_from_row(row: &PgRow) -> StoreResult<LinkedAccount> {
    Ok(LinkedAccount {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        broker_name: row.try_get("broker_name")?,
        label: row.try_get("label")?,
        api_key: row.try_get("api_key")?,
        access_token: row.try_get("access_token")?,
        is_active: row.try_get("is_active")?,
    })
}

fn settings_from_row(row: &PgRow) -> StoreResult<SymbolSettings> {
    Ok(SymbolSettings {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        symbol: row.try_get("symbol")?,
        account_id: row.try_get("account_id")?,
        atr_multiplier: row.try_get("atr_multiplier")?,
        sl_multiplier: row.try_get("sl_multiplier")?,
        target_multiplier: row.try_get("target_multiplier")?,
        lot_multiplier: optional_non_negative(
            "symbol_settings",
            "lot_multiplier",
            row.try_get("lot_multiplier")?,
        )?,
        is_enabled: row.try_get("is_enabled")?,
    })
}

fn instrument_from_row(row: &PgRow) -> StoreResult<Instrument> {
    Ok(Instrument {
        instrument_token: row.try_get("instrument_token")?,
        tradingsymbol: row.try_get("tradingsymbol")?,
        name: row.try_get("name")?,
        exchange: row.try_get("exchange")?,
        instrument_type: row.try_get("instrument_type")?,
        expiry: row.try_get("expiry")?,
        lot_size: non_negative("instruments", "lot_size", row.try_get("lot_size")?)?,
        tick_size: row.try_get("tick_size")?,
    })
}

const ACCOUNT_COLUMNS: &str = "id, user_id, broker_name, label, api_key, access_token, is_active";

// ============================================================================
// Store implementation
// ============================================================================

impl Store for PgStore {
    fn find_webhook_key<'a>(
        &'a self,
        key: &'a str,
    ) -> BoxFuture<'a, StoreResult<Option<WebhookKey>>> {
        Box::pin(async move {
            let row = sqlx::query(
                r#"
                SELECT id, key, user_id, name, is_active, account_ids, sl_multiplier,
                       target_multiplier, lot_multiplier, last_used_at, created_at
                FROM webhook_keys
                WHERE key = $1
                "#,
            )
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

            row.as_ref().map(webhook_key_from_row).transpose()
        })
    }

    fn active_accounts<'a>(
        &'a self,
        ids: &'a [Uuid],
    ) -> BoxFuture<'a, StoreResult<Vec<LinkedAccount>>> {
        Box::pin(async move {
            let rows = sqlx::query(&format!(
                "SELECT {ACCOUNT_COLUMNS} FROM linked_accounts WHERE id = ANY($1) AND is_active"
            ))
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

            let mut accounts = rows.iter().map(account_from_row).collect::<StoreResult<Vec<_>>>()?;
            // Preserve the key's mapping order.
            accounts.sort_by_key(|a| ids.iter().position(|id| *id == a.id));
            Ok(accounts)
        })
    }

    fn find_account(&self, id: Uuid) -> BoxFuture<'_, StoreResult<Option<LinkedAccount>>> {
        Box::pin(async move {
            let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM linked_accounts WHERE id = $1");
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

            row.as_ref().map(account_from_row).transpose()
        })
    }

    fn symbol_settings<'a>(
        &'a self,
        user_id: Uuid,
        symbol: &'a str,
    ) -> BoxFuture<'a, StoreResult<Vec<SymbolSettings>>> {
        Box::pin(async move {
            let rows = sqlx::query(
                r#"
                SELECT id, user_id, symbol, account_id, atr_multiplier, sl_multiplier,
                       target_multiplier, lot_multiplier, is_enabled
                FROM symbol_settings
                WHERE user_id = $1 AND UPPER(symbol) = UPPER($2)
                "#,
            )
            .bind(user_id)
            .bind(symbol)
            .fetch_all(&self.pool)
            .await?;

            rows.iter().map(settings_from_row).collect()
        })
    }

    fn futures_contracts<'a>(
        &'a self,
        underlying: &'a str,
        on_or_after: NaiveDate,
        limit: usize,
    ) -> BoxFuture<'a, StoreResult<Vec<Instrument>>> {
        Box::pin(async move {
            let rows = sqlx::query(
                r#"
                SELECT instrument_token, tradingsymbol, name, exchange, instrument_type,
                       expiry, lot_size, tick_size
                FROM instruments
                WHERE name = $1 AND instrument_type = 'FUT' AND expiry >= $2
                ORDER BY expiry ASC
                LIMIT $3
                "#,
            )
            .bind(underlying)
            .bind(on_or_after)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

            rows.iter().map(instrument_from_row).collect()
        })
    }

    fn touch_webhook_key(&self, id: Uuid, at: DateTime<Utc>) -> BoxFuture<'_, StoreResult<()>> {
        Box::pin(async move {
            sqlx::query("UPDATE webhook_keys SET last_used_at = $2 WHERE id = $1")
                .bind(id)
                .bind(at)
                .execute(&self.pool)
                .await?;
            Ok(())
        })
    }

    fn claim_signal<'a>(
        &'a self,
        tracker: &'a ExecutionTracker,
    ) -> BoxFuture<'a, StoreResult<ClaimOutcome>> {
        Box::pin(async move {
            let fp = &tracker.fingerprint;
            let inserted: Option<(Uuid,)> = sqlx::query_as(
                r#"
                INSERT INTO execution_trackers
                    (id, webhook_key_id, symbol, direction, price_bucket, trade_date, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (webhook_key_id, symbol, direction, price_bucket, trade_date) DO NOTHING
                RETURNING id
                "#,
            )
            .bind(tracker.id)
            .bind(fp.webhook_key_id)
            .bind(&fp.symbol)
            .bind(fp.direction.as_str())
            .bind(fp.price_bucket)
            .bind(fp.trade_date)
            .bind(tracker.created_at)
            .fetch_optional(&self.pool)
            .await?;

            let outcome = match inserted {
                Some(_) => ClaimOutcome::Claimed,
                None => ClaimOutcome::Duplicate,
            };
            debug!(symbol = %fp.symbol, bucket = fp.price_bucket, ?outcome, "Signal claim");
            Ok(outcome)
        })
    }

    fn insert_executed_order<'a>(
        &'a self,
        order: &'a ExecutedOrder,
    ) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move {
            sqlx::query(
                r#"
                INSERT INTO executed_orders
                    (id, user_id, account_id, broker_order_id, tradingsymbol, exchange, direction,
                     quantity, product, status, fill_price, fill_source, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                "#,
            )
            .bind(order.id)
            .bind(order.user_id)
            .bind(order.account_id)
            .bind(&order.broker_order_id)
            .bind(&order.tradingsymbol)
            .bind(&order.exchange)
            .bind(order.direction.as_str())
            .bind(i64::from(order.quantity))
            .bind(order.product.as_str())
            .bind(order.status.as_str())
            .bind(order.fill_price.map(|p| p.inner()))
            .bind(order.fill_source.map(|s| s.as_str()))
            .bind(order.created_at)
            .bind(order.updated_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
    }

    fn update_executed_order(
        &self,
        id: Uuid,
        update: OrderFillUpdate,
    ) -> BoxFuture<'_, StoreResult<()>> {
        Box::pin(async move {
            sqlx::query(
                r#"
                UPDATE executed_orders
                SET status = $2, fill_price = $3, fill_source = $4, updated_at = $5
                WHERE id = $1
                "#,
            )
            .bind(id)
            .bind(update.status.as_str())
            .bind(update.fill_price.map(|p| p.inner()))
            .bind(update.fill_source.map(|s| s.as_str()))
            .bind(update.updated_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
    }

    fn insert_bracket_order<'a>(
        &'a self,
        bracket: &'a BracketOrder,
    ) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move {
            sqlx::query(
                r#"
                INSERT INTO bracket_orders
                    (id, user_id, account_id, webhook_key_id, tradingsymbol, exchange,
                     instrument_token, entry_direction, exit_direction, quantity, product,
                     stop_loss, target, status, metadata, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
                "#,
            )
            .bind(bracket.id)
            .bind(bracket.user_id)
            .bind(bracket.account_id)
            .bind(bracket.webhook_key_id)
            .bind(&bracket.tradingsymbol)
            .bind(&bracket.exchange)
            .bind(bracket.instrument_token)
            .bind(bracket.entry_direction.as_str())
            .bind(bracket.exit_direction.as_str())
            .bind(i64::from(bracket.quantity))
            .bind(bracket.product.as_str())
            .bind(Json(&bracket.stop_loss))
            .bind(Json(&bracket.target))
            .bind(bracket.status.as_str())
            .bind(Json(&bracket.metadata))
            .bind(bracket.created_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
    }

    fn insert_notification<'a>(
        &'a self,
        notification: &'a Notification,
    ) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move {
            sqlx::query(
                r#"
                INSERT INTO notifications (id, user_id, account_id, kind, title, message, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(notification.id)
            .bind(notification.user_id)
            .bind(notification.account_id)
            .bind(notification.kind.as_str())
            .bind(&notification.title)
            .bind(&notification.message)
            .bind(notification.created_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
    }

    fn insert_audit_entry<'a>(
        &'a self,
        entry: &'a AuditLogEntry,
    ) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move {
            sqlx::query(
                r#"
                INSERT INTO webhook_audit_log
                    (id, webhook_key, webhook_key_id, user_id, status, reason, payload, response, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(entry.id)
            .bind(&entry.webhook_key)
            .bind(entry.webhook_key_id)
            .bind(entry.user_id)
            .bind(entry.status.as_str())
            .bind(&entry.reason)
            .bind(&entry.payload)
            .bind(&entry.response)
            .bind(entry.created_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
    }
}
