//! Inbound payload validation.
//!
//! Turns the loosely-typed webhook body into a [`NormalizedSignal`].
//! Nothing downstream reads the raw map again; it is kept only for audit.

use std::str::FromStr;

use hmt_core::{Direction, NormalizedSignal, Price};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{GatewayError, GatewayResult};

/// Webhook payload as sent by charting platforms.
///
/// Every field is read as an untyped value so that a wrong type is reported
/// against the field name rather than as a generic decode failure.
#[derive(Debug, Default, Deserialize)]
struct RawSignal {
    webhook_key: Option<Value>,
    symbol: Option<Value>,
    trade_type: Option<Value>,
    /// Legacy name for `trade_type`.
    action: Option<Value>,
    price: Option<Value>,
    atr: Option<Value>,
    exchange: Option<Value>,
    timeframe: Option<Value>,
    event_time: Option<Value>,
}

/// Best-effort read of the key for audit purposes, before validation.
pub fn peek_webhook_key(payload: &Value) -> Option<String> {
    payload
        .get("webhook_key")
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Validate `payload` into a [`NormalizedSignal`].
pub fn normalize(payload: &Value, default_exchange: &str) -> GatewayResult<NormalizedSignal> {
    if !payload.is_object() {
        return Err(GatewayError::Validation(
            "payload must be a JSON object".to_string(),
        ));
    }
    let raw = RawSignal::deserialize(payload)
        .map_err(|e| GatewayError::Validation(format!("malformed payload: {e}")))?;

    let webhook_key = required_text("webhook_key", raw.webhook_key.as_ref())?;
    let symbol = required_text("symbol", raw.symbol.as_ref())?.to_uppercase();

    let direction_text = match optional_text("trade_type", raw.trade_type.as_ref())? {
        Some(text) => text,
        None => optional_text("action", raw.action.as_ref())?
            .ok_or_else(|| missing("trade_type"))?,
    };
    let direction = Direction::from_str(&direction_text).map_err(|_| {
        GatewayError::Validation(format!(
            "trade_type must be BUY or SELL, got {direction_text:?}"
        ))
    })?;

    let price = positive_number("price", raw.price.as_ref())?;
    let atr = positive_number("atr", raw.atr.as_ref())?;

    let exchange = optional_text("exchange", raw.exchange.as_ref())?
        .map(|e| e.to_uppercase())
        .unwrap_or_else(|| default_exchange.to_uppercase());

    Ok(NormalizedSignal {
        webhook_key,
        symbol,
        exchange,
        direction,
        price: Price::new(price),
        atr,
        timeframe: scalar_text(raw.timeframe.as_ref()),
        event_time: scalar_text(raw.event_time.as_ref()),
        raw: payload.clone(),
    })
}

fn missing(field: &str) -> GatewayError {
    GatewayError::Validation(format!("missing required field: {field}"))
}

/// Trimmed non-empty string, `None` when absent or blank.
fn optional_text(field: &str, value: Option<&Value>) -> GatewayResult<Option<String>> {
    match value {
        None => Ok(None),
        Some(Value::String(s)) => {
            let s = s.trim();
            Ok((!s.is_empty()).then(|| s.to_string()))
        }
        Some(other) => Err(GatewayError::Validation(format!(
            "{field} must be a string, got {other}"
        ))),
    }
}

fn required_text(field: &str, value: Option<&Value>) -> GatewayResult<String> {
    optional_text(field, value)?.ok_or_else(|| missing(field))
}

/// Numbers may arrive as JSON numbers or numeric strings.
fn positive_number(field: &str, value: Option<&Value>) -> GatewayResult<Decimal> {
    let text = match value {
        None => return Err(missing(field)),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::String(_)) => return Err(missing(field)),
        Some(other) => {
            return Err(GatewayError::Validation(format!(
                "{field} must be a number, got {other}"
            )))
        }
    };

    let parsed = Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| GatewayError::Validation(format!("{field} is not numeric: {text:?}")))?;

    if parsed <= Decimal::ZERO {
        return Err(GatewayError::Validation(format!(
            "{field} must be positive, got {parsed}"
        )));
    }
    Ok(parsed.normalize())
}

/// Optional informational fields: any scalar is kept as text.
fn scalar_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
