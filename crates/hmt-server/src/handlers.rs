//! Route handlers.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use hmt_broker::LtpQuote;
use hmt_executor::INTERNAL_ERROR_MESSAGE;
use hmt_telemetry::Metrics;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, warn};
use uuid::Uuid;

use crate::auth::{authorized, unauthorized_response};
use crate::server::AppState;

/// `POST /webhook` and `POST /api/webhook`.
pub(crate) async fn webhook(State(state): State<AppState>, body: Bytes) -> Response {
    let response = state.gateway.handle(&body).await;
    let status =
        StatusCode::from_u16(response.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(response.body)).into_response()
}

/// `GET /health`.
pub(crate) async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `GET /metrics` in the Prometheus text format.
pub(crate) async fn metrics() -> Response {
    match Metrics::gather_text() {
        Ok(text) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub(crate) const LTP_DISABLED_MESSAGE: &str = "ltp disabled: server credentials not configured";

#[derive(Debug, Default, Deserialize)]
pub(crate) struct LtpParams {
    account_id: Option<String>,
    /// Comma-separated `EXCHANGE:SYMBOL` keys.
    instruments: Option<String>,
}

/// `GET /api/ltp?account_id=<uuid>&instruments=NSE:INFY,NFO:NIFTY26MARFUT`.
///
/// Spends a linked account's broker session, so it is only served when
/// basic auth credentials are configured.
pub(crate) async fn ltp(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<LtpParams>,
) -> Response {
    if !state.config.auth_enabled() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "success": false, "error": LTP_DISABLED_MESSAGE })),
        )
            .into_response();
    }
    if !authorized(&headers, &state.config) {
        return unauthorized_response();
    }

    match fetch_ltp(&state, params).await {
        Ok(data) => Json(json!({ "success": true, "data": data })).into_response(),
        Err((status, message)) => {
            (status, Json(json!({ "success": false, "error": message }))).into_response()
        }
    }
}

type LtpFailure = (StatusCode, String);

async fn fetch_ltp(
    state: &AppState,
    params: LtpParams,
) -> Result<HashMap<String, LtpQuote>, LtpFailure> {
    let bad_request = |msg: &str| (StatusCode::BAD_REQUEST, msg.to_string());

    let account_id = params
        .account_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| bad_request("missing account_id"))?;
    let account_id = Uuid::parse_str(account_id).map_err(|_| bad_request("invalid account_id"))?;

    let instruments: Vec<String> = params
        .instruments
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect();
    if instruments.is_empty() {
        return Err(bad_request("missing instruments"));
    }

    let account = match state.gateway.store().find_account(account_id).await {
        Ok(Some(account)) if account.is_active => account,
        Ok(_) => return Err(bad_request("account not found or inactive")),
        Err(e) => {
            error!(%account_id, error = %e, "Account lookup failed");
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                INTERNAL_ERROR_MESSAGE.to_string(),
            ));
        }
    };
    if account.access_token.as_deref().map_or(true, str::is_empty) {
        return Err(bad_request("account has no access token"));
    }

    let broker = state
        .gateway
        .brokers()
        .connect(&account)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    broker.ltp(instruments).await.map_err(|e| {
        warn!(%account_id, error = %e, "LTP request failed");
        (StatusCode::BAD_GATEWAY, e.to_string())
    })
}
