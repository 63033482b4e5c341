//! Webhook response bodies.

use hmt_core::{FillSource, LinkedAccount, Price, WindowCheck};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome for one linked account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountResult {
    pub account_id: Uuid,
    pub account_label: String,
    pub order_placed: bool,
    pub bracket_created: bool,
    pub order_id: Option<String>,
    pub quantity: Option<u32>,
    pub fill_price: Option<Price>,
    pub fill_source: Option<FillSource>,
    pub stop_loss: Option<Price>,
    pub target: Option<Price>,
    pub bracket_id: Option<Uuid>,
    pub error: Option<String>,
}

impl AccountResult {
    pub fn new(account: &LinkedAccount) -> Self {
        Self {
            account_id: account.id,
            account_label: account.display_name(),
            order_placed: false,
            bracket_created: false,
            order_id: None,
            quantity: None,
            fill_price: None,
            fill_source: None,
            stop_loss: None,
            target: None,
            bracket_id: None,
            error: None,
        }
    }

    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Body of every webhook response.
///
/// `success` is always present; the other fields depend on where the
/// pipeline stopped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub success: bool,
    /// Set when a platform rule (window, duplicate) refused the signal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_by_platform: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_window: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tradingsymbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
    /// `"{success_count}/{total}"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<AccountResult>>,
}

impl WebhookResponse {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn blocked(message: impl Into<String>) -> Self {
        Self {
            success: false,
            blocked_by_platform: Some(true),
            message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn outside_window(check: &WindowCheck) -> Self {
        Self {
            current_time: Some(check.current_time.clone()),
            allowed_window: Some(check.allowed_window.clone()),
            ..Self::blocked(format!(
                "Signal received outside trading window ({} {})",
                check.allowed_window, check.current_time
            ))
        }
    }

    /// Aggregate per-account results.
    pub fn executed(tradingsymbol: &str, results: Vec<AccountResult>) -> Self {
        let total = results.len();
        let success_count = results.iter().filter(|r| r.bracket_created).count();
        Self {
            success: success_count > 0,
            message: Some(format!(
                "Executed {tradingsymbol} on {success_count}/{total} accounts"
            )),
            tradingsymbol: Some(tradingsymbol.to_string()),
            success_count: Some(success_count),
            total: Some(total),
            summary: Some(format!("{success_count}/{total}")),
            results: Some(results),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(created: bool) -> AccountResult {
        AccountResult {
            account_id: Uuid::new_v4(),
            account_label: "a".to_string(),
            order_placed: created,
            bracket_created: created,
            order_id: None,
            quantity: None,
            fill_price: None,
            fill_source: None,
            stop_loss: None,
            target: None,
            bracket_id: None,
            error: None,
        }
    }

    #[test]
    fn test_executed_summary() {
        let results = vec![result(true), result(false), result(false)];
        let response = WebhookResponse::executed("NIFTY26MARFUT", results);
        assert!(response.success);
        assert_eq!(response.success_count, Some(1));
        assert_eq!(response.total, Some(3));
        assert_eq!(response.summary.as_deref(), Some("1/3"));

        let none = WebhookResponse::executed("NIFTY26MARFUT", vec![result(false)]);
        assert!(!none.success);
    }

    #[test]
    fn test_blocked_body_shape() {
        let body = serde_json::to_value(WebhookResponse::blocked("duplicate signal")).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "success": false,
                "blocked_by_platform": true,
                "message": "duplicate signal"
            })
        );
    }
}
