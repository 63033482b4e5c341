//! Kite Connect v3 REST adapter.
//!
//! Implements [`BrokerClient`] over the broker's HTTP API:
//! - `GET  /portfolio/positions`
//! - `POST /orders/regular`
//! - `GET  /orders/{order_id}` (order history, last entry is current)
//! - `GET  /quote/ltp`
//!
//! Every response is wrapped in a `{status, data | message, error_type}`
//! envelope; non-success envelopes become [`BrokerError::Api`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use hmt_core::{LinkedAccount, OrderStatus, Price};
use reqwest::{Client, RequestBuilder};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::client::{BoxFuture, BrokerClient, BrokerFactory};
use crate::error::{BrokerError, BrokerResult};
use crate::types::{LtpQuote, MarketOrderRequest, NetPosition, OrderReport};

/// Default API root.
pub const DEFAULT_API_BASE_URL: &str = "https://api.kite.trade";

/// Default timeout for API requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// API version header value.
const KITE_VERSION: &str = "3";

/// Response envelope shared by every endpoint.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: String,
    data: Option<T>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PositionsData {
    #[serde(default)]
    net: Vec<NetPosition>,
}

#[derive(Debug, Deserialize)]
struct OrderIdData {
    order_id: String,
}

/// One entry of an order's state history.
#[derive(Debug, Deserialize)]
struct RawOrderState {
    order_id: String,
    status: String,
    #[serde(default)]
    average_price: Option<Decimal>,
    #[serde(default)]
    filled_quantity: Option<u32>,
    #[serde(default)]
    status_message: Option<String>,
}

impl From<RawOrderState> for OrderReport {
    fn from(raw: RawOrderState) -> Self {
        Self {
            order_id: raw.order_id,
            status: OrderStatus::from_broker(&raw.status),
            average_price: raw.average_price.map(Price::new),
            filled_quantity: raw.filled_quantity.unwrap_or(0),
            status_message: raw.status_message,
        }
    }
}

/// REST client bound to one account's credentials.
pub struct KiteClient {
    http: Client,
    base_url: String,
    auth_header: String,
}

impl KiteClient {
    /// Create a client sharing an existing HTTP connection pool.
    pub fn new(
        http: Client,
        base_url: impl Into<String>,
        api_key: &str,
        access_token: &str,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth_header: format!("token {api_key}:{access_token}"),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("X-Kite-Version", KITE_VERSION)
            .header("Authorization", &self.auth_header)
    }

    /// Send a request and unwrap the response envelope.
    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> BrokerResult<Option<T>> {
        let response = self
            .authed(builder)
            .send()
            .await
            .map_err(|e| BrokerError::Http(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BrokerError::Http(format!("Failed to read response: {e}")))?;

        let envelope: Envelope<T> = match serde_json::from_str(&body) {
            Ok(env) => env,
            Err(e) if status.is_success() => {
                return Err(BrokerError::Parse(format!("{e}")));
            }
            Err(_) => return Err(BrokerError::Http(format!("HTTP {status}: {body}"))),
        };

        if envelope.status != "success" || !status.is_success() {
            warn!(
                http_status = %status,
                error_type = ?envelope.error_type,
                "Broker API returned an error"
            );
            return Err(BrokerError::Api {
                error_type: envelope
                    .error_type
                    .unwrap_or_else(|| "UnknownException".to_string()),
                message: envelope
                    .message
                    .unwrap_or_else(|| format!("HTTP {status}")),
            });
        }

        Ok(envelope.data)
    }
}

impl BrokerClient for KiteClient {
    fn positions(&self) -> BoxFuture<'_, BrokerResult<Vec<NetPosition>>> {
        Box::pin(async move {
            let data: Option<PositionsData> =
                self.send(self.http.get(self.url("/portfolio/positions"))).await?;
            Ok(data.map(|d| d.net).unwrap_or_default())
        })
    }

    fn place_market_order(&self, order: MarketOrderRequest) -> BoxFuture<'_, BrokerResult<String>> {
        Box::pin(async move {
            let quantity = order.quantity.to_string();
            let mut form: Vec<(&str, &str)> = vec![
                ("tradingsymbol", order.tradingsymbol.as_str()),
                ("exchange", order.exchange.as_str()),
                ("transaction_type", order.direction.as_str()),
                ("order_type", "MARKET"),
                ("quantity", quantity.as_str()),
                ("product", order.product.as_str()),
                ("validity", "DAY"),
            ];
            if let Some(tag) = order.tag.as_deref() {
                form.push(("tag", tag));
            }

            debug!(
                tradingsymbol = %order.tradingsymbol,
                direction = %order.direction,
                quantity = order.quantity,
                "Placing market order"
            );

            let data: Option<OrderIdData> = self
                .send(self.http.post(self.url("/orders/regular")).form(&form))
                .await?;
            data.map(|d| d.order_id)
                .ok_or_else(|| BrokerError::Parse("order response missing order_id".to_string()))
        })
    }

    fn order_status(&self, order_id: String) -> BoxFuture<'_, BrokerResult<Option<OrderReport>>> {
        Box::pin(async move {
            let path = format!("/orders/{order_id}");
            let history: Option<Vec<RawOrderState>> =
                self.send(self.http.get(self.url(&path))).await?;
            Ok(history
                .and_then(|mut states| states.pop())
                .map(OrderReport::from))
        })
    }

    fn ltp(
        &self,
        instruments: Vec<String>,
    ) -> BoxFuture<'_, BrokerResult<HashMap<String, LtpQuote>>> {
        Box::pin(async move {
            let query: Vec<(&str, &str)> = instruments.iter().map(|i| ("i", i.as_str())).collect();
            let data: Option<HashMap<String, LtpQuote>> = self
                .send(self.http.get(self.url("/quote/ltp")).query(&query))
                .await?;
            Ok(data.unwrap_or_default())
        })
    }
}

/// Builds [`KiteClient`]s sharing one HTTP connection pool.
pub struct KiteFactory {
    http: Client,
    base_url: String,
}

impl KiteFactory {
    /// Create a factory.
    ///
    /// # Arguments
    /// * `base_url` - API root (e.g., "https://api.kite.trade")
    /// * `timeout` - Per-request timeout; `None` uses 10 seconds
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> BrokerResult<Self> {
        let http = Client::builder()
            .timeout(timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()
            .map_err(|e| BrokerError::Http(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }
}

impl BrokerFactory for KiteFactory {
    fn connect(&self, account: &LinkedAccount) -> BrokerResult<Arc<dyn BrokerClient>> {
        let token = account
            .access_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                BrokerError::MissingCredentials(format!(
                    "account {} has no access token",
                    account.display_name()
                ))
            })?;

        Ok(Arc::new(KiteClient::new(
            self.http.clone(),
            self.base_url.clone(),
            &account.api_key,
            token,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hmt_core::{Direction, ProductType};
    use rust_decimal_macros::dec;
    use uuid::Uuid;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> KiteClient {
        KiteClient::new(Client::new(), server.uri(), "api_key", "token123")
    }

    #[tokio::test]
    async fn test_positions_parses_net() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/portfolio/positions"))
            .and(header("Authorization", "token api_key:token123"))
            .and(header("X-Kite-Version", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "success",
                "data": {
                    "net": [{
                        "tradingsymbol": "NIFTY26MARFUT",
                        "exchange": "NFO",
                        "instrument_token": 1,
                        "product": "NRML",
                        "quantity": -50,
                        "average_price": 24400.5
                    }],
                    "day": []
                }
            })))
            .mount(&server)
            .await;

        let positions = client(&server).positions().await.unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].quantity, -50);
        assert_eq!(positions[0].average_price, dec!(24400.5));
    }

    #[tokio::test]
    async fn test_place_market_order_sends_form() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/orders/regular"))
            .and(body_string_contains("order_type=MARKET"))
            .and(body_string_contains("transaction_type=BUY"))
            .and(body_string_contains("quantity=50"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "success",
                "data": { "order_id": "250310000000001" }
            })))
            .mount(&server)
            .await;

        let order_id = client(&server)
            .place_market_order(MarketOrderRequest {
                tradingsymbol: "NIFTY26MARFUT".to_string(),
                exchange: "NFO".to_string(),
                direction: Direction::Buy,
                quantity: 50,
                product: ProductType::Nrml,
                tag: Some("hmt".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(order_id, "250310000000001");
    }

    #[tokio::test]
    async fn test_order_status_uses_last_history_entry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/orders/42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "success",
                "data": [
                    { "order_id": "42", "status": "OPEN PENDING", "average_price": 0 },
                    {
                        "order_id": "42",
                        "status": "COMPLETE",
                        "average_price": 24510.0,
                        "filled_quantity": 50
                    }
                ]
            })))
            .mount(&server)
            .await;

        let report = client(&server).order_status("42".to_string()).await.unwrap().unwrap();
        assert_eq!(report.status, OrderStatus::Complete);
        assert_eq!(report.filled_price(), Some(Price::new(dec!(24510))));
        assert_eq!(report.filled_quantity, 50);
    }

    #[tokio::test]
    async fn test_api_error_is_mapped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/portfolio/positions"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "status": "error",
                "message": "Incorrect `api_key` or `access_token`.",
                "error_type": "TokenException"
            })))
            .mount(&server)
            .await;

        let err = client(&server).positions().await.unwrap_err();
        match err {
            BrokerError::Api { error_type, .. } => assert_eq!(error_type, "TokenException"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_ltp_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/quote/ltp"))
            .and(query_param("i", "NSE:INFY"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "success",
                "data": { "NSE:INFY": { "instrument_token": 408065, "last_price": 1074.35 } }
            })))
            .mount(&server)
            .await;

        let quotes = client(&server).ltp(vec!["NSE:INFY".to_string()]).await.unwrap();
        assert_eq!(quotes["NSE:INFY"].last_price, dec!(1074.35));
        assert_eq!(quotes["NSE:INFY"].instrument_token, 408065);
    }

    #[test]
    fn test_factory_requires_access_token() {
        let factory = KiteFactory::new(DEFAULT_API_BASE_URL, None).unwrap();
        let mut account = LinkedAccount {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            broker_name: "zerodha".to_string(),
            label: "main".to_string(),
            api_key: "k".to_string(),
            access_token: None,
            is_active: true,
        };
        assert!(matches!(
            factory.connect(&account),
            Err(BrokerError::MissingCredentials(_))
        ));
        account.access_token = Some("t".to_string());
        assert!(factory.connect(&account).is_ok());
    }
}
