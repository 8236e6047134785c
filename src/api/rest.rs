//! Signed REST client for one exchange account.
//!
//! Exposes the three calls the replication engine needs: place an order,
//! cancel by client order id, and snapshot open orders. The engine works
//! against the [`TradingApi`] trait so tests can substitute a mock exchange.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::api::sign::sign_request;
use crate::models::{OrderEvent, OrderRequest};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Error from a trading API call.
///
/// The retry executor only retries [`ApiError::Transport`]; rejections and
/// malformed responses are dropped after a single attempt.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Connectivity-level failure: timeout, refused connection, dropped
    /// socket. Worth retrying.
    #[error("transport error: {0}")]
    Transport(String),

    /// The exchange refused the request (bad parameters, rejected order).
    #[error("exchange rejected request: {0}")]
    Rejected(String),

    /// The exchange answered with something we could not decode.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl ApiError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::Transport(_))
    }
}

/// The per-account trading surface the replication engine depends on.
#[async_trait]
pub trait TradingApi: Send + Sync {
    async fn place_order(&self, order: &OrderRequest) -> Result<OrderEvent, ApiError>;

    async fn cancel_order_by_client_id(&self, client_id: &str) -> Result<(), ApiError>;

    async fn get_open_orders(&self) -> Result<Vec<OrderEvent>, ApiError>;
}

/// Exchange response envelope: `{"success": bool, "result": ..., "error": ...}`.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    #[serde(default)]
    success: bool,
    result: Option<T>,
    #[serde(default)]
    error: Option<String>,
}

/// Signed HTTP client bound to one account's credentials.
pub struct RestClient {
    http: Client,
    base_url: String,
    api_key: String,
    api_secret: String,
    subaccount: Option<String>,
}

impl RestClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        api_secret: &str,
        subaccount: Option<&str>,
    ) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            api_secret: api_secret.to_string(),
            subaccount: subaccount.map(str::to_string),
        })
    }

    fn auth_headers(&self, method: &Method, path: &str, body: &str) -> Result<HeaderMap, ApiError> {
        let timestamp = Utc::now().timestamp_millis();
        let signature = sign_request(&self.api_secret, timestamp, method.as_str(), path, body);

        let mut headers = HeaderMap::new();
        let value = |v: &str| {
            HeaderValue::from_str(v).map_err(|e| ApiError::Malformed(format!("bad header: {e}")))
        };
        headers.insert(HeaderName::from_static("x-api-key"), value(&self.api_key)?);
        headers.insert(HeaderName::from_static("x-api-sign"), value(&signature)?);
        headers.insert(
            HeaderName::from_static("x-api-ts"),
            value(&timestamp.to_string())?,
        );
        if let Some(sub) = &self.subaccount {
            headers.insert(HeaderName::from_static("x-api-subaccount"), value(sub)?);
        }
        Ok(headers)
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<String>,
    ) -> Result<T, ApiError> {
        let body = body.unwrap_or_default();
        let headers = self.auth_headers(&method, path, &body)?;
        let url = format!("{}{}", self.base_url, path);

        debug!(method = %method, path = path, "api request");

        let mut req = self.http.request(method, &url).headers(headers);
        if !body.is_empty() {
            req = req
                .header(HeaderName::from_static("content-type"), "application/json")
                .body(body);
        }

        let resp = req.send().await.map_err(classify_reqwest_error)?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        if status.is_server_error() {
            return Err(ApiError::Transport(format!("{status}: {text}")));
        }

        let envelope: ApiResponse<T> = serde_json::from_str(&text)
            .map_err(|e| ApiError::Malformed(format!("{e} (status {status})")))?;

        if !status.is_success() || !envelope.success {
            let detail = envelope
                .error
                .unwrap_or_else(|| format!("http status {status}"));
            return Err(ApiError::Rejected(detail));
        }

        envelope
            .result
            .ok_or_else(|| ApiError::Malformed("missing result".to_string()))
    }
}

fn classify_reqwest_error(e: reqwest::Error) -> ApiError {
    if e.is_decode() {
        ApiError::Malformed(e.to_string())
    } else {
        ApiError::Transport(e.to_string())
    }
}

#[async_trait]
impl TradingApi for RestClient {
    async fn place_order(&self, order: &OrderRequest) -> Result<OrderEvent, ApiError> {
        let body =
            serde_json::to_string(order).map_err(|e| ApiError::Malformed(e.to_string()))?;
        self.request(Method::POST, "/api/orders", Some(body)).await
    }

    async fn cancel_order_by_client_id(&self, client_id: &str) -> Result<(), ApiError> {
        let path = format!("/api/orders/by_client_id/{client_id}");
        // The ack body is a human-readable string; only success matters.
        let _ack: String = self.request(Method::DELETE, &path, None).await?;
        Ok(())
    }

    async fn get_open_orders(&self) -> Result<Vec<OrderEvent>, ApiError> {
        self.request(Method::GET, "/api/orders", None).await
    }
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("base_url", &self.base_url)
            .field("subaccount", &self.subaccount)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OrderSide, OrderType};
    use rust_decimal_macros::dec;

    #[test]
    fn transport_errors_are_transient_rejections_are_not() {
        assert!(ApiError::Transport("timeout".into()).is_transient());
        assert!(!ApiError::Rejected("size too small".into()).is_transient());
        assert!(!ApiError::Malformed("bad json".into()).is_transient());
    }

    #[test]
    fn envelope_parses_success_and_error() {
        let ok: ApiResponse<Vec<u32>> =
            serde_json::from_str(r#"{"success": true, "result": [1, 2]}"#).unwrap();
        assert!(ok.success);
        assert_eq!(ok.result.unwrap(), vec![1, 2]);

        let err: ApiResponse<Vec<u32>> =
            serde_json::from_str(r#"{"success": false, "error": "Invalid parameter size"}"#)
                .unwrap();
        assert!(!err.success);
        assert_eq!(err.error.as_deref(), Some("Invalid parameter size"));
    }

    #[test]
    fn order_request_serializes_for_the_wire() {
        let req = OrderRequest {
            market: "BTC-PERP".to_string(),
            side: OrderSide::Buy,
            price: Some(dec!(100)),
            order_type: OrderType::Limit,
            size: dec!(1),
            reduce_only: false,
            ioc: false,
            post_only: false,
            client_id: Some("c1".to_string()),
        };

        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&req).unwrap()).unwrap();
        assert_eq!(json["market"], "BTC-PERP");
        assert_eq!(json["side"], "buy");
        assert_eq!(json["type"], "limit");
        assert_eq!(json["clientId"], "c1");
        assert_eq!(json["reduceOnly"], false);
    }

    #[test]
    fn debug_never_exposes_credentials() {
        let client = RestClient::new("https://x.test", "key", "very-secret", None).unwrap();
        let rendered = format!("{client:?}");
        assert!(!rendered.contains("very-secret"));
    }
}
