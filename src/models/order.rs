//! Order model shared by the stream, the REST API, and the replication engine.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Direction of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        }
    }
}

/// Execution type of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Limit,
    Market,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Limit => "limit",
            OrderType::Market => "market",
        }
    }
}

/// Lifecycle status reported by the exchange.
///
/// Statuses other than the three we act on are preserved as `Unknown` so a
/// new exchange-side status never breaks deserialization of the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    New,
    Open,
    Closed,
    #[serde(other)]
    Unknown,
}

/// An order record as delivered by the leader's stream or REST snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderEvent {
    /// Exchange-assigned order id.
    pub id: u64,

    /// Caller-supplied client order id; absent when the leader placed the
    /// order without one.
    #[serde(default)]
    pub client_id: Option<String>,

    pub market: String,

    pub side: OrderSide,

    /// Absent for market orders.
    #[serde(default)]
    pub price: Option<Decimal>,

    #[serde(rename = "type")]
    pub order_type: OrderType,

    pub size: Decimal,

    pub status: OrderStatus,

    #[serde(default)]
    pub reduce_only: bool,

    #[serde(default)]
    pub ioc: bool,

    #[serde(default)]
    pub post_only: bool,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl OrderEvent {
    /// Substitute the exchange order id when no client id is present.
    ///
    /// Called once at ingestion; downstream code relies on every event
    /// carrying a stable identifier.
    pub fn normalized(mut self) -> Self {
        if self.client_id.is_none() {
            self.client_id = Some(self.id.to_string());
        }
        self
    }

    /// The stable identifier used to correlate this order across placement,
    /// update, and cancel. Falls back to the exchange id for events that
    /// have not been through [`OrderEvent::normalized`].
    pub fn client_order_id(&self) -> String {
        self.client_id
            .clone()
            .unwrap_or_else(|| self.id.to_string())
    }
}

/// Parameters for placing an order on a follower account.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub market: String,
    pub side: OrderSide,
    pub price: Option<Decimal>,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub size: Decimal,
    pub reduce_only: bool,
    pub ioc: bool,
    pub post_only: bool,
    pub client_id: Option<String>,
}

impl OrderRequest {
    /// Build a follower order mirroring a leader event at the given scaled
    /// size. The leader's client order id is carried over unchanged so the
    /// exchange can correlate and dedupe.
    pub fn mirroring(event: &OrderEvent, size: Decimal) -> Self {
        Self {
            market: event.market.clone(),
            side: event.side,
            price: event.price,
            order_type: event.order_type,
            size,
            reduce_only: event.reduce_only,
            ioc: event.ioc,
            post_only: event.post_only,
            client_id: Some(event.client_order_id()),
        }
    }

    /// Price rendered for log lines; market orders have no price.
    pub fn price_label(&self) -> String {
        match self.price {
            Some(p) => p.to_string(),
            None => "Market".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn event(client_id: Option<&str>) -> OrderEvent {
        OrderEvent {
            id: 9001,
            client_id: client_id.map(str::to_string),
            market: "BTC-PERP".to_string(),
            side: OrderSide::Buy,
            price: Some(dec!(100)),
            order_type: OrderType::Limit,
            size: dec!(2),
            status: OrderStatus::New,
            reduce_only: false,
            ioc: false,
            post_only: false,
            created_at: None,
        }
    }

    #[test]
    fn normalize_substitutes_exchange_id() {
        let e = event(None).normalized();
        assert_eq!(e.client_id.as_deref(), Some("9001"));
        assert_eq!(e.client_order_id(), "9001");
    }

    #[test]
    fn normalize_keeps_existing_client_id() {
        let e = event(Some("c1")).normalized();
        assert_eq!(e.client_order_id(), "c1");
    }

    #[test]
    fn mirroring_copies_flags_and_client_id() {
        let mut e = event(Some("c1"));
        e.reduce_only = true;
        e.ioc = true;

        let req = OrderRequest::mirroring(&e, dec!(1));
        assert_eq!(req.market, "BTC-PERP");
        assert_eq!(req.side, OrderSide::Buy);
        assert_eq!(req.size, dec!(1));
        assert!(req.reduce_only);
        assert!(req.ioc);
        assert!(!req.post_only);
        assert_eq!(req.client_id.as_deref(), Some("c1"));
    }

    #[test]
    fn price_label_for_market_orders() {
        let mut e = event(Some("c1"));
        e.price = None;
        e.order_type = OrderType::Market;
        let req = OrderRequest::mirroring(&e, dec!(1));
        assert_eq!(req.price_label(), "Market");

        let limit = OrderRequest::mirroring(&event(Some("c2")), dec!(1));
        assert_eq!(limit.price_label(), "100");
    }

    #[test]
    fn deserializes_stream_payload() {
        let json = r#"{
            "id": 123456,
            "clientId": "abc-1",
            "market": "ETH-PERP",
            "side": "sell",
            "price": 2500.5,
            "type": "limit",
            "size": 0.25,
            "status": "new",
            "reduceOnly": false,
            "ioc": false,
            "postOnly": true
        }"#;

        let e: OrderEvent = serde_json::from_str(json).unwrap();
        assert_eq!(e.id, 123456);
        assert_eq!(e.client_id.as_deref(), Some("abc-1"));
        assert_eq!(e.side, OrderSide::Sell);
        assert_eq!(e.order_type, OrderType::Limit);
        assert_eq!(e.status, OrderStatus::New);
        assert!(e.post_only);
    }

    #[test]
    fn unknown_status_does_not_fail_deserialization() {
        let json = r#"{
            "id": 1,
            "market": "BTC-PERP",
            "side": "buy",
            "type": "market",
            "size": 1,
            "status": "triggered"
        }"#;

        let e: OrderEvent = serde_json::from_str(json).unwrap();
        assert_eq!(e.status, OrderStatus::Unknown);
        assert!(e.price.is_none());
        assert!(e.client_id.is_none());
    }
}
