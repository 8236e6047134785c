//! Scriptable in-memory exchange used by the engine tests.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::api::{ApiError, TradingApi};
use crate::models::{OrderEvent, OrderRequest, OrderSide, OrderStatus, OrderType};

/// Build an order event with sensible defaults; tests tweak fields inline.
pub(crate) fn order_event(id: u64, client_id: Option<&str>) -> OrderEvent {
    OrderEvent {
        id,
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

/// Records every call; failure behavior is scripted per instance.
#[derive(Default)]
pub(crate) struct MockExchange {
    pub placed: Mutex<Vec<OrderRequest>>,
    pub cancelled: Mutex<Vec<String>>,
    pub open_orders: Mutex<Vec<OrderEvent>>,

    /// Fail this many `place_order` calls with a transport error first.
    pub transient_failures: AtomicU32,
    /// Reject every `place_order` with a non-transient exchange error.
    pub reject_placements: AtomicBool,
    /// Fail every cancel (simulates "order never existed on this account").
    pub fail_cancels: AtomicBool,

    /// Total `place_order` invocations, including failed attempts.
    pub place_attempts: AtomicU32,
}

impl MockExchange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_transiently(failures: u32) -> Self {
        let mock = Self::default();
        mock.transient_failures.store(failures, Ordering::SeqCst);
        mock
    }

    pub fn rejecting() -> Self {
        let mock = Self::default();
        mock.reject_placements.store(true, Ordering::SeqCst);
        mock
    }

    pub fn with_open_orders(orders: Vec<OrderEvent>) -> Self {
        let mock = Self::default();
        *mock.open_orders.lock().unwrap() = orders;
        mock
    }

    pub fn placed_orders(&self) -> Vec<OrderRequest> {
        self.placed.lock().unwrap().clone()
    }

    pub fn placed_sizes(&self) -> Vec<Decimal> {
        self.placed.lock().unwrap().iter().map(|o| o.size).collect()
    }

    pub fn cancelled_ids(&self) -> Vec<String> {
        self.cancelled.lock().unwrap().clone()
    }
}

#[async_trait]
impl TradingApi for MockExchange {
    async fn place_order(&self, order: &OrderRequest) -> Result<OrderEvent, ApiError> {
        self.place_attempts.fetch_add(1, Ordering::SeqCst);

        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ApiError::Transport("connection reset by peer".to_string()));
        }
        if self.reject_placements.load(Ordering::SeqCst) {
            return Err(ApiError::Rejected("Size too small".to_string()));
        }

        self.placed.lock().unwrap().push(order.clone());

        let mut echo = order_event(1, order.client_id.as_deref());
        echo.market = order.market.clone();
        echo.side = order.side;
        echo.price = order.price;
        echo.order_type = order.order_type;
        echo.size = order.size;
        Ok(echo)
    }

    async fn cancel_order_by_client_id(&self, client_id: &str) -> Result<(), ApiError> {
        if self.fail_cancels.load(Ordering::SeqCst) {
            return Err(ApiError::Rejected("Order not found".to_string()));
        }
        self.cancelled.lock().unwrap().push(client_id.to_string());
        Ok(())
    }

    async fn get_open_orders(&self) -> Result<Vec<OrderEvent>, ApiError> {
        Ok(self.open_orders.lock().unwrap().clone())
    }
}
