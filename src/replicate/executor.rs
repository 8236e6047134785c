//! Bounded-retry order placement.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::api::TradingApi;
use crate::models::OrderRequest;

/// Retries a single placement on transient connectivity failures.
///
/// An iterative loop with an explicit attempt counter; the same client order
/// id is sent on every attempt so the exchange can dedupe if an earlier
/// attempt actually landed. Failures are logged and swallowed: one follower's
/// dead connection must not stop replication to the others.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    max_retries: u32,
    retry_delay: Duration,
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_millis(50),
        }
    }
}

impl RetryExecutor {
    #[cfg(test)]
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            max_retries,
            retry_delay,
        }
    }

    /// Place an order on a follower account. Returns whether it succeeded.
    pub async fn place(&self, api: &dyn TradingApi, follower: &str, order: &OrderRequest) -> bool {
        let mut attempt: u32 = 0;
        loop {
            match api.place_order(order).await {
                Ok(placed) => {
                    info!(
                        follower = follower,
                        market = %order.market,
                        side = order.side.as_str(),
                        size = %order.size,
                        price = %order.price_label(),
                        order_id = placed.id,
                        "order placed"
                    );
                    return true;
                }
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    debug!(
                        follower = follower,
                        attempt = attempt,
                        error = %e,
                        "transient placement failure, retrying"
                    );
                    sleep(self.retry_delay).await;
                }
                Err(e) => {
                    error!(
                        follower = follower,
                        market = %order.market,
                        side = order.side.as_str(),
                        size = %order.size,
                        price = %order.price_label(),
                        error = %e,
                        "order could not be placed"
                    );
                    return false;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OrderSide, OrderType};
    use crate::replicate::test_support::MockExchange;
    use rust_decimal_macros::dec;
    use std::sync::atomic::Ordering;

    fn request() -> OrderRequest {
        OrderRequest {
            market: "BTC-PERP".to_string(),
            side: OrderSide::Buy,
            price: Some(dec!(100)),
            order_type: OrderType::Limit,
            size: dec!(1),
            reduce_only: false,
            ioc: false,
            post_only: false,
            client_id: Some("c1".to_string()),
        }
    }

    fn fast_executor() -> RetryExecutor {
        RetryExecutor::new(3, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let api = MockExchange::failing_transiently(2);

        let placed = fast_executor().place(&api, "bob", &request()).await;

        assert!(placed);
        assert_eq!(api.place_attempts.load(Ordering::SeqCst), 3);
        // Exactly one order landed, carrying the original client id.
        let orders = api.placed_orders();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].client_id.as_deref(), Some("c1"));
    }

    #[tokio::test]
    async fn gives_up_after_exhausting_retries() {
        let api = MockExchange::failing_transiently(10);

        let placed = fast_executor().place(&api, "bob", &request()).await;

        assert!(!placed);
        // One initial attempt plus three retries.
        assert_eq!(api.place_attempts.load(Ordering::SeqCst), 4);
        assert!(api.placed_orders().is_empty());
    }

    #[tokio::test]
    async fn rejections_are_not_retried() {
        let api = MockExchange::rejecting();

        let placed = fast_executor().place(&api, "bob", &request()).await;

        assert!(!placed);
        assert_eq!(api.place_attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn default_policy_is_three_retries_at_fifty_millis() {
        let executor = RetryExecutor::default();
        assert_eq!(executor.max_retries, 3);
        assert_eq!(executor.retry_delay, Duration::from_millis(50));
    }
}
