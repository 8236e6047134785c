//! Latest-delivered client order id per (leader, follower) pair.
//!
//! A liveness heuristic, not a durable idempotency store: the ledger holds
//! exactly one id per pair, lives only for the process lifetime, and is
//! re-derived from exchange state by the reconciliation sweep on restart.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::models::{OrderStatus, OrderType};

#[derive(Debug, Default)]
pub struct DedupLedger {
    delivered: RwLock<HashMap<(String, String), String>>,
}

impl DedupLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an event should be replicated to this follower.
    ///
    /// Replicate when the order is new, when it is a market order (market
    /// fills are always re-checked), or when the ledger holds nothing / a
    /// different id for the pair.
    pub async fn should_replicate(
        &self,
        leader: &str,
        follower: &str,
        client_id: &str,
        status: OrderStatus,
        order_type: OrderType,
    ) -> bool {
        if status == OrderStatus::New || order_type == OrderType::Market {
            return true;
        }
        let delivered = self.delivered.read().await;
        delivered
            .get(&(leader.to_string(), follower.to_string()))
            .map(|last| last != client_id)
            .unwrap_or(true)
    }

    /// Record a successful replication, replacing the pair's previous entry.
    pub async fn record_delivered(&self, leader: &str, follower: &str, client_id: &str) {
        let mut delivered = self.delivered.write().await;
        delivered.insert(
            (leader.to_string(), follower.to_string()),
            client_id.to_string(),
        );
    }
}
