//! Startup reconciliation: replicate leader orders placed before the stream
//! connection existed.
//!
//! Runs once per leader after its subscription is established, and again
//! after a reconnect. Orders the leader no longer has open are left alone on
//! followers; there is no deletion pass.

use std::collections::HashMap;

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::api::{ApiError, TradingApi};
use crate::models::{OrderEvent, OrderRequest};
use crate::replicate::{scale_size, Replicator};

/// Outcome counters, for the startup log line.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub leader_open_orders: usize,
    pub replicated: usize,
    pub already_mirrored: usize,
}

impl Replicator {
    /// Diff the leader's open orders against each follower's and replicate
    /// anything missing through the usual sizing/retry path.
    pub async fn reconcile(
        &self,
        leader: &str,
        leader_api: &dyn TradingApi,
    ) -> Result<ReconcileSummary, ApiError> {
        let leader_orders = leader_api.get_open_orders().await?;

        let leader_index: HashMap<String, OrderEvent> = leader_orders
            .into_iter()
            .map(|order| {
                let order = order.normalized();
                (order.client_order_id(), order)
            })
            .collect();

        let mut summary = ReconcileSummary {
            leader_open_orders: leader_index.len(),
            ..Default::default()
        };

        for relation in self.graph.followers_of(leader) {
            let Some(handle) = self.followers.get(&relation.follower) else {
                continue;
            };

            let follower_orders = match handle.api.get_open_orders().await {
                Ok(orders) => orders,
                Err(e) => {
                    warn!(
                        leader = leader,
                        follower = %relation.follower,
                        error = %e,
                        "could not fetch follower open orders, skipping reconciliation"
                    );
                    continue;
                }
            };
            let mirrored: std::collections::HashSet<String> = follower_orders
                .into_iter()
                .map(|order| order.normalized().client_order_id())
                .collect();

            for (client_id, order) in &leader_index {
                if mirrored.contains(client_id) {
                    summary.already_mirrored += 1;
                    continue;
                }

                let scaled = scale_size(order.size, relation.scale_percent);
                if scaled <= Decimal::ZERO {
                    debug!(
                        leader = leader,
                        follower = %relation.follower,
                        client_id = %client_id,
                        "scaled size is zero, not reconciling"
                    );
                    continue;
                }

                info!(
                    leader = leader,
                    follower = %relation.follower,
                    market = %order.market,
                    client_id = %client_id,
                    size = %scaled,
                    "reconciling missed order"
                );

                let request = OrderRequest::mirroring(order, scaled);
                let _permit = match handle.permits.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => continue,
                };
                if self
                    .executor
                    .place(handle.api.as_ref(), &relation.follower, &request)
                    .await
                {
                    self.ledger
                        .record_delivered(leader, &relation.follower, client_id)
                        .await;
                    summary.replicated += 1;
                }
            }
        }

        Ok(summary)
    }
}
