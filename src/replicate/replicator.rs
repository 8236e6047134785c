//! Event classification and fan-out to followers.
//!
//! One replicator instance is shared by every leader task. The follow graph
//! is read-only; the dedup ledger serializes its own access, so concurrent
//! callbacks from different leaders cannot corrupt it.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::Semaphore;
use tracing::{debug, info, trace, warn};

use crate::api::{Envelope, TradingApi};
use crate::models::{OrderEvent, OrderRequest, OrderStatus};
use crate::replicate::{scale_size, DedupLedger, FollowGraph, RetryExecutor};

/// Stream channel carrying order updates; everything else is ignored.
const ORDERS_CHANNEL: &str = "orders";

/// Cap on concurrent requests against a single follower account.
const FOLLOWER_MAX_INFLIGHT: usize = 4;

pub(super) struct FollowerHandle {
    pub(super) api: Arc<dyn TradingApi>,
    pub(super) permits: Arc<Semaphore>,
}

pub struct Replicator {
    pub(super) graph: Arc<FollowGraph>,
    pub(super) ledger: DedupLedger,
    pub(super) executor: RetryExecutor,
    pub(super) followers: HashMap<String, FollowerHandle>,
}

impl Replicator {
    pub fn new(graph: Arc<FollowGraph>, followers: HashMap<String, Arc<dyn TradingApi>>) -> Self {
        Self::with_executor(graph, followers, RetryExecutor::default())
    }

    pub(super) fn with_executor(
        graph: Arc<FollowGraph>,
        followers: HashMap<String, Arc<dyn TradingApi>>,
        executor: RetryExecutor,
    ) -> Self {
        let followers = followers
            .into_iter()
            .map(|(name, api)| {
                let handle = FollowerHandle {
                    api,
                    permits: Arc::new(Semaphore::new(FOLLOWER_MAX_INFLIGHT)),
                };
                (name, handle)
            })
            .collect();

        Self {
            graph,
            ledger: DedupLedger::new(),
            executor,
            followers,
        }
    }

    /// Whether a follower account is wired up with an API client.
    pub fn has_follower(&self, name: &str) -> bool {
        self.followers.contains_key(name)
    }

    /// Process one decoded stream frame from a leader's connection.
    pub async fn handle_envelope(&self, leader: &str, envelope: Envelope) {
        if envelope.channel.as_deref() != Some(ORDERS_CHANNEL) {
            trace!(leader = leader, channel = ?envelope.channel, "ignoring non-orders frame");
            return;
        }
        let Some(data) = envelope.data else {
            trace!(leader = leader, "orders frame without data");
            return;
        };

        debug!(leader = leader, data = %data, "incoming order event");

        match serde_json::from_value::<OrderEvent>(data) {
            Ok(event) => self.handle_event(leader, event).await,
            Err(e) => warn!(leader = leader, error = %e, "ignoring malformed order event"),
        }
    }

    /// Classify and replicate one order event.
    ///
    /// `closed` always maps to cancel. Everything else goes through the
    /// per-follower dedup check, which admits new orders, market orders, and
    /// ids the pair has not delivered yet; events failing that check are
    /// ignored.
    pub async fn handle_event(&self, leader: &str, event: OrderEvent) {
        let event = event.normalized();

        if self.graph.followers_of(leader).is_empty() {
            trace!(leader = leader, "leader has no followers");
            return;
        }

        match event.status {
            OrderStatus::Closed => self.replicate_cancel(leader, &event).await,
            _ => self.replicate_open(leader, &event).await,
        }
    }

    async fn replicate_open(&self, leader: &str, event: &OrderEvent) {
        let client_id = event.client_order_id();

        for relation in self.graph.followers_of(leader) {
            let Some(handle) = self.followers.get(&relation.follower) else {
                trace!(follower = %relation.follower, "follower has no api client");
                continue;
            };

            let replicate = self
                .ledger
                .should_replicate(
                    leader,
                    &relation.follower,
                    &client_id,
                    event.status,
                    event.order_type,
                )
                .await;
            if !replicate {
                debug!(
                    leader = leader,
                    follower = %relation.follower,
                    client_id = %client_id,
                    "already delivered, skipping duplicate"
                );
                continue;
            }

            let scaled = scale_size(event.size, relation.scale_percent);
            if scaled <= Decimal::ZERO {
                warn!(
                    leader = leader,
                    follower = %relation.follower,
                    market = %event.market,
                    size = %event.size,
                    scale_percent = %relation.scale_percent,
                    "scaled size is zero, skipping"
                );
                continue;
            }

            info!(
                leader = leader,
                follower = %relation.follower,
                market = %event.market,
                order_type = event.order_type.as_str(),
                size = %scaled,
                "replicating order"
            );

            let order = OrderRequest::mirroring(event, scaled);
            let _permit = match handle.permits.acquire().await {
                Ok(permit) => permit,
                Err(_) => continue, // semaphore closed during shutdown
            };
            if self
                .executor
                .place(handle.api.as_ref(), &relation.follower, &order)
                .await
            {
                self.ledger
                    .record_delivered(leader, &relation.follower, &client_id)
                    .await;
            }
        }
    }

    /// Cancels never consult or update the ledger: a cancel for an order a
    /// follower never held fails benignly at the exchange.
    async fn replicate_cancel(&self, leader: &str, event: &OrderEvent) {
        let client_id = event.client_order_id();

        for relation in self.graph.followers_of(leader) {
            let Some(handle) = self.followers.get(&relation.follower) else {
                continue;
            };
            let _permit = match handle.permits.acquire().await {
                Ok(permit) => permit,
                Err(_) => continue,
            };
            match handle.api.cancel_order_by_client_id(&client_id).await {
                Ok(()) => info!(
                    leader = leader,
                    follower = %relation.follower,
                    client_id = %client_id,
                    "cancelled mirrored order"
                ),
                Err(e) => debug!(
                    leader = leader,
                    follower = %relation.follower,
                    client_id = %client_id,
                    error = %e,
                    "cancel failed, order may never have been mirrored"
                ),
            }
        }
    }
}
