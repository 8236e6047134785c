//! The order-replication engine: follow graph, sizing, dedup, retries,
//! event fan-out, and startup reconciliation.

mod executor;
mod follow_graph;
mod ledger;
mod reconcile;
mod replicator;
mod sizer;

#[cfg(test)]
pub(crate) mod test_support;

pub use executor::RetryExecutor;
pub use follow_graph::{parse_scale_percent, FollowGraph, FollowRelation};
pub use ledger::DedupLedger;
pub use reconcile::ReconcileSummary;
pub use replicator::Replicator;
pub use sizer::scale_size;
