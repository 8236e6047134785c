//! Static leader -> followers mapping built once from configuration.

use std::collections::HashMap;

use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;

use crate::config::FollowerConfig;

/// One edge of the graph: a follower and the scale percent it applies to a
/// particular leader's orders.
#[derive(Debug, Clone, PartialEq)]
pub struct FollowRelation {
    pub follower: String,
    pub scale_percent: Decimal,
}

/// Leader id -> followers. Immutable after construction; safe to share
/// across leader tasks behind an `Arc`.
#[derive(Debug, Default)]
pub struct FollowGraph {
    relations: HashMap<String, Vec<FollowRelation>>,
}

/// Parse a scale factor like `"50%"` (the `%` suffix is optional).
/// The result must be strictly positive.
pub fn parse_scale_percent(raw: &str) -> Result<Decimal> {
    let trimmed = raw.trim().trim_end_matches('%').trim();
    let percent: Decimal = trimmed
        .parse()
        .with_context(|| format!("invalid scale percent {raw:?}"))?;
    if percent <= Decimal::ZERO {
        bail!("scale percent must be positive, got {raw:?}");
    }
    Ok(percent)
}

impl FollowGraph {
    /// Invert the follower table into leader -> followers. Followers are
    /// expected to be pre-filtered to accounts with usable credentials.
    pub fn from_followers(followers: &HashMap<String, FollowerConfig>) -> Result<Self> {
        let mut relations: HashMap<String, Vec<FollowRelation>> = HashMap::new();

        for (follower, config) in followers {
            for (leader, raw_percent) in &config.follows {
                let scale_percent = parse_scale_percent(raw_percent).with_context(|| {
                    format!("follower {follower:?} following leader {leader:?}")
                })?;
                relations.entry(leader.clone()).or_default().push(FollowRelation {
                    follower: follower.clone(),
                    scale_percent,
                });
            }
        }

        Ok(Self { relations })
    }

    /// Followers of a leader; empty when the leader has none.
    pub fn followers_of(&self, leader: &str) -> &[FollowRelation] {
        self.relations.get(leader).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }
}
