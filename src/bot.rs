//! Bot runner: one stream subscription per leader, with reconciliation,
//! keep-alive heartbeats, reconnection, and ctrl-c shutdown.
//!
//! Accounts with incomplete credentials are logged and excluded here, once,
//! so the engine below never sees them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use tokio::sync::watch;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::api::{ApiError, OrderStream, RestClient, StreamHandle, TradingApi};
use crate::config::{Config, LeaderConfig};
use crate::replicate::{FollowGraph, Replicator};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);
const RECONNECT_BASE_DELAY: Duration = Duration::from_millis(500);
const RECONNECT_MAX_DELAY: Duration = Duration::from_secs(10);

pub struct Bot {
    rest_url: String,
    ws_url: String,
    leaders: Vec<(String, LeaderConfig)>,
    replicator: Arc<Replicator>,
}

impl Bot {
    /// Wire up API clients and the follow graph from configuration.
    ///
    /// A follower or leader with missing credentials is excluded with a
    /// single logged error; the run continues with the remaining accounts.
    pub fn new(config: Config) -> Result<Self> {
        let mut follower_apis: HashMap<String, Arc<dyn TradingApi>> = HashMap::new();
        let mut usable_followers = HashMap::new();

        for (name, follower) in &config.followers {
            if !follower.credentials.is_complete() {
                error!(follower = %name, "missing api credentials, follower excluded from this run");
                continue;
            }
            match RestClient::new(
                &config.rest_url,
                &follower.credentials.api_key,
                &follower.credentials.api_secret,
                follower.credentials.subaccount.as_deref(),
            ) {
                Ok(client) => {
                    follower_apis.insert(name.clone(), Arc::new(client) as Arc<dyn TradingApi>);
                    usable_followers.insert(name.clone(), follower.clone());
                }
                Err(e) => {
                    error!(follower = %name, error = %e, "could not build api client, follower excluded");
                }
            }
        }

        let graph = Arc::new(FollowGraph::from_followers(&usable_followers)?);
        if graph.is_empty() {
            warn!("no follow relations configured, nothing will be replicated");
        }

        let leaders: Vec<(String, LeaderConfig)> = config
            .leaders
            .iter()
            .filter_map(|(name, leader)| {
                if leader.credentials.is_complete() {
                    Some((name.clone(), leader.clone()))
                } else {
                    error!(leader = %name, "missing api credentials, leader excluded from this run");
                    None
                }
            })
            .collect();

        Ok(Self {
            rest_url: config.rest_url,
            ws_url: config.ws_url,
            leaders,
            replicator: Arc::new(Replicator::new(graph, follower_apis)),
        })
    }

    /// Leaders that will actually be subscribed.
    pub fn active_leaders(&self) -> impl Iterator<Item = &str> {
        self.leaders.iter().map(|(name, _)| name.as_str())
    }

    /// Whether a follower survived credential checks.
    pub fn has_follower(&self, name: &str) -> bool {
        self.replicator.has_follower(name)
    }

    /// Run until ctrl-c. Each leader gets its own connection task; losing
    /// one leader never stops the others.
    pub async fn run(&self) -> Result<()> {
        if self.leaders.is_empty() {
            bail!("no leader account with usable credentials, nothing to subscribe to");
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut tasks = Vec::new();
        for (name, leader) in &self.leaders {
            tasks.push(tokio::spawn(run_leader(
                name.clone(),
                leader.clone(),
                self.rest_url.clone(),
                self.ws_url.clone(),
                self.replicator.clone(),
                shutdown_rx.clone(),
            )));
        }

        info!(leaders = tasks.len(), "copy bot started");

        tokio::signal::ctrl_c().await.ok();
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);

        for task in tasks {
            task.await.ok();
        }
        info!("all leader connections closed");
        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq)]
enum SessionEnd {
    Shutdown,
    Disconnected,
}

/// Connection loop for one leader: connect, stream, reconnect with capped
/// exponential backoff until shutdown.
async fn run_leader(
    leader: String,
    config: LeaderConfig,
    rest_url: String,
    ws_url: String,
    replicator: Arc<Replicator>,
    mut shutdown: watch::Receiver<bool>,
) {
    let credentials = &config.credentials;
    let rest = match RestClient::new(
        &rest_url,
        &credentials.api_key,
        &credentials.api_secret,
        credentials.subaccount.as_deref(),
    ) {
        Ok(client) => client,
        Err(e) => {
            error!(leader = %leader, error = %e, "could not build leader api client");
            return;
        }
    };

    let mut attempt: u32 = 0;
    loop {
        if *shutdown.borrow() {
            return;
        }

        match run_session(&leader, &config, &ws_url, &rest, &replicator, &mut shutdown).await {
            Ok(SessionEnd::Shutdown) => return,
            Ok(SessionEnd::Disconnected) => {
                attempt = 1;
                warn!(leader = %leader, "stream disconnected, reconnecting");
            }
            Err(e) => {
                attempt = attempt.saturating_add(1);
                error!(leader = %leader, attempt = attempt, error = %e, "could not establish leader stream");
            }
        }

        let delay = reconnect_delay(attempt);
        tokio::select! {
            _ = shutdown.changed() => return,
            _ = sleep(delay) => {}
        }
    }
}

/// One connected session: subscribe, reconcile missed orders, then process
/// events until the stream drops or shutdown is requested.
async fn run_session(
    leader: &str,
    config: &LeaderConfig,
    ws_url: &str,
    rest: &RestClient,
    replicator: &Replicator,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<SessionEnd, ApiError> {
    let credentials = &config.credentials;
    let mut stream = OrderStream::connect(
        ws_url,
        &credentials.api_key,
        &credentials.api_secret,
        credentials.subaccount.as_deref(),
    )
    .await?;
    stream.subscribe_to_orders().await?;

    let heartbeat_task = tokio::spawn(heartbeat(
        leader.to_string(),
        stream.handle(),
        shutdown.clone(),
    ));

    // Catch up on orders the leader placed before this connection existed.
    match replicator.reconcile(leader, rest).await {
        Ok(summary) => info!(
            leader = leader,
            open_orders = summary.leader_open_orders,
            replicated = summary.replicated,
            "reconciliation complete"
        ),
        Err(e) => warn!(
            leader = leader,
            error = %e,
            "reconciliation failed, continuing with live stream"
        ),
    }

    info!(leader = leader, "replication live");

    let end = loop {
        tokio::select! {
            _ = shutdown.changed() => break SessionEnd::Shutdown,
            frame = stream.next_envelope() => match frame {
                Some(Ok(envelope)) => replicator.handle_envelope(leader, envelope).await,
                Some(Err(e)) if e.is_transient() => {
                    warn!(leader = leader, error = %e, "stream read error");
                    break SessionEnd::Disconnected;
                }
                Some(Err(e)) => {
                    warn!(leader = leader, error = %e, "ignoring undecodable frame");
                }
                None => break SessionEnd::Disconnected,
            }
        }
    };

    heartbeat_task.abort();
    if end == SessionEnd::Shutdown {
        stream.handle().close().await.ok();
    }
    Ok(end)
}

/// Keep-alive loop for one leader connection. Runs on its own task so event
/// processing can never starve it.
async fn heartbeat(leader: String, handle: StreamHandle, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = interval(HEARTBEAT_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = shutdown.changed() => return,
            _ = ticker.tick() => {
                if let Err(e) = handle.ping().await {
                    warn!(leader = %leader, error = %e, "heartbeat ping failed");
                    return;
                }
            }
        }
    }
}

fn reconnect_delay(attempt: u32) -> Duration {
    RECONNECT_BASE_DELAY
        .saturating_mul(1u32 << attempt.min(5))
        .min(RECONNECT_MAX_DELAY)
}
