//! Copy-trading order replicator.
//!
//! Mirrors order placement and cancellation from leader accounts onto
//! follower accounts in real time, scaled per follow relation.

mod api;
mod bot;
mod config;
mod models;
mod replicate;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::bot::Bot;
use crate::config::Config;

/// Order replication bot CLI.
#[derive(Parser)]
#[command(name = "mirrortrader")]
#[command(about = "Replicate orders from leader accounts onto follower accounts", long_about = None)]
struct Cli {
    /// Path to the accounts configuration file
    #[arg(short, long, default_value = "mirror.json", env = "MIRROR_CONFIG")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Shorthand for --log-level debug
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.debug {
        Level::DEBUG
    } else {
        match cli.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = Config::load(&cli.config)?;
    info!(
        leaders = config.leaders.len(),
        followers = config.followers.len(),
        "configuration loaded"
    );

    let bot = Bot::new(config)?;
    bot.run().await
}
