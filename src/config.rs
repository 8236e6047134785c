//! Account configuration: the leader and follower tables.
//!
//! Loaded once at startup from a JSON file. A follower declares which
//! leaders it follows and the scale percent applied to each, e.g.
//!
//! ```json
//! {
//!   "leaders": {
//!     "alice": { "api_key": "...", "api_secret": "...", "subaccount": "main" }
//!   },
//!   "followers": {
//!     "bob": {
//!       "api_key": "...", "api_secret": "...",
//!       "follows": { "alice": "50%" }
//!     }
//!   }
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// API credentials for one exchange account.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_secret: String,
    /// Optional subaccount name, forwarded on REST requests and in the
    /// stream login payload.
    #[serde(default)]
    pub subaccount: Option<String>,
}

impl Credentials {
    /// Both key and secret must be present for the account to participate.
    pub fn is_complete(&self) -> bool {
        !self.api_key.is_empty() && !self.api_secret.is_empty()
    }
}

/// A leader account whose orders are observed.
#[derive(Debug, Clone, Deserialize)]
pub struct LeaderConfig {
    #[serde(flatten)]
    pub credentials: Credentials,
}

/// A follower account that receives scaled copies of leader orders.
#[derive(Debug, Clone, Deserialize)]
pub struct FollowerConfig {
    #[serde(flatten)]
    pub credentials: Credentials,

    /// Leader id -> scale percent, e.g. `"alice": "50%"`.
    #[serde(default)]
    pub follows: HashMap<String, String>,
}

/// Top-level configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub leaders: HashMap<String, LeaderConfig>,
    #[serde(default)]
    pub followers: HashMap<String, FollowerConfig>,

    /// REST endpoint base, overridable for testing.
    #[serde(default = "default_rest_url")]
    pub rest_url: String,

    /// Websocket endpoint, overridable for testing.
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
}

fn default_rest_url() -> String {
    "https://api.exchange.example.com".to_string()
}

fn default_ws_url() -> String {
    "wss://api.exchange.example.com/ws".to_string()
}

impl Config {
    /// Load and parse the configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Config = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }
}
