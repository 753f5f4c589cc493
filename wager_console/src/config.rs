use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use wager_chess::network::DEFAULT_SERVER_URL;


pub const DEFAULT_IDENTITY_FILE: &str = "wager_chess_identity.json";
pub const DEFAULT_LOG_FILE: &str = "wager_chess_console.log";
pub const DEFAULT_CATEGORY: &str = "blitz";

// How to get the connection back after it drops. The delay doubles after each failed attempt, but
// never exceeds `max_delay`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    pub attempts: u32,
    #[serde(with = "humantime_serde")]
    pub initial_delay: Duration,
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
}

// Everything in the file is optional. Command line flags take precedence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub server_url: String,
    pub identity_file: PathBuf,
    pub log_file: PathBuf,
    #[serde(with = "humantime_serde")]
    pub tick_interval: Duration,
    pub reconnect: ReconnectPolicy,
    // Defaults for `/create`.
    #[serde(with = "humantime_serde")]
    pub match_duration: Duration,
    pub category: String,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy {
            attempts: 5,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl ReconnectPolicy {
    // Delay before the given attempt, 0-based.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        let factor = 1_u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            server_url: DEFAULT_SERVER_URL.to_owned(),
            identity_file: PathBuf::from(DEFAULT_IDENTITY_FILE),
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            tick_interval: Duration::from_secs(1),
            reconnect: ReconnectPolicy::default(),
            match_duration: Duration::from_secs(5 * 60),
            category: DEFAULT_CATEGORY.to_owned(),
        }
    }
}

pub fn read_config_file(path: &Path) -> anyhow::Result<ClientConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'.", path.display()))?;
    parse_config(&contents)
        .with_context(|| format!("Failed to parse config file '{}'.", path.display()))
}

pub fn parse_config(contents: &str) -> anyhow::Result<ClientConfig> {
    let config: ClientConfig = serde_yaml::from_str(contents)?;
    anyhow::ensure!(!config.tick_interval.is_zero(), "tick_interval must be positive");
    Ok(config)
}
