use std::env::var;
use std::time::Duration;

use dotenvy::dotenv;
use mcwatch_core::{AddressError, ServerAddress, VerifierConfig};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("DISCORD_TOKEN environment variable is required")]
    MissingToken,

    #[error("SERVER_ADDRESS is invalid: {0}")]
    InvalidAddress(#[from] AddressError),
}

/// Application configuration with environment variable overrides
#[derive(Debug, Clone)]
pub struct Config {
    /// Discord API Token
    /// Env: DISCORD_TOKEN (required to start the bot)
    pub discord_token: Option<String>,

    /// Minecraft server to watch, `host` or `host:port`
    /// Env: SERVER_ADDRESS (default: "localhost")
    pub server_address: String,

    /// Ledger file path
    /// Env: USER_DATA_FILE (default: "users.json")
    pub user_data_file: String,

    /// Prefix for text commands
    /// Env: COMMAND_PREFIX (default: "$")
    pub command_prefix: String,

    /// How often the server is queried
    /// Env: POLL_INTERVAL_SECS (default: 2)
    pub poll_interval: Duration,

    /// How often playtime is credited; each tick is one minute of playtime
    /// Env: ACCRUAL_INTERVAL_SECS (default: 60)
    pub accrual_interval: Duration,

    /// Timeout for a single status query
    /// Env: QUERY_TIMEOUT_SECS (default: 3)
    pub query_timeout: Duration,

    /// Verification sampling period
    /// Env: VERIFY_TICK_MILLIS (default: 1000)
    pub verify_tick: Duration,

    /// Verification gives up after this many ticks
    /// Env: VERIFY_MAX_TICKS (default: 20)
    pub verify_max_ticks: u32,

    /// How long the requester has to confirm a verification
    /// Env: CONFIRM_TIMEOUT_SECS (default: 60)
    pub confirm_timeout: Duration,

    /// HTTP status port
    /// Env: PORT (default: 3000)
    pub port: u16,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let _ = dotenv(); //for debugging mostly
        Self {
            discord_token: var("DISCORD_TOKEN").ok().filter(|t| !t.is_empty()),
            server_address: env_or_default_string("SERVER_ADDRESS", "localhost"),
            user_data_file: env_or_default_string("USER_DATA_FILE", "users.json"),
            command_prefix: env_or_default_string("COMMAND_PREFIX", "$"),
            poll_interval: Duration::from_secs(env_or_default("POLL_INTERVAL_SECS", 2)),
            accrual_interval: Duration::from_secs(env_or_default("ACCRUAL_INTERVAL_SECS", 60)),
            query_timeout: Duration::from_secs(env_or_default("QUERY_TIMEOUT_SECS", 3)),
            verify_tick: Duration::from_millis(env_or_default("VERIFY_TICK_MILLIS", 1000)),
            verify_max_ticks: env_or_default("VERIFY_MAX_TICKS", 20),
            confirm_timeout: Duration::from_secs(env_or_default("CONFIRM_TIMEOUT_SECS", 60)),
            port: env_or_default("PORT", 3000),
        }
    }

    pub fn server_address(&self) -> Result<ServerAddress, ConfigError> {
        Ok(self.server_address.parse()?)
    }

    pub fn discord_token(&self) -> Result<&str, ConfigError> {
        self.discord_token
            .as_deref()
            .ok_or(ConfigError::MissingToken)
    }

    pub fn verifier(&self) -> VerifierConfig {
        VerifierConfig {
            tick: self.verify_tick,
            max_ticks: self.verify_max_ticks,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discord_token: None,
            server_address: "localhost".to_string(),
            user_data_file: "users.json".to_string(),
            command_prefix: "$".to_string(),
            poll_interval: Duration::from_secs(2),
            accrual_interval: Duration::from_secs(60),
            query_timeout: Duration::from_secs(3),
            verify_tick: Duration::from_secs(1),
            verify_max_ticks: 20,
            confirm_timeout: Duration::from_secs(60),
            port: 3000,
        }
    }
}

/// Parse environment variable or return default value
fn env_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    var(key)
        .ok()
        .and_then(|val| val.parse().ok())
        .unwrap_or(default)
}

/// Parse environment variable string or return default value
fn env_or_default_string(key: &str, default: &str) -> String {
    var(key).unwrap_or_else(|_| default.to_string())
}
