use std::env::var;
use std::time::Duration;

use dotenvy::dotenv;
use thiserror::Error;

use crate::query::with_default_port;
use crate::validation::{self, ModeKind, ValidationError};

/// Settings that only apply in threshold mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThresholdSettings {
    /// Minimum player count that triggers a notification
    pub player_threshold: u32,
    /// Minutes to stay quiet after a notification
    pub cooldown_minutes: u32,
    /// Bucket holding the timer blob
    pub bucket: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Notify for every player that joins
    All,
    /// Notify when the player count reaches a threshold, then cool down
    Threshold(ThresholdSettings),
}

impl Mode {
    pub fn name(&self) -> &'static str {
        match self {
            Mode::All => "all",
            Mode::Threshold(_) => "threshold",
        }
    }
}

/// The part of the configuration an invocation needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub mode: Mode,
    /// Address shown in notifications
    pub server_address: String,
}

/// Application configuration, read once at startup
#[derive(Debug, Clone)]
pub struct Config {
    /// Env: MODE ("all" or "threshold", required)
    pub mode: Mode,

    /// Env: SERVER_ADDRESS or SERVER_IP (required, port defaults to 27015)
    pub server_address: String,

    /// Env: DATABASE_PATH (default: "joinwatch.db")
    pub database_path: String,

    /// Env: DISCORD_WEBHOOK_URL (optional, notifications are only logged without it)
    pub discord_webhook_url: Option<String>,

    /// Env: QUERY_TIMEOUT_SECS (default: 5)
    pub query_timeout: Duration,

    /// Env: POLL_INTERVAL_SECS (optional, poll forever on this interval)
    pub poll_interval: Option<Duration>,

    /// Env: PORT (optional, serve the HTTP trigger on this port)
    pub port: Option<u16>,

    /// Env: REQUEST_TIMEOUT_SECS (default: 30)
    pub request_timeout: Duration,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Error, {0} was not provided. Please provide one in the environment variable \"{0}\"")]
    Missing(&'static str),

    #[error("Error, \"{name}\"'s value \"{value}\" is not a whole number")]
    NotANumber { name: &'static str, value: String },

    #[error("Error, {0}")]
    Invalid(#[from] ValidationError),
}

pub const DEFAULT_BUCKET: &str = "joinwatch";

impl Config {
    /// Load configuration from the environment (and a `.env` file if present)
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenv(); //for local runs mostly
        Self::from_lookup(|key| var(key).ok())
    }

    /// Build configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mode = get("MODE").ok_or(ConfigError::Missing("MODE"))?;
        let mode = match validation::validate_mode(&mode)? {
            ModeKind::All => Mode::All,
            ModeKind::Threshold => {
                let threshold = required_u32(&get, "PLAYER_COUNT_THRESHOLD")?;
                let minutes = required_u32(&get, "THRESHOLD_TIMER_MINUTES")?;
                let bucket = get("TIMER_BUCKET")
                    .or_else(|| get("S3_BUCKET_NAME"))
                    .unwrap_or_else(|| DEFAULT_BUCKET.to_string());
                validation::validate_bucket(&bucket)?;
                Mode::Threshold(ThresholdSettings {
                    player_threshold: validation::validate_threshold(threshold)?,
                    cooldown_minutes: validation::validate_timer_minutes(minutes)?,
                    bucket,
                })
            }
        };

        let server_address = get("SERVER_ADDRESS")
            .or_else(|| get("SERVER_IP"))
            .ok_or(ConfigError::Missing("SERVER_ADDRESS"))?;
        validation::validate_server_address(&server_address)?;

        Ok(Self {
            mode,
            server_address: with_default_port(&server_address),
            database_path: get("DATABASE_PATH").unwrap_or_else(|| "joinwatch.db".to_string()),
            discord_webhook_url: get("DISCORD_WEBHOOK_URL"),
            query_timeout: Duration::from_secs(or_default(&get, "QUERY_TIMEOUT_SECS", 5)),
            poll_interval: get("POLL_INTERVAL_SECS")
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|&secs| secs > 0)
                .map(Duration::from_secs),
            port: get("PORT").and_then(|v| v.trim().parse().ok()),
            request_timeout: Duration::from_secs(or_default(&get, "REQUEST_TIMEOUT_SECS", 30)),
        })
    }

    pub fn settings(&self) -> Settings {
        Settings {
            mode: self.mode.clone(),
            server_address: self.server_address.clone(),
        }
    }
}

fn required_u32<G>(get: &G, key: &'static str) -> Result<u32, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let value = get(key).ok_or(ConfigError::Missing(key))?;
    value.trim().parse().map_err(|_| ConfigError::NotANumber { name: key, value })
}

/// Parse an optional value or return the default
fn or_default<G, T>(get: &G, key: &str, default: T) -> T
where
    G: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    get(key)
        .and_then(|val| val.trim().parse().ok())
        .unwrap_or(default)
}
