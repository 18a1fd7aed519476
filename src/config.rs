//! Runtime configuration, read from the environment (and `.env`).

use humantime_serde::re::humantime;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::commands::music::utils::music_manager::MusicError;
use crate::commands::music::utils::transport::StreamPolicy;

/// Discord allows fetching at most this many messages per request.
pub const MAX_SCAN_LIMIT: u8 = 100;

/// Tunables for the per-guild player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// How long a guild may sit with an empty queue before the bot leaves.
    #[serde(with = "humantime_serde")]
    pub idle_timeout: Duration,
    /// How many recent channel messages are scanned for cleanup when a session ends.
    pub message_scan_limit: u8,
    /// Reconnect attempts for a stream that fails mid-play.
    pub stream_retries: u32,
    #[serde(with = "humantime_serde")]
    pub stream_retry_delay: Duration,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(300),
            message_scan_limit: MAX_SCAN_LIMIT,
            stream_retries: 2,
            stream_retry_delay: Duration::from_secs(1),
        }
    }
}

impl PlayerConfig {
    pub fn stream_policy(&self) -> StreamPolicy {
        StreamPolicy {
            retries: self.stream_retries,
            retry_delay: self.stream_retry_delay,
        }
    }

    /// Build from a variable lookup; unset variables keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, MusicError> {
        let mut config = Self::default();

        if let Some(raw) = lookup("IDLE_TIMEOUT") {
            config.idle_timeout = parse_duration("IDLE_TIMEOUT", &raw)?;
        }
        if let Some(raw) = lookup("MESSAGE_SCAN_LIMIT") {
            let limit: u8 = parse_number("MESSAGE_SCAN_LIMIT", &raw)?;
            config.message_scan_limit = limit.min(MAX_SCAN_LIMIT);
        }
        if let Some(raw) = lookup("STREAM_RETRIES") {
            config.stream_retries = parse_number("STREAM_RETRIES", &raw)?;
        }
        if let Some(raw) = lookup("STREAM_RETRY_DELAY") {
            config.stream_retry_delay = parse_duration("STREAM_RETRY_DELAY", &raw)?;
        }

        Ok(config)
    }
}

fn parse_duration(key: &str, raw: &str) -> Result<Duration, MusicError> {
    humantime::parse_duration(raw.trim())
        .map_err(|e| MusicError::ConfigError(format!("{} must be a duration like \"5m\": {}", key, e)))
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, MusicError>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| MusicError::ConfigError(format!("{} is not a valid number: {}", key, e)))
}

/// Everything the bot needs to start.
#[derive(Debug, Clone)]
pub struct Config {
    pub token: String,
    pub player: PlayerConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, MusicError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, MusicError> {
        let token = lookup("DISCORD_TOKEN")
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| MusicError::ConfigError("Missing DISCORD_TOKEN".to_string()))?;

        Ok(Self {
            token,
            player: PlayerConfig::from_lookup(lookup)?,
        })
    }
}
