//! # Node Configuration
//!
//! Everything the publisher needs, read from the environment.
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `BP_REDIS_URL` | `redis://127.0.0.1:6379` | Connection string, passed verbatim |
//! | `BP_REDIS_DATABASE` | `0` | Database index |
//! | `BP_EVENT_KEY` | `backplane` | Counter key and publish channel |
//! | `BP_RECONNECT_DELAY_MS` | `2000` | Delay between connect attempts |
//! | `BP_STREAM_COUNT` | `1` | Number of streams |
//! | `BP_BACKEND` | `redis` | `redis` or `memory` |
//! | `BP_SIGNAL` | `broadcast` | Signal each input line is published to |

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use backplane_redis::{RedisScaleoutConfiguration, DEFAULT_RECONNECT_DELAY};

/// Which store the publisher talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    #[default]
    Redis,
    /// In-process store; useful for smoke tests without a server.
    Memory,
}

impl FromStr for Backend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "redis" => Ok(Backend::Redis),
            "memory" => Ok(Backend::Memory),
            _ => Err(ConfigError::InvalidValue {
                key: "BP_BACKEND",
                value: s.to_string(),
            }),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {key}")]
    InvalidValue { key: &'static str, value: String },

    #[error("{key} must not be empty")]
    Empty { key: &'static str },
}

/// Complete publisher configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    pub redis_url: String,
    pub database: u32,
    pub event_key: String,
    pub reconnect_delay: Duration,
    pub stream_count: usize,
    pub backend: Backend,
    pub signal: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".into(),
            database: 0,
            event_key: "backplane".into(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            stream_count: 1,
            backend: Backend::Redis,
            signal: "broadcast".into(),
        }
    }
}

impl NodeConfig {
    /// Load from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("BP_REDIS_URL") {
            config.redis_url = url;
        }
        if let Some(database) = lookup("BP_REDIS_DATABASE") {
            config.database = parse("BP_REDIS_DATABASE", &database)?;
        }
        if let Some(key) = lookup("BP_EVENT_KEY") {
            config.event_key = key;
        }
        if let Some(delay) = lookup("BP_RECONNECT_DELAY_MS") {
            config.reconnect_delay = Duration::from_millis(parse("BP_RECONNECT_DELAY_MS", &delay)?);
        }
        if let Some(streams) = lookup("BP_STREAM_COUNT") {
            config.stream_count = parse("BP_STREAM_COUNT", &streams)?;
        }
        if let Some(backend) = lookup("BP_BACKEND") {
            config.backend = backend.parse()?;
        }
        if let Some(signal) = lookup("BP_SIGNAL") {
            config.signal = signal;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event_key.is_empty() {
            return Err(ConfigError::Empty { key: "BP_EVENT_KEY" });
        }
        if self.signal.is_empty() {
            return Err(ConfigError::Empty { key: "BP_SIGNAL" });
        }
        if self.stream_count == 0 {
            return Err(ConfigError::InvalidValue {
                key: "BP_STREAM_COUNT",
                value: "0".into(),
            });
        }
        Ok(())
    }

    /// Scale-out settings for the backplane adapter.
    #[must_use]
    pub fn scaleout(&self) -> RedisScaleoutConfiguration {
        RedisScaleoutConfiguration::new(self.redis_url.clone(), self.event_key.clone())
            .with_database(self.database)
            .with_reconnect_delay(self.reconnect_delay)
            .with_stream_count(self.stream_count)
    }
}

fn parse<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}
