//! Scale-out configuration for the Redis backplane.

use std::time::Duration;

use backplane_types::{BusError, BusResult};

/// Delay between failed connect attempts.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Readiness poll interval used after a connection is restored.
pub const DEFAULT_RESTORE_POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisScaleoutConfiguration {
    /// Passed verbatim to the store client.
    pub connection_string: String,
    pub database: u32,
    /// Names both the sequence counter and the publish channel.
    pub event_key: String,
    pub reconnect_delay: Duration,
    pub stream_count: usize,
    pub restore_poll_interval: Duration,
}

impl RedisScaleoutConfiguration {
    pub fn new(connection_string: impl Into<String>, event_key: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            database: 0,
            event_key: event_key.into(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            stream_count: 1,
            restore_poll_interval: DEFAULT_RESTORE_POLL_INTERVAL,
        }
    }

    #[must_use]
    pub fn with_database(mut self, database: u32) -> Self {
        self.database = database;
        self
    }

    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    #[must_use]
    pub fn with_stream_count(mut self, stream_count: usize) -> Self {
        self.stream_count = stream_count;
        self
    }

    #[must_use]
    pub fn with_restore_poll_interval(mut self, interval: Duration) -> Self {
        self.restore_poll_interval = interval;
        self
    }

    pub fn validate(&self) -> BusResult<()> {
        if self.event_key.is_empty() {
            return Err(BusError::InvalidConfiguration(
                "event key must not be empty".into(),
            ));
        }
        if self.stream_count == 0 {
            return Err(BusError::InvalidConfiguration(
                "stream count must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RedisScaleoutConfiguration::new("localhost:6379", "chat");
        assert_eq!(config.database, 0);
        assert_eq!(config.reconnect_delay, Duration::from_secs(2));
        assert_eq!(config.restore_poll_interval, Duration::from_millis(200));
        assert_eq!(config.stream_count, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_key() {
        let config = RedisScaleoutConfiguration::new("localhost:6379", "");
        assert!(matches!(
            config.validate(),
            Err(BusError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_streams() {
        let config = RedisScaleoutConfiguration::new("localhost:6379", "chat").with_stream_count(0);
        assert!(config.validate().is_err());
    }
}
