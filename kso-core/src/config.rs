//! Client configuration.
//!
//! Configuration is purely programmatic: credentials plus tuning knobs,
//! assembled with builder-style methods before the client starts. Nothing
//! is read from disk or the environment.

use crate::constants;
use crate::error::{KsoError, KsoResult};
use crate::logging::LogLevel;

/// Reconnect backoff policy.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Master switch for automatic reconnection.
    pub auto_reconnect: bool,
    /// Base delay between reconnection attempts, in milliseconds.
    pub base_interval_ms: u64,
    /// Maximum delay cap for exponential backoff, in milliseconds.
    pub max_interval_ms: u64,
    /// Growth factor applied per attempt.
    pub multiplier: f64,
    /// Maximum number of reconnection attempts (-1 = unlimited).
    pub max_retry: i32,
    /// Jitter fraction (0.0 to 1.0) applied to each delay.
    pub jitter: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            base_interval_ms: constants::DEFAULT_RECONNECT_BASE_INTERVAL_MS,
            max_interval_ms: constants::DEFAULT_RECONNECT_MAX_INTERVAL_MS,
            multiplier: constants::DEFAULT_RECONNECT_MULTIPLIER,
            max_retry: constants::DEFAULT_RECONNECT_MAX_RETRY,
            jitter: constants::DEFAULT_RECONNECT_JITTER,
        }
    }
}

/// Full configuration surface of the push client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Application identifier issued by the open platform.
    pub app_id: String,
    /// Application secret used for handshake signing, event signature
    /// verification, and payload decryption.
    pub app_secret: String,
    /// Push service WebSocket URL.
    pub endpoint: String,
    /// Client log threshold.
    pub log_level: LogLevel,
    /// Handshake/send deadline in milliseconds.
    pub write_timeout_ms: u64,
    /// Pong-liveness deadline in milliseconds.
    pub pong_timeout_ms: u64,
    /// Whether to negotiate per-event acknowledgements.
    pub ack_mode: bool,
    /// Reconnect backoff policy.
    pub reconnect: ReconnectConfig,
}

impl ClientConfig {
    /// Create a configuration with the given credentials and defaults for
    /// everything else.
    pub fn new(app_id: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            app_secret: app_secret.into(),
            endpoint: constants::DEFAULT_ENDPOINT.to_string(),
            log_level: LogLevel::default(),
            write_timeout_ms: constants::DEFAULT_WRITE_TIMEOUT_MS,
            pong_timeout_ms: constants::DEFAULT_PONG_TIMEOUT_MS,
            ack_mode: true,
            reconnect: ReconnectConfig::default(),
        }
    }

    /// Override the push service endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the client log threshold.
    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    /// Set the handshake/send deadline.
    pub fn with_write_timeout_ms(mut self, ms: u64) -> Self {
        self.write_timeout_ms = ms;
        self
    }

    /// Set the pong-liveness deadline.
    pub fn with_pong_timeout_ms(mut self, ms: u64) -> Self {
        self.pong_timeout_ms = ms;
        self
    }

    /// Enable or disable per-event acknowledgements.
    pub fn with_ack_mode(mut self, on: bool) -> Self {
        self.ack_mode = on;
        self
    }

    /// Replace the reconnect backoff policy.
    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Check the configuration against the documented value ranges.
    pub fn validate(&self) -> KsoResult<()> {
        if self.app_id.is_empty() {
            return Err(KsoError::Config("app_id must not be empty".into()));
        }
        if self.app_secret.is_empty() {
            return Err(KsoError::Config("app_secret must not be empty".into()));
        }
        if self.endpoint.is_empty() {
            return Err(KsoError::Config("endpoint must not be empty".into()));
        }
        if self.reconnect.base_interval_ms == 0 {
            return Err(KsoError::Config("base_interval_ms must be > 0".into()));
        }
        if self.reconnect.max_interval_ms < self.reconnect.base_interval_ms {
            return Err(KsoError::Config(
                "max_interval_ms must be >= base_interval_ms".into(),
            ));
        }
        if self.reconnect.multiplier <= 1.0 {
            return Err(KsoError::Config("multiplier must be > 1.0".into()));
        }
        if !(0.0..=1.0).contains(&self.reconnect.jitter) {
            return Err(KsoError::Config("jitter must be within [0.0, 1.0]".into()));
        }
        if self.reconnect.max_retry < -1 {
            return Err(KsoError::Config(
                "max_retry must be -1 (unlimited) or >= 0".into(),
            ));
        }
        Ok(())
    }
}
