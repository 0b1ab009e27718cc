//! Structured logging setup using the `tracing` ecosystem.
//!
//! The client itself only emits `tracing` events; installing a subscriber
//! is the embedding application's concern. The helpers here cover the
//! common console case for examples and tests.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Severity threshold for client log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Everything, including per-frame detail.
    Debug,
    /// Lifecycle transitions and notable events.
    #[default]
    Info,
    /// Degraded-but-recovering conditions.
    Warn,
    /// Dropped events and failed operations only.
    Error,
    /// No output.
    Silent,
}

impl LogLevel {
    /// The `tracing_subscriber` filter directive for this level.
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Silent => "off",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_filter_str())
    }
}

/// Initialize a console-only subscriber at the given threshold.
///
/// Repeat calls are no-ops.
pub fn init_console_logging(level: LogLevel) {
    let env_filter = EnvFilter::try_new(level.as_filter_str())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).compact())
        .try_init();
}
