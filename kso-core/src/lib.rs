//! KSO Core - Foundation types, error handling, configuration, and logging.
//!
//! This crate provides the shared foundation used by the push client:
//! - Client configuration (credentials, endpoint, timeouts, backoff policy)
//! - Global error types covering all error categories
//! - Structured logging with tracing
//! - Common constants

pub mod config;
pub mod constants;
pub mod error;
pub mod logging;

// Re-export commonly used items at the crate root
pub use config::{ClientConfig, ReconnectConfig};
pub use error::{KsoError, KsoResult};
pub use logging::{init_console_logging, LogLevel};
