//! Global error types for the KSO push client.
//!
//! All error categories across the client are unified into a single
//! `KsoError` enum with conversions from underlying library errors.

use thiserror::Error;

/// Convenience type alias for Results using KsoError.
pub type KsoResult<T> = Result<T, KsoError>;

/// Unified error type covering all error categories in the push client.
#[derive(Error, Debug)]
pub enum KsoError {
    // -- Handshake errors --
    /// Non-retryable handshake rejection (401/403). Surfaces from `start()`
    /// and stops the lifecycle.
    #[error("client error (status {status}): {message}")]
    Client {
        /// HTTP status code from the handshake response.
        status: u16,
        /// Error message.
        message: String,
    },

    /// Retryable server-side handshake failure (429, 5xx, timeout).
    /// Triggers backoff and reconnect if policy allows.
    #[error("server error: {message}")]
    Server {
        /// HTTP status code, or 0 when no response was received.
        status: u16,
        /// Error message.
        message: String,
    },

    // -- Per-event errors --
    /// Inbound event signature did not verify.
    #[error("signature verification failed: {0}")]
    Signature(String),

    /// Inbound event payload could not be decrypted.
    #[error("decrypt error: {0}")]
    Decrypt(String),

    // -- Lifecycle errors --
    /// Generic transport failure during a connected session.
    #[error("connection error: {0}")]
    Connection(String),

    /// Neither a handler nor a dispatcher was configured before `start()`.
    #[error("no event handler or dispatcher configured")]
    HandlerNotSet,

    /// The reconnect policy gave up after exhausting `max_retry` attempts.
    #[error("reconnect attempts exhausted after {0} tries")]
    ReconnectExceeded(u32),

    /// The client was stopped; no further operations are possible.
    #[error("client is closed")]
    ClientClosed,

    /// `start()` was called while a connection already exists.
    #[error("client is already connected")]
    AlreadyConnected,

    // -- Ambient --
    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// File system or socket I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapping anyhow errors for interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<serde_json::Error> for KsoError {
    fn from(e: serde_json::Error) -> Self {
        KsoError::Serialization(e.to_string())
    }
}

impl KsoError {
    /// Whether the lifecycle controller may retry after this error.
    ///
    /// Retryable errors feed the backoff loop; everything else surfaces
    /// from `start()` immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(self, KsoError::Server { .. } | KsoError::Connection(_))
    }
}
