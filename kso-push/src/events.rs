//! Event model and wire message types.
//!
//! [`Event`] is what handlers receive: the decrypted payload plus its
//! routing key. The remaining types mirror the frames exchanged on the
//! socket: inbound encrypted events and teardown notifications, outbound
//! acknowledgements.

use serde::{Deserialize, Serialize};

use kso_core::constants;

/// Build the routing key for a topic/operation pair.
pub fn build_event_code(topic: &str, operation: &str) -> String {
    format!("{topic}.{operation}")
}

/// A decrypted push event. Immutable once built.
#[derive(Debug, Clone)]
pub struct Event {
    topic: String,
    operation: String,
    time: i64,
    data: String,
    event_code: String,
}

impl Event {
    /// Build an event; the event code is derived from topic and operation.
    pub fn new(
        topic: impl Into<String>,
        operation: impl Into<String>,
        time: i64,
        data: impl Into<String>,
    ) -> Self {
        let topic = topic.into();
        let operation = operation.into();
        let event_code = build_event_code(&topic, &operation);
        Self {
            topic,
            operation,
            time,
            data: data.into(),
            event_code,
        }
    }

    /// Event topic, e.g. `kso.app_chat.message`.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Event operation, e.g. `create`.
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Server-side event time, seconds since epoch.
    pub fn time(&self) -> i64 {
        self.time
    }

    /// Decrypted payload, typically JSON.
    pub fn data(&self) -> &str {
        &self.data
    }

    /// Routing key: `topic + "." + operation`.
    pub fn event_code(&self) -> &str {
        &self.event_code
    }
}

/// An [`Event`] paired with its payload parsed into `T`.
#[derive(Debug, Clone)]
pub struct TypedEvent<T> {
    /// The underlying event.
    pub event: Event,
    /// The payload parsed from [`Event::data`].
    pub parsed_data: T,
}

/// An encrypted event as received on the socket.
#[derive(Debug, Clone, Deserialize)]
pub struct EventMessage {
    pub topic: String,
    pub operation: String,
    #[serde(default)]
    pub time: i64,
    #[serde(default)]
    pub nonce: String,
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub encrypted_data: String,
}

/// Why the server is tearing the connection down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoAwayReason {
    /// The server is shutting down.
    ServerShutdown,
    /// Another connection authenticated for the same application.
    ConnectionReplaced,
    /// The server saw no liveness response in time.
    HeartbeatTimeout,
    /// Forward-compatible catch-all.
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for GoAwayReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ServerShutdown => write!(f, "server_shutdown"),
            Self::ConnectionReplaced => write!(f, "connection_replaced"),
            Self::HeartbeatTimeout => write!(f, "heartbeat_timeout"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Server-initiated teardown notification.
#[derive(Debug, Clone, Deserialize)]
pub struct GoAwayMessage {
    pub reason: GoAwayReason,
    #[serde(default)]
    pub message: String,
    /// Backoff base override for the reconnect that follows, milliseconds.
    #[serde(default)]
    pub reconnect_ms: Option<u64>,
}

/// Outbound per-event acknowledgement.
#[derive(Debug, Clone, Serialize)]
pub struct AckMessage {
    #[serde(rename = "type")]
    pub msg_type: &'static str,
    /// Nonce echoed from the acknowledged event.
    pub nonce: String,
    /// 200 on success, 500 on handler failure.
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
}

impl AckMessage {
    /// Acknowledge successful delivery.
    pub fn ok(nonce: impl Into<String>) -> Self {
        Self {
            msg_type: constants::FRAME_TYPE_ACK,
            nonce: nonce.into(),
            code: constants::ACK_CODE_OK,
            msg: None,
        }
    }

    /// Acknowledge a handler failure with a truncated error message.
    pub fn handler_error(nonce: impl Into<String>, msg: &str) -> Self {
        Self {
            msg_type: constants::FRAME_TYPE_ACK,
            nonce: nonce.into(),
            code: constants::ACK_CODE_HANDLER_ERROR,
            msg: Some(truncate_msg(msg, constants::ACK_MSG_MAX_BYTES)),
        }
    }
}

/// Minimal view of an inbound frame, enough to pick its type.
#[derive(Debug, Clone, Deserialize)]
pub struct ProbeFrame {
    #[serde(default, rename = "type")]
    pub msg_type: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub operation: String,
}

/// Cut `msg` at the largest char boundary within `max_bytes`, appending
/// `"..."` when anything was removed.
fn truncate_msg(msg: &str, max_bytes: usize) -> String {
    if msg.len() <= max_bytes {
        return msg.to_string();
    }
    let mut cut = max_bytes;
    while cut > 0 && !msg.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &msg[..cut])
}

/// Connection state of the push client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected and not trying to connect.
    Disconnected,
    /// Attempting to establish a connection.
    Connecting,
    /// Connected and receiving events.
    Connected,
    /// Connection lost, waiting to reconnect.
    Reconnecting,
    /// Stopped. Terminal: no further transitions.
    Closed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Reconnecting => write!(f, "reconnecting"),
            Self::Closed => write!(f, "closed"),
        }
    }
}
