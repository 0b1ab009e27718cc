//! KSO Push - client for the open event push service.
//!
//! This crate maintains a long-lived WebSocket connection to the push
//! service and turns its encrypted wire frames into typed application
//! events:
//! - KSO-1 signed handshake and per-event signature verification
//! - AES-256-CBC payload decryption
//! - Automatic reconnection with exponential backoff and jitter
//! - Pong-liveness monitoring and server-initiated teardown (goaway)
//! - Optional at-least-once acknowledgements
//! - Event routing by `topic.operation` code, with typed helpers for the
//!   canonical codes
//!
//! ```no_run
//! use kso_core::ClientConfig;
//! use kso_push::{EventDispatcher, PushClient};
//!
//! # async fn run() -> kso_core::KsoResult<()> {
//! let dispatcher = EventDispatcher::new()
//!     .on_chat_message_create(|typed| async move {
//!         println!("{}", typed.parsed_data.message.content.text);
//!         Ok(())
//!     })
//!     .on_fallback(|event| async move {
//!         println!("unhandled event {}", event.event_code());
//!         Ok(())
//!     });
//!
//! let client = PushClient::new(ClientConfig::new("app_id", "app_secret"))
//!     .with_dispatcher(dispatcher);
//! client.start().await
//! # }
//! ```

pub mod backoff;
pub mod client;
mod connection;
pub mod crypto;
pub mod dispatcher;
pub mod events;
pub mod payloads;
mod pipeline;
pub mod signer;

// Re-export key types
pub use client::PushClient;
pub use crypto::EventCipher;
pub use dispatcher::{handler_fn, EventDispatcher, EventHandler};
pub use events::{
    build_event_code, AckMessage, ConnectionState, Event, EventMessage, GoAwayMessage,
    GoAwayReason, TypedEvent,
};
pub use payloads::{
    Actor, ChatCreatePayload, ChatMessage, ChatMessageCreatePayload, ChatRef,
    GroupChatDeletePayload, GroupChatMemberPayload, MessageContent,
};
pub use signer::Signer;
