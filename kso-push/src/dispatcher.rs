//! Event routing.
//!
//! Maps event codes to handlers, with an optional fallback for codes
//! nothing was registered for. Dispatch awaits the handler before
//! returning, so the caller can acknowledge only after the event was
//! actually processed. Handler errors propagate to the caller.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde::de::DeserializeOwned;
use tracing::debug;

use kso_core::constants::event_codes;

use crate::events::{Event, TypedEvent};
use crate::payloads::{
    ChatCreatePayload, ChatMessageCreatePayload, GroupChatDeletePayload, GroupChatMemberPayload,
};

/// A registered event handler.
pub type EventHandler = Arc<dyn Fn(Event) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Wrap an async closure into an [`EventHandler`].
pub fn handler_fn<F, Fut>(f: F) -> EventHandler
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |event| f(event).boxed())
}

/// Routes events to handlers by event code.
///
/// Registration is chainable and meant to happen before the client starts;
/// registering a second handler for the same code replaces the first.
#[derive(Clone, Default)]
pub struct EventDispatcher {
    handlers: HashMap<String, EventHandler>,
    fallback: Option<EventHandler>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for an event code.
    pub fn on<F, Fut>(mut self, event_code: impl Into<String>, f: F) -> Self
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.handlers.insert(event_code.into(), handler_fn(f));
        self
    }

    /// Register the fallback, invoked for events no specific handler
    /// matches.
    pub fn on_fallback<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.fallback = Some(handler_fn(f));
        self
    }

    /// Register a handler that first parses the payload into `T`.
    ///
    /// Parse failures propagate as handler errors.
    pub fn on_typed<T, F, Fut>(self, event_code: impl Into<String>, f: F) -> Self
    where
        T: DeserializeOwned + Send + 'static,
        F: Fn(TypedEvent<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let f = Arc::new(f);
        self.on(event_code, move |event: Event| {
            let f = f.clone();
            async move {
                let parsed_data: T = serde_json::from_str(event.data())?;
                f(TypedEvent { event, parsed_data }).await
            }
        })
    }

    /// Whether a specific handler is registered for `event_code`.
    pub fn has_handler(&self, event_code: &str) -> bool {
        self.handlers.contains_key(event_code)
    }

    /// Whether anything is registered at all.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty() && self.fallback.is_none()
    }

    /// Route an event to its handler, or the fallback, or nothing.
    ///
    /// At most one handler runs per event. Returns once that handler
    /// resolved.
    pub async fn handle(&self, event: Event) -> anyhow::Result<()> {
        if let Some(handler) = self.handlers.get(event.event_code()) {
            return handler(event).await;
        }
        if let Some(fallback) = &self.fallback {
            return fallback(event).await;
        }
        debug!(event_code = event.event_code(), "no handler registered, event ignored");
        Ok(())
    }

    // -- Typed registration for the canonical event codes --

    /// A chat message was sent to the application.
    pub fn on_chat_message_create<F, Fut>(self, f: F) -> Self
    where
        F: Fn(TypedEvent<ChatMessageCreatePayload>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.on_typed(event_codes::CHAT_MESSAGE_CREATE, f)
    }

    /// A chat with the application was created.
    pub fn on_chat_create<F, Fut>(self, f: F) -> Self
    where
        F: Fn(TypedEvent<ChatCreatePayload>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.on_typed(event_codes::CHAT_CREATE, f)
    }

    /// A group chat was deleted.
    pub fn on_group_chat_delete<F, Fut>(self, f: F) -> Self
    where
        F: Fn(TypedEvent<GroupChatDeletePayload>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.on_typed(event_codes::GROUP_CHAT_DELETE, f)
    }

    /// A user joined a group chat.
    pub fn on_group_chat_member_user_create<F, Fut>(self, f: F) -> Self
    where
        F: Fn(TypedEvent<GroupChatMemberPayload>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.on_typed(event_codes::GROUP_CHAT_MEMBER_USER_CREATE, f)
    }

    /// A user left or was removed from a group chat.
    pub fn on_group_chat_member_user_delete<F, Fut>(self, f: F) -> Self
    where
        F: Fn(TypedEvent<GroupChatMemberPayload>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.on_typed(event_codes::GROUP_CHAT_MEMBER_USER_DELETE, f)
    }

    /// A robot was added to a group chat.
    pub fn on_group_chat_member_robot_create<F, Fut>(self, f: F) -> Self
    where
        F: Fn(TypedEvent<GroupChatMemberPayload>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.on_typed(event_codes::GROUP_CHAT_MEMBER_ROBOT_CREATE, f)
    }

    /// A robot was removed from a group chat.
    pub fn on_group_chat_member_robot_delete<F, Fut>(self, f: F) -> Self
    where
        F: Fn(TypedEvent<GroupChatMemberPayload>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.on_typed(event_codes::GROUP_CHAT_MEMBER_ROBOT_DELETE, f)
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}
