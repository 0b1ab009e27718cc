//! Typed payloads for the canonical event codes.
//!
//! Shapes follow the open platform's payload documentation. Fields the
//! server may omit are defaulted so older payload revisions still parse.

use serde::{Deserialize, Serialize};

/// A chat reference inside an event payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRef {
    /// Chat identifier.
    pub id: String,
    /// Chat type: `single` or `group`.
    #[serde(rename = "type", default)]
    pub chat_type: String,
    /// Display name, present for group chats.
    #[serde(default)]
    pub name: Option<String>,
}

/// The acting party of an event: a user or a robot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    /// Actor type: `user` or `robot`.
    #[serde(rename = "type", default)]
    pub actor_type: String,
    /// Actor identifier.
    pub id: String,
}

/// Message content; only the field matching the message type is set.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MessageContent {
    /// Plain text body, for `text` messages.
    #[serde(default)]
    pub text: String,
}

/// A chat message inside a [`ChatMessageCreatePayload`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message identifier.
    pub id: String,
    /// Message type, e.g. `text`.
    #[serde(rename = "type", default)]
    pub message_type: String,
    /// Typed content.
    #[serde(default)]
    pub content: MessageContent,
}

/// Payload of `kso.app_chat.message.create`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessageCreatePayload {
    #[serde(default)]
    pub company_id: String,
    pub chat: ChatRef,
    pub sender: Actor,
    #[serde(default)]
    pub send_time: i64,
    pub message: ChatMessage,
}

/// Payload of `kso.app_chat.create`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCreatePayload {
    #[serde(default)]
    pub company_id: String,
    pub chat: ChatRef,
    /// Who opened the chat.
    #[serde(default)]
    pub creator: Option<Actor>,
    #[serde(default)]
    pub create_time: i64,
}

/// Payload of `kso.xz.app.group_chat.delete`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupChatDeletePayload {
    #[serde(default)]
    pub company_id: String,
    /// Identifier of the deleted group chat.
    pub chat_id: String,
    /// Who deleted it.
    #[serde(default)]
    pub operator: Option<Actor>,
    #[serde(default)]
    pub delete_time: i64,
}

/// Payload of the four `kso.xz.app.group_chat.member.*` codes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupChatMemberPayload {
    #[serde(default)]
    pub company_id: String,
    /// Group chat the membership change applies to.
    pub chat_id: String,
    /// Who performed the change.
    #[serde(default)]
    pub operator: Option<Actor>,
    /// Affected members.
    #[serde(default)]
    pub members: Vec<Actor>,
    #[serde(default)]
    pub time: i64,
}
