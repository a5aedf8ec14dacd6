//! Wire protocol frames
//!
//! Both directions share the `{"type": ..., "payload": {...}}` envelope.
//! Clients may send `message`, `typing`, and `read`; each republishes as a
//! `chat.*` hub event tagged with the sending user. Server frames carry the
//! reserved types `connected`, `online_users`, `event`, and `error`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::hub::{Event, Priority};

use super::UserId;

/// Payload of a client `message` frame
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    /// Addressed user
    pub recipient_id: UserId,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<u64>,
}

/// Payload of a client `typing` frame
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    pub recipient_id: UserId,
    pub is_typing: bool,
}

/// Payload of a client `read` frame
///
/// `sender_id` is the author of the message being acknowledged, which is
/// where the receipt gets forwarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadPayload {
    pub sender_id: UserId,
    pub message_id: u64,
}

/// Frames accepted from authenticated clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Direct chat message
    Message(MessagePayload),
    /// Typing indicator change
    Typing(TypingPayload),
    /// Read receipt
    Read(ReadPayload),
}

impl ClientFrame {
    /// Build the hub event this frame republishes as
    ///
    /// `sender_id` is the authenticated user of the session the frame
    /// arrived on, never anything the client claims in the payload.
    pub fn into_hub_event(self, sender_id: UserId) -> Event {
        match self {
            ClientFrame::Message(payload) => Event::new(
                "realtime",
                "chat.message.sent",
                json!({
                    "senderId": sender_id,
                    "recipientId": payload.recipient_id,
                    "content": payload.content,
                    "conversationId": payload.conversation_id,
                }),
            ),
            // Typing indicators are transient; nothing may derive from them
            ClientFrame::Typing(payload) => Event::new(
                "realtime",
                "chat.typing.changed",
                json!({
                    "senderId": sender_id,
                    "recipientId": payload.recipient_id,
                    "isTyping": payload.is_typing,
                }),
            )
            .with_priority(Priority::Low)
            .with_propagate(false),
            ClientFrame::Read(payload) => Event::new(
                "realtime",
                "chat.message.read",
                json!({
                    "readerId": sender_id,
                    "senderId": payload.sender_id,
                    "messageId": payload.message_id,
                }),
            ),
        }
    }
}

/// Frame sent to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerFrame {
    #[serde(rename = "type")]
    pub frame_type: String,
    pub payload: Value,
}

impl ServerFrame {
    /// Welcome frame after a session reaches ready
    pub fn connected(connection_id: &str, user_id: UserId) -> Self {
        Self {
            frame_type: "connected".to_string(),
            payload: json!({
                "connectionId": connection_id,
                "userId": user_id,
            }),
        }
    }

    /// Presence snapshot, sent on connect and on every presence change
    pub fn online_users(user_ids: &[UserId]) -> Self {
        Self {
            frame_type: "online_users".to_string(),
            payload: json!({ "userIds": user_ids }),
        }
    }

    /// A forwarded hub event, payload is the full envelope
    pub fn event(event: &Event) -> Self {
        Self {
            frame_type: "event".to_string(),
            payload: serde_json::to_value(event).unwrap_or(Value::Null),
        }
    }

    /// Error report that does not close the connection
    pub fn error(code: &str, message: &str) -> Self {
        Self {
            frame_type: "error".to_string(),
            payload: json!({
                "code": code,
                "message": message,
            }),
        }
    }
}
