//! Chat message and typing notice bodies.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{MessageId, RoomId, UserId};

/// Event type carried by a chat frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageKind {
    /// Regular chat message.
    Chat,
    /// User joined the room.
    Join,
    /// User left the room.
    Leave,
    /// Typing notice.
    Typing,
}

/// Delivery status of a message.
///
/// Open for extension: statuses this client does not know are preserved
/// verbatim in [`DeliveryStatus::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DeliveryStatus {
    /// Accepted by the server.
    Sent,
    /// Delivered to recipients.
    Delivered,
    /// Delivery failed.
    Failed,
    /// Status not known to this client.
    Other(String),
}

impl From<String> for DeliveryStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "sent" => Self::Sent,
            "delivered" => Self::Delivered,
            "failed" => Self::Failed,
            _ => Self::Other(value),
        }
    }
}

impl From<DeliveryStatus> for String {
    fn from(status: DeliveryStatus) -> Self {
        match status {
            DeliveryStatus::Sent => "sent".to_string(),
            DeliveryStatus::Delivered => "delivered".to_string(),
            DeliveryStatus::Failed => "failed".to_string(),
            DeliveryStatus::Other(other) => other,
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sent => f.write_str("sent"),
            Self::Delivered => f.write_str("delivered"),
            Self::Failed => f.write_str("failed"),
            Self::Other(other) => f.write_str(other),
        }
    }
}

/// A chat message as delivered on `/topic/messages/{roomId}` or returned by
/// the history endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Server-assigned id. `None` for sends not yet confirmed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MessageId>,
    /// Room the message belongs to.
    pub chat_room_id: RoomId,
    /// Sender's user id.
    pub sender_id: UserId,
    /// Sender's display name, when the server includes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    /// Message text.
    #[serde(default)]
    pub content: String,
    /// Server timestamp (ISO-8601, as sent by the backend).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Delivery status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DeliveryStatus>,
    /// Event type. `None` is treated as [`MessageKind::Chat`].
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<MessageKind>,
}

impl Message {
    /// Event type, defaulting to [`MessageKind::Chat`].
    pub fn kind(&self) -> MessageKind {
        self.kind.unwrap_or(MessageKind::Chat)
    }
}

/// Typing notice, both as published to `/app/typing/{roomId}` and as
/// delivered on `/topic/typing/{roomId}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingNotice {
    /// User who is typing.
    pub sender_id: UserId,
    /// Display name of that user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    /// Room the notice is for. The topic's room applies when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_room_id: Option<RoomId>,
    /// Event type; the server stamps `TYPING` on relayed notices.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<MessageKind>,
}

/// Body published to `/app/sendMessage`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    /// Target room.
    pub chat_room_id: RoomId,
    /// Local user id.
    pub sender_id: UserId,
    /// Local user's display name.
    pub sender_name: String,
    /// Trimmed, non-empty message text.
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_parses_backend_json() {
        let json = r#"{
            "id": 12,
            "chatRoomId": 42,
            "senderId": 3,
            "senderName": "alice",
            "content": "hi",
            "timestamp": "2024-05-01T10:00:00",
            "status": "sent",
            "type": "CHAT"
        }"#;

        let message: Message = serde_json::from_str(json).unwrap();
        assert_eq!(message.id, Some(12));
        assert_eq!(message.chat_room_id, 42);
        assert_eq!(message.sender_name.as_deref(), Some("alice"));
        assert_eq!(message.status, Some(DeliveryStatus::Sent));
        assert_eq!(message.kind(), MessageKind::Chat);
    }

    #[test]
    fn message_tolerates_nulls_and_missing_fields() {
        let json = r#"{"id":null,"chatRoomId":1,"senderId":2,"senderName":null,"content":"x"}"#;

        let message: Message = serde_json::from_str(json).unwrap();
        assert_eq!(message.id, None);
        assert_eq!(message.sender_name, None);
        assert_eq!(message.timestamp, None);
        assert_eq!(message.kind(), MessageKind::Chat);
    }

    #[test]
    fn unknown_status_is_preserved() {
        let json = r#"{"chatRoomId":1,"senderId":2,"content":"x","status":"read"}"#;

        let message: Message = serde_json::from_str(json).unwrap();
        assert_eq!(message.status, Some(DeliveryStatus::Other("read".into())));

        let out = serde_json::to_value(&message).unwrap();
        assert_eq!(out["status"], "read");
    }

    #[test]
    fn message_without_room_is_rejected() {
        let json = r#"{"senderId":2,"content":"x"}"#;
        assert!(serde_json::from_str::<Message>(json).is_err());
    }

    #[test]
    fn outgoing_message_uses_camel_case() {
        let body = OutgoingMessage {
            chat_room_id: 5,
            sender_id: 1,
            sender_name: "alice".into(),
            content: "hello".into(),
        };

        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "chatRoomId": 5,
                "senderId": 1,
                "senderName": "alice",
                "content": "hello"
            })
        );
    }

    #[test]
    fn typing_notice_omits_unset_type() {
        let notice = TypingNotice {
            sender_id: 1,
            sender_name: Some("alice".into()),
            chat_room_id: Some(5),
            kind: None,
        };

        let value = serde_json::to_value(&notice).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "senderId": 1, "senderName": "alice", "chatRoomId": 5 })
        );
    }
}
