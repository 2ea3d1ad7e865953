//! Rooms, users and authentication results.

use serde::{Deserialize, Serialize};

use crate::{RoomId, UserId};

/// Room visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomKind {
    /// One-to-one conversation.
    Private,
    /// Multi-user room.
    Group,
}

/// A chat room. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRoom {
    /// Room id.
    pub id: RoomId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Room visibility.
    #[serde(rename = "type")]
    pub kind: RoomKind,
    /// Creator's user id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<UserId>,
    /// Creation timestamp (ISO-8601).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Request body for room creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    /// Display name.
    pub name: String,
    /// Room visibility.
    #[serde(rename = "type")]
    pub kind: RoomKind,
    /// Users to add besides the creator.
    pub participant_ids: Vec<UserId>,
}

/// A user as returned by search and presence endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// User id.
    pub id: UserId,
    /// Login name.
    pub username: String,
    /// Email address.
    #[serde(default)]
    pub email: String,
    /// Avatar URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_pic: Option<String>,
    /// Presence status (`online`, `offline`, ...).
    #[serde(default)]
    pub status: String,
}

/// Result of a successful register or login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    /// Bearer token for the API and the messaging handshake.
    pub token: String,
    /// Authenticated user's id.
    pub user_id: UserId,
    /// Authenticated user's login name.
    pub username: String,
    /// Authenticated user's email.
    #[serde(default)]
    pub email: String,
    /// Avatar URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_pic: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_kind_is_lowercase() {
        let room: ChatRoom = serde_json::from_str(
            r#"{"id":1,"name":"general","type":"group","createdBy":3,"createdAt":"2024-05-01T10:00:00"}"#,
        )
        .unwrap();
        assert_eq!(room.kind, RoomKind::Group);
        assert_eq!(room.created_by, Some(3));
    }

    #[test]
    fn create_request_shape() {
        let request =
            CreateRoomRequest { name: "pair".into(), kind: RoomKind::Private, participant_ids: vec![2] };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({ "name": "pair", "type": "private", "participantIds": [2] })
        );
    }

    #[test]
    fn auth_session_tolerates_missing_avatar() {
        let session: AuthSession = serde_json::from_str(
            r#"{"token":"t","userId":9,"username":"bob","email":"b@x","profilePic":null}"#,
        )
        .unwrap();
        assert_eq!(session.user_id, 9);
        assert_eq!(session.profile_pic, None);
    }
}
