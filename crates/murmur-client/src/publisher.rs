//! Outbound publishing.
//!
//! Builds `SEND` frames for chat messages and typing notices. Nothing is
//! queued: while disconnected both operations do nothing and return `None`.

use murmur_proto::{
    Command, Frame, RoomId, SEND_MESSAGE_DESTINATION, UserId,
    payloads::{OutgoingMessage, TypingNotice},
    typing_destination,
};
use tracing::debug;

use crate::error::{ClientError, ValidationError};

/// Trim `content` and reject it if nothing is left.
///
/// # Errors
///
/// - `ValidationError::EmptyContent` if `content` is empty or whitespace
pub fn validate_content(content: &str) -> Result<&str, ValidationError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyContent);
    }
    Ok(trimmed)
}

/// Chat message to `/app/sendMessage`.
///
/// Content is validated before the connection is considered, so empty input
/// is reported even while disconnected.
///
/// # Errors
///
/// - `ClientError::Validation` if the trimmed content is empty
/// - `ClientError::Protocol` if the body cannot be encoded
pub fn send_message(
    connected: bool,
    room_id: RoomId,
    sender_id: UserId,
    sender_name: &str,
    content: &str,
) -> Result<Option<Frame>, ClientError> {
    let content = validate_content(content)?;
    if !connected {
        debug!(room_id, "not connected, message not sent");
        return Ok(None);
    }

    let body = OutgoingMessage {
        chat_room_id: room_id,
        sender_id,
        sender_name: sender_name.to_string(),
        content: content.to_string(),
    };
    let frame = Frame::new(Command::Send)
        .with_header("destination", SEND_MESSAGE_DESTINATION)
        .with_json(&body)?;
    Ok(Some(frame))
}

/// Typing notice to `/app/typing/{roomId}`. Not rate limited.
///
/// # Errors
///
/// - `ClientError::Protocol` if the body cannot be encoded
pub fn send_typing(
    connected: bool,
    room_id: RoomId,
    user_id: UserId,
    user_name: &str,
) -> Result<Option<Frame>, ClientError> {
    if !connected {
        debug!(room_id, "not connected, typing notice not sent");
        return Ok(None);
    }

    let body = TypingNotice {
        sender_id: user_id,
        sender_name: Some(user_name.to_string()),
        chat_room_id: Some(room_id),
        kind: None,
    };
    let frame = Frame::new(Command::Send)
        .with_header("destination", typing_destination(room_id))
        .with_json(&body)?;
    Ok(Some(frame))
}
