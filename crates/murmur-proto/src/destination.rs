//! Destinations on the messaging transport.
//!
//! Inbound topics are room-scoped: `/topic/messages/{roomId}` carries chat
//! events and `/topic/typing/{roomId}` carries typing notices. Outbound sends
//! go to `/app/sendMessage` and `/app/typing/{roomId}`.

use std::fmt;

use crate::RoomId;

/// Destination for outbound chat messages.
pub const SEND_MESSAGE_DESTINATION: &str = "/app/sendMessage";

const MESSAGES_PREFIX: &str = "/topic/messages/";
const TYPING_PREFIX: &str = "/topic/typing/";
const TYPING_SEND_PREFIX: &str = "/app/typing/";

/// Category of a room topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TopicKind {
    /// Chat events (messages, joins, leaves).
    Messages,
    /// Typing notices.
    Typing,
}

/// Inbound topic a client subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Topic {
    /// Topic category.
    pub kind: TopicKind,
    /// Room the topic belongs to.
    pub room_id: RoomId,
}

impl Topic {
    /// Chat event topic for a room.
    pub fn messages(room_id: RoomId) -> Self {
        Self { kind: TopicKind::Messages, room_id }
    }

    /// Typing topic for a room.
    pub fn typing(room_id: RoomId) -> Self {
        Self { kind: TopicKind::Typing, room_id }
    }

    /// Both topics of a room, in subscription order (messages first).
    pub fn for_room(room_id: RoomId) -> [Self; 2] {
        [Self::messages(room_id), Self::typing(room_id)]
    }

    /// Wire destination string.
    pub fn destination(&self) -> String {
        self.to_string()
    }

    /// Parse a destination string. `None` if it is not a room topic.
    pub fn parse(destination: &str) -> Option<Self> {
        if let Some(id) = destination.strip_prefix(MESSAGES_PREFIX) {
            return id.parse().ok().map(Self::messages);
        }
        if let Some(id) = destination.strip_prefix(TYPING_PREFIX) {
            return id.parse().ok().map(Self::typing);
        }
        None
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TopicKind::Messages => write!(f, "{MESSAGES_PREFIX}{}", self.room_id),
            TopicKind::Typing => write!(f, "{TYPING_PREFIX}{}", self.room_id),
        }
    }
}

/// Destination for outbound typing notices in a room.
pub fn typing_destination(room_id: RoomId) -> String {
    format!("{TYPING_SEND_PREFIX}{room_id}")
}
