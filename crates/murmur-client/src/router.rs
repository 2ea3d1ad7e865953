//! Inbound event routing.
//!
//! Turns a delivered `MESSAGE` frame into a room-scoped [`InboundEvent`], or
//! drops it. Every frame is handled on its own: a body that fails to parse
//! is dropped and logged, and the next frame is routed normally.
//!
//! Events are only forwarded for the current room. Frames for a room that is
//! no longer active (in flight while the user switched rooms) are dropped.

use murmur_proto::{
    Frame, ProtocolError, RoomId, Topic, TopicKind,
    payloads::{Message, MessageKind, TypingNotice},
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::subscription::SubscriptionRegistry;

/// A frame resolved to something the room state understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// Chat event for the current room
    Message(Message),
    /// Someone is typing in the current room
    Typing {
        /// Room the notice is for
        room_id: RoomId,
        /// Notice body
        notice: TypingNotice,
    },
}

/// Why a frame was not forwarded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// Neither the destination nor the subscription id maps to a room topic
    #[error("unknown destination {0:?}")]
    UnknownDestination(String),

    /// Body does not match the topic's payload shape
    #[error("malformed body on {topic}: {error}")]
    Malformed {
        /// Topic the frame arrived on
        topic: Topic,
        /// Decode failure
        error: ProtocolError,
    },

    /// Event belongs to a room that is not current
    #[error("event for room {room_id} while current room is {current:?}")]
    RoomMismatch {
        /// Room named by the event
        room_id: RoomId,
        /// Current room at routing time
        current: Option<RoomId>,
    },
}

/// Outcome of routing one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    /// Forward to room state
    Event(InboundEvent),
    /// Discarded
    Dropped(DropReason),
}

/// Route a delivered frame against the current room.
///
/// The topic comes from the `destination` header, falling back to the
/// `subscription` header resolved through `subscriptions`.
pub fn route(
    frame: &Frame,
    current_room: Option<RoomId>,
    subscriptions: &SubscriptionRegistry,
) -> Routed {
    let topic = frame.destination().and_then(Topic::parse).or_else(|| {
        frame.header("subscription").and_then(|id| subscriptions.topic_for(id))
    });

    let Some(topic) = topic else {
        let destination = frame.destination().unwrap_or_default().to_string();
        warn!(%destination, "dropping frame for unknown destination");
        return Routed::Dropped(DropReason::UnknownDestination(destination));
    };

    let routed = match topic.kind {
        TopicKind::Messages => route_message(frame, topic, current_room),
        TopicKind::Typing => route_typing(frame, topic, current_room),
    };

    match &routed {
        Routed::Dropped(reason @ DropReason::Malformed { .. }) => {
            warn!(%reason, "dropping frame");
        },
        Routed::Dropped(reason) => debug!(%reason, "dropping frame"),
        Routed::Event(_) => {},
    }

    routed
}

fn route_message(frame: &Frame, topic: Topic, current_room: Option<RoomId>) -> Routed {
    let message: Message = match frame.json() {
        Ok(message) => message,
        Err(error) => return Routed::Dropped(DropReason::Malformed { topic, error }),
    };

    let room_id = message.chat_room_id;
    let event = if message.kind() == MessageKind::Typing {
        InboundEvent::Typing {
            room_id,
            notice: TypingNotice {
                sender_id: message.sender_id,
                sender_name: message.sender_name,
                chat_room_id: Some(room_id),
                kind: Some(MessageKind::Typing),
            },
        }
    } else {
        InboundEvent::Message(message)
    };

    guard(room_id, current_room, event)
}

fn route_typing(frame: &Frame, topic: Topic, current_room: Option<RoomId>) -> Routed {
    let notice: TypingNotice = match frame.json() {
        Ok(notice) => notice,
        Err(error) => return Routed::Dropped(DropReason::Malformed { topic, error }),
    };

    let room_id = notice.chat_room_id.unwrap_or(topic.room_id);
    guard(room_id, current_room, InboundEvent::Typing { room_id, notice })
}

fn guard(room_id: RoomId, current: Option<RoomId>, event: InboundEvent) -> Routed {
    if current == Some(room_id) {
        Routed::Event(event)
    } else {
        Routed::Dropped(DropReason::RoomMismatch { room_id, current })
    }
}

#[cfg(test)]
mod tests {
    use murmur_proto::Command;

    use super::*;

    fn frame(destination: &str, body: &str) -> Frame {
        Frame::new(Command::Message)
            .with_header("destination", destination)
            .with_header("subscription", "sub-0")
            .with_body(body.to_string())
    }

    #[test]
    fn message_for_current_room_is_forwarded() {
        let registry = SubscriptionRegistry::new();
        let frame = frame(
            "/topic/messages/42",
            r#"{"id":1,"chatRoomId":42,"senderId":2,"senderName":"bob","content":"hi"}"#,
        );

        match route(&frame, Some(42), &registry) {
            Routed::Event(InboundEvent::Message(message)) => {
                assert_eq!(message.content, "hi");
                assert_eq!(message.id, Some(1));
            },
            other => panic!("expected message, got {other:?}"),
        }
    }

    #[test]
    fn message_for_other_room_is_dropped() {
        let registry = SubscriptionRegistry::new();
        let frame = frame("/topic/messages/42", r#"{"chatRoomId":42,"senderId":2,"content":"hi"}"#);

        assert_eq!(
            route(&frame, Some(7), &registry),
            Routed::Dropped(DropReason::RoomMismatch { room_id: 42, current: Some(7) })
        );
        assert!(matches!(route(&frame, None, &registry), Routed::Dropped(_)));
    }

    #[test]
    fn guard_uses_body_room_not_topic_room() {
        let registry = SubscriptionRegistry::new();
        // Delivered on room 7's topic but names room 8
        let frame = frame("/topic/messages/7", r#"{"chatRoomId":8,"senderId":2,"content":"x"}"#);

        assert!(matches!(
            route(&frame, Some(7), &registry),
            Routed::Dropped(DropReason::RoomMismatch { room_id: 8, .. })
        ));
    }

    #[test]
    fn typing_body_on_message_topic_is_typing() {
        let registry = SubscriptionRegistry::new();
        let frame = frame(
            "/topic/messages/5",
            r#"{"chatRoomId":5,"senderId":3,"senderName":"carol","type":"TYPING"}"#,
        );

        match route(&frame, Some(5), &registry) {
            Routed::Event(InboundEvent::Typing { room_id, notice }) => {
                assert_eq!(room_id, 5);
                assert_eq!(notice.sender_id, 3);
                assert_eq!(notice.sender_name.as_deref(), Some("carol"));
            },
            other => panic!("expected typing, got {other:?}"),
        }
    }

    #[test]
    fn typing_without_room_uses_topic_room() {
        let registry = SubscriptionRegistry::new();
        let frame = frame("/topic/typing/5", r#"{"senderId":3,"senderName":"carol"}"#);

        assert!(matches!(
            route(&frame, Some(5), &registry),
            Routed::Event(InboundEvent::Typing { room_id: 5, .. })
        ));
    }

    #[test]
    fn malformed_body_is_dropped() {
        let registry = SubscriptionRegistry::new();
        let frame = frame("/topic/messages/5", "not json");

        assert!(matches!(
            route(&frame, Some(5), &registry),
            Routed::Dropped(DropReason::Malformed { .. })
        ));
    }

    #[test]
    fn unknown_destination_is_dropped() {
        let registry = SubscriptionRegistry::new();
        let frame = frame("/topic/presence", "{}");

        assert_eq!(
            route(&frame, Some(5), &registry),
            Routed::Dropped(DropReason::UnknownDestination("/topic/presence".into()))
        );
    }

    #[test]
    fn subscription_id_resolves_missing_destination() {
        let mut registry = SubscriptionRegistry::new();
        registry.set_active_room(Some(5), true);

        let frame = Frame::new(Command::Message)
            .with_header("subscription", "sub-0")
            .with_body(r#"{"chatRoomId":5,"senderId":2,"content":"hi"}"#.to_string());

        assert!(matches!(
            route(&frame, Some(5), &registry),
            Routed::Event(InboundEvent::Message(_))
        ));
    }
}
