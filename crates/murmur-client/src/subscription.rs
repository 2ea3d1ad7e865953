//! Topic subscription registry.
//!
//! Tracks which room is active and which of its topics are live on the
//! current connection. The registry is the only owner of subscription state:
//! the connection forgets everything on a drop, and the registry re-issues
//! the active room's subscriptions once the connection is established again.
//!
//! At most one room is active, so at most two subscriptions (messages and
//! typing) are live at any time.

use murmur_proto::{Command, Frame, RoomId, Topic};
use tracing::debug;

/// A live subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    /// Client-assigned id (`sub-N`), sent as the STOMP `id` header
    pub id: String,
    /// Subscribed topic
    pub topic: Topic,
}

/// Registry of the active room and its live subscriptions.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    active_room: Option<RoomId>,
    /// In subscription order
    live: Vec<Subscription>,
    next_id: u64,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Room whose topics should be live.
    pub fn active_room(&self) -> Option<RoomId> {
        self.active_room
    }

    /// Live subscriptions in the order they were issued.
    pub fn live(&self) -> &[Subscription] {
        &self.live
    }

    /// True if `topic` is subscribed on the current connection.
    pub fn is_live(&self, topic: Topic) -> bool {
        self.live.iter().any(|sub| sub.topic == topic)
    }

    /// Topic of a subscription id. `None` if not live.
    pub fn topic_for(&self, subscription_id: &str) -> Option<Topic> {
        self.live.iter().find(|sub| sub.id == subscription_id).map(|sub| sub.topic)
    }

    /// Switch the active room.
    ///
    /// Returns the frames to send, in order: `UNSUBSCRIBE` for every live
    /// subscription of the previous room, then `SUBSCRIBE` for the new room's
    /// message topic and typing topic. While disconnected the room is only
    /// recorded; [`Self::restore`] subscribes it later.
    pub fn set_active_room(&mut self, room_id: Option<RoomId>, connected: bool) -> Vec<Frame> {
        if room_id == self.active_room {
            return Vec::new();
        }

        let mut frames: Vec<Frame> = self
            .live
            .drain(..)
            .filter(|_| connected)
            .map(|sub| {
                debug!(id = %sub.id, topic = %sub.topic, "unsubscribing");
                Frame::new(Command::Unsubscribe).with_header("id", sub.id)
            })
            .collect();

        self.active_room = room_id;

        if connected && let Some(room_id) = room_id {
            frames.extend(self.subscribe_room(room_id));
        }

        frames
    }

    /// Re-issue the active room's subscriptions on a fresh connection.
    pub fn restore(&mut self) -> Vec<Frame> {
        self.live.clear();
        match self.active_room {
            Some(room_id) => {
                debug!(room_id, "restoring subscriptions");
                self.subscribe_room(room_id)
            },
            None => Vec::new(),
        }
    }

    /// Forget live subscriptions after the connection dropped. The active
    /// room is kept.
    pub fn invalidate(&mut self) {
        if !self.live.is_empty() {
            debug!(count = self.live.len(), "invalidating subscriptions");
        }
        self.live.clear();
    }

    fn subscribe_room(&mut self, room_id: RoomId) -> Vec<Frame> {
        Topic::for_room(room_id)
            .into_iter()
            .map(|topic| {
                let id = format!("sub-{}", self.next_id);
                self.next_id += 1;
                debug!(%id, %topic, "subscribing");

                let frame = Frame::new(Command::Subscribe)
                    .with_header("id", id.clone())
                    .with_header("destination", topic.destination());
                self.live.push(Subscription { id, topic });
                frame
            })
            .collect()
    }
}
