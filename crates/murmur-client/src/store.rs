//! Room and message state.
//!
//! Holds the room list, the current room, the current room's message
//! sequence, who is typing in it, and the online user list. Messages are kept
//! in insertion order and never sorted.
//!
//! # Invariants
//!
//! - A room id appears at most once in the room list
//! - Messages always belong to the current room; switching rooms clears them
//! - The typing set never contains the local user

use std::{collections::BTreeMap, ops::Sub, time::Duration};

use murmur_proto::{
    MessageId, RoomId, UserId,
    payloads::{ChatRoom, Message, User},
};
use tracing::debug;

/// A user currently typing in the current room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypingUser {
    /// User id
    pub user_id: UserId,
    /// Display name, when the notice carried one
    pub name: Option<String>,
}

#[derive(Debug, Clone)]
struct TypingEntry<I> {
    name: Option<String>,
    last_seen: I,
}

/// Chat state for one signed-in user.
#[derive(Debug, Clone)]
pub struct ChatStore<I> {
    local_user: UserId,
    rooms: Vec<ChatRoom>,
    current_room: Option<ChatRoom>,
    messages: Vec<Message>,
    typing: BTreeMap<UserId, TypingEntry<I>>,
    online_users: Vec<User>,
}

impl<I> ChatStore<I>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    /// Empty store for `local_user`.
    pub fn new(local_user: UserId) -> Self {
        Self {
            local_user,
            rooms: Vec::new(),
            current_room: None,
            messages: Vec::new(),
            typing: BTreeMap::new(),
            online_users: Vec::new(),
        }
    }

    /// Known rooms in arrival order.
    pub fn rooms(&self) -> &[ChatRoom] {
        &self.rooms
    }

    /// Room by id.
    pub fn room(&self, room_id: RoomId) -> Option<&ChatRoom> {
        self.rooms.iter().find(|room| room.id == room_id)
    }

    /// Current room.
    pub fn current_room(&self) -> Option<&ChatRoom> {
        self.current_room.as_ref()
    }

    /// Current room id.
    pub fn current_room_id(&self) -> Option<RoomId> {
        self.current_room.as_ref().map(|room| room.id)
    }

    /// Messages of the current room in insertion order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Users typing in the current room, ordered by id.
    pub fn typing_users(&self) -> Vec<TypingUser> {
        self.typing
            .iter()
            .map(|(user_id, entry)| TypingUser { user_id: *user_id, name: entry.name.clone() })
            .collect()
    }

    /// True if `user_id` is in the typing set.
    pub fn is_typing(&self, user_id: UserId) -> bool {
        self.typing.contains_key(&user_id)
    }

    /// Online users as last loaded.
    pub fn online_users(&self) -> &[User] {
        &self.online_users
    }

    /// Replace the room list. Duplicate ids keep their first occurrence.
    pub fn set_rooms(&mut self, rooms: Vec<ChatRoom>) {
        self.rooms.clear();
        for room in rooms {
            if self.room(room.id).is_none() {
                self.rooms.push(room);
            }
        }
    }

    /// Append a room unless its id is already known. Returns whether it was
    /// added.
    pub fn add_room(&mut self, room: ChatRoom) -> bool {
        if self.room(room.id).is_some() {
            return false;
        }
        self.rooms.push(room);
        true
    }

    /// Make `room` current. Clears messages and typing users.
    pub fn set_current_room(&mut self, room: Option<ChatRoom>) {
        self.current_room = room;
        self.messages.clear();
        self.typing.clear();
    }

    /// Replace the message sequence if `room_id` is still current.
    ///
    /// Responses for a room the user already left are discarded. Returns
    /// whether the list was applied.
    pub fn set_messages(&mut self, room_id: RoomId, messages: Vec<Message>) -> bool {
        if self.current_room_id() != Some(room_id) {
            debug!(room_id, current = ?self.current_room_id(), "discarding stale messages");
            return false;
        }
        self.messages = messages;
        true
    }

    /// Append to the current room's sequence.
    pub fn append_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Apply fetched history without losing live messages that raced it.
    ///
    /// Like [`Self::set_messages`], but messages appended since the room was
    /// selected survive when the history does not already contain them (by
    /// id). Messages without an id are always kept.
    pub fn reconcile_history(&mut self, room_id: RoomId, history: Vec<Message>) -> bool {
        let live = std::mem::take(&mut self.messages);
        if !self.set_messages(room_id, history) {
            self.messages = live;
            return false;
        }

        let known: Vec<MessageId> = self.messages.iter().filter_map(|m| m.id).collect();
        self.messages.extend(
            live.into_iter().filter(|message| message.id.is_none_or(|id| !known.contains(&id))),
        );
        true
    }

    /// Record that `user_id` is typing. The local user is ignored.
    ///
    /// Returns true if the user was not typing before.
    pub fn mark_typing(&mut self, user_id: UserId, name: Option<String>, now: I) -> bool {
        if user_id == self.local_user {
            return false;
        }
        self.typing.insert(user_id, TypingEntry { name, last_seen: now }).is_none()
    }

    /// Remove `user_id` from the typing set. Returns whether it was present.
    pub fn clear_typing(&mut self, user_id: UserId) -> bool {
        self.typing.remove(&user_id).is_some()
    }

    /// Drop typing users not seen within `window`. Returns the removed ids.
    pub fn expire_typing(&mut self, now: I, window: Duration) -> Vec<UserId> {
        let expired: Vec<UserId> = self
            .typing
            .iter()
            .filter(|(_, entry)| now - entry.last_seen >= window)
            .map(|(user_id, _)| *user_id)
            .collect();

        for user_id in &expired {
            self.typing.remove(user_id);
        }
        expired
    }

    /// Replace the online user list.
    pub fn set_online_users(&mut self, users: Vec<User>) {
        self.online_users = users;
    }
}

#[cfg(test)]
mod tests {
    use murmur_proto::payloads::RoomKind;

    use super::*;

    const ME: UserId = 1;

    fn room(id: RoomId, name: &str) -> ChatRoom {
        ChatRoom {
            id,
            name: name.to_string(),
            kind: RoomKind::Group,
            created_by: None,
            created_at: None,
        }
    }

    fn message(id: Option<MessageId>, room_id: RoomId, content: &str) -> Message {
        Message {
            id,
            chat_room_id: room_id,
            sender_id: 2,
            sender_name: None,
            content: content.to_string(),
            timestamp: None,
            status: None,
            kind: None,
        }
    }

    fn store() -> ChatStore<Duration> {
        ChatStore::new(ME)
    }

    #[test]
    fn set_rooms_keeps_first_duplicate() {
        let mut store = store();
        store.set_rooms(vec![room(1, "a"), room(2, "b"), room(1, "dup")]);

        assert_eq!(store.rooms().len(), 2);
        assert_eq!(store.room(1).map(|r| r.name.as_str()), Some("a"));
    }

    #[test]
    fn add_room_rejects_known_id() {
        let mut store = store();
        assert!(store.add_room(room(1, "a")));
        assert!(!store.add_room(room(1, "again")));
        assert_eq!(store.rooms().len(), 1);
    }

    #[test]
    fn switching_rooms_clears_messages_and_typing() {
        let mut store = store();
        store.set_current_room(Some(room(1, "a")));
        store.append_message(message(Some(1), 1, "hi"));
        store.mark_typing(2, None, Duration::ZERO);

        store.set_current_room(Some(room(2, "b")));
        assert!(store.messages().is_empty());
        assert!(store.typing_users().is_empty());
    }

    #[test]
    fn append_leaves_rooms_and_typing_untouched() {
        let mut store = store();
        store.set_rooms(vec![room(1, "a")]);
        store.set_current_room(Some(room(1, "a")));
        store.mark_typing(2, Some("bob".into()), Duration::ZERO);

        store.append_message(message(Some(1), 1, "hi"));
        store.append_message(message(Some(2), 1, "again"));

        assert_eq!(store.rooms().len(), 1);
        assert_eq!(store.typing_users(), vec![TypingUser { user_id: 2, name: Some("bob".into()) }]);
        let contents: Vec<_> = store.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["hi", "again"]);
    }

    #[test]
    fn stale_messages_are_discarded() {
        let mut store = store();
        store.set_current_room(Some(room(2, "b")));

        assert!(!store.set_messages(1, vec![message(Some(1), 1, "old")]));
        assert!(store.messages().is_empty());

        assert!(store.set_messages(2, vec![message(Some(5), 2, "new")]));
        assert_eq!(store.messages().len(), 1);
    }

    #[test]
    fn history_keeps_live_messages_it_does_not_contain() {
        let mut store = store();
        store.set_current_room(Some(room(42, "x")));
        store.append_message(message(Some(10), 42, "live, also in history"));
        store.append_message(message(Some(11), 42, "live only"));

        let history = vec![message(Some(9), 42, "old"), message(Some(10), 42, "live, also in history")];
        assert!(store.reconcile_history(42, history));

        let ids: Vec<_> = store.messages().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![Some(9), Some(10), Some(11)]);
    }

    #[test]
    fn stale_history_leaves_live_messages() {
        let mut store = store();
        store.set_current_room(Some(room(2, "b")));
        store.append_message(message(Some(1), 2, "live"));

        assert!(!store.reconcile_history(42, vec![message(Some(9), 42, "old")]));
        assert_eq!(store.messages().len(), 1);
        assert_eq!(store.messages()[0].content, "live");
    }

    #[test]
    fn typing_is_a_set() {
        let mut store = store();
        assert!(store.mark_typing(2, None, Duration::ZERO));
        assert!(!store.mark_typing(2, None, Duration::from_secs(1)));
        assert_eq!(store.typing_users().len(), 1);

        assert!(store.clear_typing(2));
        assert!(!store.clear_typing(2));
    }

    #[test]
    fn local_user_never_typing() {
        let mut store = store();
        assert!(!store.mark_typing(ME, None, Duration::ZERO));
        assert!(!store.is_typing(ME));
    }

    #[test]
    fn typing_expires_after_window() {
        let mut store = store();
        let window = Duration::from_secs(3);
        store.mark_typing(2, None, Duration::ZERO);
        store.mark_typing(3, None, Duration::from_secs(2));

        assert!(store.expire_typing(Duration::from_secs(2), window).is_empty());
        assert_eq!(store.expire_typing(Duration::from_secs(3), window), vec![2]);
        assert!(store.is_typing(3));

        // Refreshing postpones expiry
        store.mark_typing(3, None, Duration::from_secs(4));
        assert!(store.expire_typing(Duration::from_secs(6), window).is_empty());
        assert_eq!(store.expire_typing(Duration::from_secs(7), window), vec![3]);
    }
}
