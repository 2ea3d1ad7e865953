//! Client state machine.
//!
//! The `Client` composes the connection, the subscription registry, the
//! router, the chat store and the publisher. It owns the only connection and
//! is the only place where connection events meet subscription state.

use std::time::Duration;

use murmur_core::{
    Connection, ConnectionAction, ConnectionConfig, ConnectionState, env::Environment,
};
use murmur_proto::{
    Frame, RoomId, UserId,
    payloads::{ChatRoom, Message, TypingNotice},
};
use tracing::{debug, warn};

use crate::{
    error::ClientError,
    event::{ChatSnapshot, ClientAction, ClientEvent, SyncEvent},
    publisher,
    router::{self, InboundEvent, Routed},
    store::{ChatStore, TypingUser},
    subscription::SubscriptionRegistry,
};

/// Time after the last typing notice before a user counts as stopped.
pub const DEFAULT_TYPING_QUIESCENCE: Duration = Duration::from_secs(3);

/// The signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    /// Server-assigned user id.
    pub user_id: UserId,
    /// Name shown to other users.
    pub display_name: String,
}

impl ClientIdentity {
    /// Create an identity.
    pub fn new(user_id: UserId, display_name: impl Into<String>) -> Self {
        Self { user_id, display_name: display_name.into() }
    }
}

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Connection and handshake settings
    pub connection: ConnectionConfig,
    /// Silence after which a typing user is dropped
    pub typing_quiescence: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self { connection: ConnectionConfig::default(), typing_quiescence: DEFAULT_TYPING_QUIESCENCE }
    }
}

/// Chat sync client.
pub struct Client<E: Environment> {
    /// Environment for timing.
    env: E,

    /// Signed-in user.
    identity: ClientIdentity,

    typing_quiescence: Duration,

    connection: Connection<E::Instant>,

    subscriptions: SubscriptionRegistry,

    store: ChatStore<E::Instant>,
}

impl<E: Environment> Client<E> {
    /// Create a disconnected client for `identity`.
    pub fn new(env: E, identity: ClientIdentity, config: ClientConfig) -> Self {
        Self {
            env,
            store: ChatStore::new(identity.user_id),
            identity,
            typing_quiescence: config.typing_quiescence,
            connection: Connection::new(config.connection),
            subscriptions: SubscriptionRegistry::new(),
        }
    }

    /// Signed-in user.
    pub fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    /// Connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// True once the handshake completed and until the link drops.
    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Chat state.
    pub fn store(&self) -> &ChatStore<E::Instant> {
        &self.store
    }

    /// Subscription bookkeeping.
    pub fn subscriptions(&self) -> &SubscriptionRegistry {
        &self.subscriptions
    }

    /// Copy of the current state for the UI.
    pub fn snapshot(&self) -> ChatSnapshot {
        ChatSnapshot {
            connection: self.connection.state(),
            rooms: self.store.rooms().to_vec(),
            current_room: self.store.current_room().cloned(),
            messages: self.store.messages().to_vec(),
            typing: self.store.typing_users(),
            online_users: self.store.online_users().to_vec(),
        }
    }

    /// Process an event and return resulting actions.
    pub fn handle(
        &mut self,
        event: ClientEvent<E::Instant>,
    ) -> Result<Vec<ClientAction>, ClientError> {
        let now = self.env.now();
        match event {
            ClientEvent::Connect => {
                let actions = self.connection.connect()?;
                self.apply(actions)
            },
            ClientEvent::Disconnect => {
                let actions = self.connection.disconnect();
                self.apply(actions)
            },
            ClientEvent::TransportOpened => {
                let actions = self.connection.transport_opened(now)?;
                self.apply(actions)
            },
            ClientEvent::TransportFailed { reason } => {
                let actions = self.connection.transport_failed(reason, now);
                self.apply(actions)
            },
            ClientEvent::TransportClosed => {
                let actions = self.connection.transport_closed(now);
                self.apply(actions)
            },
            ClientEvent::PacketReceived(packet) => {
                let actions = self.connection.handle_packet(packet, now)?;
                self.apply(actions)
            },
            ClientEvent::Garbled(err) => {
                warn!(%err, "dropping undecodable transport payload");
                Ok(vec![])
            },
            ClientEvent::Tick { now } => self.handle_tick(now),
            ClientEvent::SetRooms(rooms) => {
                self.store.set_rooms(rooms);
                Ok(vec![ClientAction::Emit(SyncEvent::RoomsUpdated)])
            },
            ClientEvent::AddRoom(room) => Ok(self.handle_add_room(room)),
            ClientEvent::SelectRoom(room_id) => self.handle_select_room(room_id),
            ClientEvent::HistoryLoaded { room_id, messages } => {
                Ok(self.handle_history(room_id, messages))
            },
            ClientEvent::OnlineUsersLoaded(users) => {
                self.store.set_online_users(users);
                Ok(vec![ClientAction::Emit(SyncEvent::OnlineUsersUpdated)])
            },
            ClientEvent::SendMessage { content } => self.handle_send_message(&content),
            ClientEvent::SendTyping => self.handle_send_typing(),
        }
    }

    /// Translate connection actions, wiring subscription recovery to the
    /// connection lifecycle.
    fn apply(&mut self, actions: Vec<ConnectionAction>) -> Result<Vec<ClientAction>, ClientError> {
        let mut out = Vec::with_capacity(actions.len());

        for action in actions {
            match action {
                ConnectionAction::OpenTransport => out.push(ClientAction::OpenTransport),
                ConnectionAction::CloseTransport => out.push(ClientAction::CloseTransport),
                ConnectionAction::Send(packet) => out.push(ClientAction::Send(packet)),
                ConnectionAction::Established => {
                    out.push(ClientAction::Emit(SyncEvent::Connected));
                    let frames = self.subscriptions.restore();
                    out.extend(self.send_frames(frames)?);
                },
                ConnectionAction::Deliver(frame) => out.extend(self.handle_delivery(&frame)),
                ConnectionAction::Failure { diagnostic } => {
                    out.push(ClientAction::Emit(SyncEvent::ServerError { diagnostic }));
                },
                ConnectionAction::Lost { reason } => {
                    self.subscriptions.invalidate();
                    out.push(ClientAction::Emit(SyncEvent::ConnectionLost { reason }));
                },
                ConnectionAction::Closed => {
                    self.subscriptions.invalidate();
                    out.push(ClientAction::Emit(SyncEvent::Disconnected));
                },
            }
        }

        Ok(out)
    }

    fn handle_delivery(&mut self, frame: &Frame) -> Vec<ClientAction> {
        let current = self.store.current_room_id();
        match router::route(frame, current, &self.subscriptions) {
            Routed::Event(InboundEvent::Message(message)) => self.handle_message(message),
            Routed::Event(InboundEvent::Typing { room_id, notice }) => {
                self.handle_typing(room_id, notice)
            },
            Routed::Dropped(_) => vec![],
        }
    }

    fn handle_message(&mut self, message: Message) -> Vec<ClientAction> {
        let mut actions = Vec::with_capacity(2);

        // A message from someone ends their typing indicator
        if self.store.clear_typing(message.sender_id) {
            actions.push(ClientAction::Emit(SyncEvent::TypingStopped {
                room_id: message.chat_room_id,
                user_id: message.sender_id,
            }));
        }

        self.store.append_message(message.clone());
        actions.push(ClientAction::Emit(SyncEvent::MessageReceived(message)));
        actions
    }

    fn handle_typing(&mut self, room_id: RoomId, notice: TypingNotice) -> Vec<ClientAction> {
        let user = TypingUser { user_id: notice.sender_id, name: notice.sender_name };
        if self.store.mark_typing(user.user_id, user.name.clone(), self.env.now()) {
            return vec![ClientAction::Emit(SyncEvent::TypingStarted { room_id, user })];
        }
        vec![]
    }

    fn handle_tick(&mut self, now: E::Instant) -> Result<Vec<ClientAction>, ClientError> {
        let actions = self.connection.tick(now);
        let mut out = self.apply(actions)?;

        if let Some(room_id) = self.store.current_room_id() {
            for user_id in self.store.expire_typing(now, self.typing_quiescence) {
                out.push(ClientAction::Emit(SyncEvent::TypingStopped { room_id, user_id }));
            }
        }

        Ok(out)
    }

    fn handle_add_room(&mut self, room: ChatRoom) -> Vec<ClientAction> {
        if self.store.add_room(room) {
            vec![ClientAction::Emit(SyncEvent::RoomsUpdated)]
        } else {
            vec![]
        }
    }

    fn handle_select_room(
        &mut self,
        room_id: Option<RoomId>,
    ) -> Result<Vec<ClientAction>, ClientError> {
        if room_id == self.store.current_room_id() {
            return Ok(vec![]);
        }

        let room = match room_id {
            Some(id) => {
                let room = self.store.room(id).ok_or(ClientError::UnknownRoom { room_id: id })?;
                Some(room.clone())
            },
            None => None,
        };

        debug!(?room_id, "selecting room");
        self.store.set_current_room(room);

        let frames = self.subscriptions.set_active_room(room_id, self.connection.is_connected());
        let mut actions = self.send_frames(frames)?;

        actions.push(ClientAction::Emit(SyncEvent::RoomSelected { room_id }));
        if let Some(room_id) = room_id {
            actions.push(ClientAction::FetchHistory { room_id });
        }

        Ok(actions)
    }

    fn handle_history(&mut self, room_id: RoomId, messages: Vec<Message>) -> Vec<ClientAction> {
        if !self.store.reconcile_history(room_id, messages) {
            return vec![];
        }

        let count = self.store.messages().len();
        debug!(room_id, count, "history applied");
        vec![ClientAction::Emit(SyncEvent::HistoryLoaded { room_id, count })]
    }

    fn handle_send_message(&mut self, content: &str) -> Result<Vec<ClientAction>, ClientError> {
        let room_id = self.store.current_room_id().ok_or(ClientError::NoActiveRoom)?;

        // The server echoes the message on the room topic; it is appended then.
        let frame = publisher::send_message(
            self.connection.is_connected(),
            room_id,
            self.identity.user_id,
            &self.identity.display_name,
            content,
        )?;

        self.send_frames(frame.into_iter().collect())
    }

    fn handle_send_typing(&mut self) -> Result<Vec<ClientAction>, ClientError> {
        let room_id = self.store.current_room_id().ok_or(ClientError::NoActiveRoom)?;

        let frame = publisher::send_typing(
            self.connection.is_connected(),
            room_id,
            self.identity.user_id,
            &self.identity.display_name,
        )?;

        self.send_frames(frame.into_iter().collect())
    }

    fn send_frames(&mut self, frames: Vec<Frame>) -> Result<Vec<ClientAction>, ClientError> {
        let now = self.env.now();
        frames
            .into_iter()
            .map(|frame| Ok(ClientAction::Send(self.connection.send(frame, now)?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    };

    use murmur_proto::{Command, Packet, payloads::RoomKind};

    use super::*;

    #[derive(Clone, Default)]
    struct TestEnv {
        millis: Arc<AtomicU64>,
    }

    impl Environment for TestEnv {
        type Instant = Duration;

        fn now(&self) -> Duration {
            Duration::from_millis(self.millis.load(Ordering::SeqCst))
        }
    }

    fn client() -> Client<TestEnv> {
        Client::new(TestEnv::default(), ClientIdentity::new(1, "alice"), ClientConfig::default())
    }

    fn connect(client: &mut Client<TestEnv>) {
        client.handle(ClientEvent::Connect).unwrap();
        client.handle(ClientEvent::TransportOpened).unwrap();
        let connected = Frame::new(Command::Connected).with_header("heart-beat", "0,0");
        client.handle(ClientEvent::PacketReceived(Packet::Frame(connected))).unwrap();
    }

    fn room(id: RoomId) -> ChatRoom {
        ChatRoom { id, name: format!("room-{id}"), kind: RoomKind::Group, created_by: None, created_at: None }
    }

    #[test]
    fn identity_accessors() {
        let client = client();
        assert_eq!(client.identity().user_id, 1);
        assert_eq!(client.connection_state(), ConnectionState::Disconnected);
        assert!(!client.is_connected());
    }

    #[test]
    fn selecting_unknown_room_fails() {
        let mut client = client();
        let result = client.handle(ClientEvent::SelectRoom(Some(9)));
        assert_eq!(result, Err(ClientError::UnknownRoom { room_id: 9 }));
    }

    #[test]
    fn selecting_room_requests_history() {
        let mut client = client();
        connect(&mut client);
        client.handle(ClientEvent::SetRooms(vec![room(3)])).unwrap();

        let actions = client.handle(ClientEvent::SelectRoom(Some(3))).unwrap();
        assert!(actions.contains(&ClientAction::FetchHistory { room_id: 3 }));
        assert!(actions.contains(&ClientAction::Emit(SyncEvent::RoomSelected { room_id: Some(3) })));
        assert_eq!(actions.iter().filter(|a| matches!(a, ClientAction::Send(_))).count(), 2);

        // Re-selecting is a no-op
        assert!(client.handle(ClientEvent::SelectRoom(Some(3))).unwrap().is_empty());
    }

    #[test]
    fn sending_without_room_fails() {
        let mut client = client();
        let result = client.handle(ClientEvent::SendMessage { content: "hi".into() });
        assert_eq!(result, Err(ClientError::NoActiveRoom));
        assert_eq!(client.handle(ClientEvent::SendTyping), Err(ClientError::NoActiveRoom));
    }

    #[test]
    fn send_message_is_not_appended_locally() {
        let mut client = client();
        connect(&mut client);
        client.handle(ClientEvent::SetRooms(vec![room(3)])).unwrap();
        client.handle(ClientEvent::SelectRoom(Some(3))).unwrap();

        let actions = client.handle(ClientEvent::SendMessage { content: " hi ".into() }).unwrap();
        assert_eq!(actions.len(), 1);
        assert!(client.store().messages().is_empty());
    }

    #[test]
    fn garbled_payload_is_ignored() {
        let mut client = client();
        let actions = client
            .handle(ClientEvent::Garbled(murmur_proto::ProtocolError::InvalidUtf8))
            .unwrap();
        assert!(actions.is_empty());
    }

    #[test]
    fn add_room_emits_only_when_new() {
        let mut client = client();
        assert_eq!(
            client.handle(ClientEvent::AddRoom(room(1))).unwrap(),
            vec![ClientAction::Emit(SyncEvent::RoomsUpdated)]
        );
        assert!(client.handle(ClientEvent::AddRoom(room(1))).unwrap().is_empty());
    }

    #[test]
    fn snapshot_reflects_state() {
        let mut client = client();
        connect(&mut client);
        client.handle(ClientEvent::SetRooms(vec![room(1), room(2)])).unwrap();
        client.handle(ClientEvent::SelectRoom(Some(2))).unwrap();

        let snapshot = client.snapshot();
        assert_eq!(snapshot.connection, ConnectionState::Connected);
        assert_eq!(snapshot.rooms.len(), 2);
        assert_eq!(snapshot.current_room.map(|r| r.id), Some(2));
    }
}
