//! Client events and actions.

use murmur_core::ConnectionState;
use murmur_proto::{
    Packet, ProtocolError, RoomId, UserId,
    payloads::{ChatRoom, Message, User},
};

use crate::store::TypingUser;

/// Events the caller feeds into the client.
///
/// The caller is responsible for:
/// - Reporting transport outcomes and received packets
/// - Driving time forward via ticks
/// - Forwarding application intents (select room, send message, etc.)
/// - Feeding collaborator results back (rooms, history, online users)
///
/// Generic over `I` (Instant type) to support both production
/// (tokio::time::Instant) and virtual time in tests.
#[derive(Debug, Clone)]
pub enum ClientEvent<I = std::time::Instant> {
    /// Application wants to connect.
    Connect,

    /// Application wants to disconnect and stop reconnecting.
    Disconnect,

    /// Transport requested by `OpenTransport` is open.
    TransportOpened,

    /// Transport could not be opened, or failed.
    TransportFailed {
        /// Failure description.
        reason: String,
    },

    /// Transport closed.
    TransportClosed,

    /// Packet received from the server.
    PacketReceived(Packet),

    /// Transport payload that could not be decoded.
    Garbled(ProtocolError),

    /// Time tick for timers (reconnect, heart-beats, typing expiry).
    Tick {
        /// Current time from the environment.
        now: I,
    },

    /// Room list loaded; replaces the current list.
    SetRooms(Vec<ChatRoom>),

    /// A room was created or discovered.
    AddRoom(ChatRoom),

    /// Application selected a room, or cleared the selection.
    SelectRoom(Option<RoomId>),

    /// Message history fetched for a room.
    HistoryLoaded {
        /// Room the history was requested for.
        room_id: RoomId,
        /// Messages in server order.
        messages: Vec<Message>,
    },

    /// Online user list loaded.
    OnlineUsersLoaded(Vec<User>),

    /// Application wants to send a message to the current room.
    SendMessage {
        /// Message text (trimmed before sending).
        content: String,
    },

    /// Local user is typing in the current room.
    SendTyping,
}

/// Notifications for the UI layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Connection established (initially or after a reconnect).
    Connected,

    /// Connection dropped; the client reconnects on its own.
    ConnectionLost {
        /// Why the connection dropped.
        reason: String,
    },

    /// Explicit disconnect completed.
    Disconnected,

    /// Server sent an `ERROR` frame.
    ServerError {
        /// Server diagnostic.
        diagnostic: String,
    },

    /// A message arrived in the current room.
    MessageReceived(Message),

    /// A user started typing in the current room.
    TypingStarted {
        /// Room id.
        room_id: RoomId,
        /// Typing user.
        user: TypingUser,
    },

    /// A user stopped typing (quiescence window elapsed).
    TypingStopped {
        /// Room id.
        room_id: RoomId,
        /// User id.
        user_id: UserId,
    },

    /// Room list changed.
    RoomsUpdated,

    /// Current room changed.
    RoomSelected {
        /// New current room.
        room_id: Option<RoomId>,
    },

    /// History applied to the current room.
    HistoryLoaded {
        /// Room id.
        room_id: RoomId,
        /// Messages now held for the room.
        count: usize,
    },

    /// Online user list changed.
    OnlineUsersUpdated,
}

/// Actions the client produces for the caller to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    /// Open the transport, then report `TransportOpened` or `TransportFailed`.
    OpenTransport,

    /// Close the transport.
    CloseTransport,

    /// Send a packet to the server.
    Send(Packet),

    /// Fetch message history for a room, then report `HistoryLoaded`.
    FetchHistory {
        /// Room to fetch.
        room_id: RoomId,
    },

    /// Publish to the UI.
    Emit(SyncEvent),
}

/// Immutable copy of the chat state, published after every change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSnapshot {
    /// Connection state.
    pub connection: ConnectionState,
    /// Known rooms in arrival order.
    pub rooms: Vec<ChatRoom>,
    /// Current room.
    pub current_room: Option<ChatRoom>,
    /// Messages of the current room in insertion order.
    pub messages: Vec<Message>,
    /// Users typing in the current room.
    pub typing: Vec<TypingUser>,
    /// Online users.
    pub online_users: Vec<User>,
}

impl Default for ChatSnapshot {
    fn default() -> Self {
        Self {
            connection: ConnectionState::Disconnected,
            rooms: Vec::new(),
            current_room: None,
            messages: Vec::new(),
            typing: Vec::new(),
            online_users: Vec::new(),
        }
    }
}
