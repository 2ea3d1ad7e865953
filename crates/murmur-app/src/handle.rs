//! UI-facing handle to a running [`crate::Runtime`].

use murmur_client::{ChatSnapshot, ClientError, RoomId, SyncEvent, UserId, publisher};
use murmur_proto::payloads::{ChatRoom, CreateRoomRequest, RoomKind, User};
use tokio::sync::{broadcast, mpsc, oneshot, watch};

use crate::{ApiError, RuntimeError};

pub(crate) type Reply<T, E> = oneshot::Sender<Result<T, E>>;

/// Requests queued for the runtime task.
#[derive(Debug)]
pub(crate) enum Command {
    Connect,
    Disconnect,
    RefreshRooms,
    RefreshOnlineUsers,
    SelectRoom { room_id: Option<RoomId>, reply: Reply<(), ClientError> },
    SendMessage { content: String, reply: Reply<(), ClientError> },
    SendTyping { reply: Reply<(), ClientError> },
    CreateRoom { request: CreateRoomRequest, reply: Reply<ChatRoom, ApiError> },
    SearchUsers { query: String, reply: Reply<Vec<User>, ApiError> },
    Shutdown,
}

/// Cloneable handle for UI code.
///
/// Commands are queued to the runtime task and complete asynchronously.
/// Outcomes arrive on the event bus ([`subscribe`](Self::subscribe)) and in
/// the published state ([`snapshot`](Self::snapshot)).
#[derive(Debug, Clone)]
pub struct SyncHandle {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<SyncEvent>,
    snapshot: watch::Receiver<ChatSnapshot>,
}

impl SyncHandle {
    pub(crate) fn new(
        commands: mpsc::Sender<Command>,
        events: broadcast::Sender<SyncEvent>,
        snapshot: watch::Receiver<ChatSnapshot>,
    ) -> Self {
        Self { commands, events, snapshot }
    }

    /// Start connecting. Progress is reported as [`SyncEvent::Connected`] or
    /// [`SyncEvent::ConnectionLost`].
    pub async fn connect(&self) -> Result<(), RuntimeError> {
        self.queue(Command::Connect).await
    }

    /// Disconnect and stop reconnecting.
    pub async fn disconnect(&self) -> Result<(), RuntimeError> {
        self.queue(Command::Disconnect).await
    }

    /// Reload the room list from the server.
    pub async fn refresh_rooms(&self) -> Result<(), RuntimeError> {
        self.queue(Command::RefreshRooms).await
    }

    /// Reload the online user list from the server.
    pub async fn refresh_online_users(&self) -> Result<(), RuntimeError> {
        self.queue(Command::RefreshOnlineUsers).await
    }

    /// Make `room_id` the current room, or leave the current room with
    /// `None`. History for the new room is fetched in the background.
    pub async fn select_room(&self, room_id: Option<RoomId>) -> Result<(), RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.queue(Command::SelectRoom { room_id, reply }).await?;
        Self::await_reply(rx).await?.map_err(RuntimeError::from)
    }

    /// Send a chat message to the current room.
    ///
    /// Content is validated before anything is queued, so blank input fails
    /// immediately. While disconnected the message is silently dropped.
    pub async fn send_message(&self, content: &str) -> Result<(), RuntimeError> {
        let content = publisher::validate_content(content)?.to_string();
        let (reply, rx) = oneshot::channel();
        self.queue(Command::SendMessage { content, reply }).await?;
        Self::await_reply(rx).await?.map_err(RuntimeError::from)
    }

    /// Tell the current room that the local user is typing.
    pub async fn send_typing(&self) -> Result<(), RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.queue(Command::SendTyping { reply }).await?;
        Self::await_reply(rx).await?.map_err(RuntimeError::from)
    }

    /// Create a room. On success it joins the room list.
    pub async fn create_room(
        &self,
        name: impl Into<String>,
        kind: RoomKind,
        participant_ids: Vec<UserId>,
    ) -> Result<ChatRoom, RuntimeError> {
        let request = CreateRoomRequest { name: name.into(), kind, participant_ids };
        let (reply, rx) = oneshot::channel();
        self.queue(Command::CreateRoom { request, reply }).await?;
        Self::await_reply(rx).await?.map_err(RuntimeError::from)
    }

    /// Search users by name.
    pub async fn search_users(&self, query: impl Into<String>) -> Result<Vec<User>, RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.queue(Command::SearchUsers { query: query.into(), reply }).await?;
        Self::await_reply(rx).await?.map_err(RuntimeError::from)
    }

    /// Stop the runtime after a graceful disconnect.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.queue(Command::Shutdown).await
    }

    /// New listener on the event bus. Every listener sees every event sent
    /// after it subscribed.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Latest published state.
    pub fn snapshot(&self) -> ChatSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver that wakes whenever the state changes.
    pub fn watch(&self) -> watch::Receiver<ChatSnapshot> {
        self.snapshot.clone()
    }

    async fn queue(&self, command: Command) -> Result<(), RuntimeError> {
        self.commands.send(command).await.map_err(|_| RuntimeError::Stopped)
    }

    async fn await_reply<T>(rx: oneshot::Receiver<T>) -> Result<T, RuntimeError> {
        rx.await.map_err(|_| RuntimeError::Stopped)
    }
}
