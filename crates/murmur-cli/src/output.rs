//! Plain-text rendering of chat state and events.

use murmur_client::{ChatSnapshot, SyncEvent, TypingUser};
use murmur_proto::payloads::{ChatRoom, Message, MessageKind, User};

/// One message line, e.g. `[12:30] bob: hi`.
pub fn message(message: &Message) -> String {
    let sender = message
        .sender_name
        .clone()
        .unwrap_or_else(|| format!("user {}", message.sender_id));
    let time = message.timestamp.as_deref().and_then(clock).map(|t| format!("[{t}] "));
    let time = time.unwrap_or_default();

    match message.kind() {
        MessageKind::Join => format!("{time}* {sender} joined"),
        MessageKind::Leave => format!("{time}* {sender} left"),
        MessageKind::Chat | MessageKind::Typing => format!("{time}{sender}: {}", message.content),
    }
}

/// `HH:MM` from an ISO-8601 timestamp such as `2024-05-01T12:30:05`.
fn clock(timestamp: &str) -> Option<&str> {
    let (_, time) = timestamp.split_once('T')?;
    time.get(..5)
}

/// One room line, e.g. `#7 general (group)`.
pub fn room(room: &ChatRoom) -> String {
    let kind = format!("{:?}", room.kind).to_lowercase();
    format!("#{} {} ({kind})", room.id, room.name)
}

/// One user line.
pub fn user(user: &User) -> String {
    if user.status.is_empty() {
        format!("{} {}", user.id, user.username)
    } else {
        format!("{} {} [{}]", user.id, user.username, user.status.to_lowercase())
    }
}

fn typing(user: &TypingUser) -> String {
    match &user.name {
        Some(name) => format!("* {name} is typing..."),
        None => format!("* user {} is typing...", user.user_id),
    }
}

/// Header line followed by one line per entry.
fn listing(title: &str, entries: impl Iterator<Item = String>) -> Vec<String> {
    let mut lines = vec![format!("{title}:")];
    lines.extend(entries.map(|entry| format!("  {entry}")));
    if lines.len() == 1 {
        lines.push("  (none)".to_string());
    }
    lines
}

/// Lines to print for an event. State-wide events read the snapshot.
pub fn event(event: &SyncEvent, snapshot: &ChatSnapshot) -> Vec<String> {
    match event {
        SyncEvent::Connected => vec!["connected".to_string()],
        SyncEvent::ConnectionLost { reason } => {
            vec![format!("connection lost ({reason}), reconnecting")]
        },
        SyncEvent::Disconnected => vec!["disconnected".to_string()],
        SyncEvent::ServerError { diagnostic } => vec![format!("server error: {diagnostic}")],
        SyncEvent::MessageReceived(m) => vec![message(m)],
        SyncEvent::TypingStarted { user, .. } => vec![typing(user)],
        SyncEvent::RoomSelected { room_id: Some(_) } => match &snapshot.current_room {
            Some(current) => vec![format!("joined {}", room(current))],
            None => vec![],
        },
        SyncEvent::RoomSelected { room_id: None } => vec!["left room".to_string()],
        SyncEvent::HistoryLoaded { .. } => snapshot.messages.iter().map(message).collect(),
        SyncEvent::RoomsUpdated => listing("rooms", snapshot.rooms.iter().map(room)),
        SyncEvent::OnlineUsersUpdated => listing("online", snapshot.online_users.iter().map(user)),
        SyncEvent::TypingStopped { .. } => vec![],
    }
}
