//! JSON payload shapes.
//!
//! Field names follow the backend's camelCase JSON. Optional fields tolerate
//! both absence and `null`, since the backend serializes unset values as
//! `null`.
//!
//! - [`chat`]: frame bodies exchanged over the messaging transport
//! - [`directory`]: rooms, users and auth sessions from the request/response API

pub mod chat;
pub mod directory;

pub use chat::{DeliveryStatus, Message, MessageKind, OutgoingMessage, TypingNotice};
pub use directory::{AuthSession, ChatRoom, CreateRoomRequest, RoomKind, User};
