//! Wire protocol
//!
//! Murmur talks to the chat backend with STOMP 1.2 frames carried over a
//! WebSocket. Frame bodies are UTF-8 JSON objects.
//!
//! # Components
//!
//! - [`Frame`] / [`Packet`]: STOMP frames and heart-beats, with the text codec
//! - [`HeartBeat`]: `heart-beat` header parsing and interval negotiation
//! - [`Topic`]: inbound subscription destinations (per room)
//! - [`payloads`]: JSON shapes for messages, typing notices, rooms and users
//!
//! This crate is pure data and codecs. It performs no I/O.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod destination;
pub mod errors;
pub mod frame;
pub mod heartbeat;
pub mod payloads;

pub use destination::{SEND_MESSAGE_DESTINATION, Topic, TopicKind, typing_destination};
pub use errors::ProtocolError;
pub use frame::{Command, Frame, Packet, decode_packets, decode_packets_prefix};
pub use heartbeat::{HeartBeat, NegotiatedHeartBeat};

/// Numeric chat room identifier (server-assigned).
pub type RoomId = u64;

/// Numeric user identifier (server-assigned).
pub type UserId = u64;

/// Numeric message identifier (server-assigned on persistence).
pub type MessageId = u64;
