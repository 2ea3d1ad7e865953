//! Client
//!
//! Action-based chat synchronization state machine. Tracks one active room,
//! keeps its topic subscriptions alive across reconnects, routes inbound
//! frames into room state and publishes outbound messages and typing notices.
//!
//! # Architecture
//!
//! The client follows the same Sans-IO and Action-Based patterns as
//! [`murmur_core`]. It receives events ([`ClientEvent`]), processes them
//! through pure state machine logic, and returns actions ([`ClientAction`]) for
//! the caller to execute.
//!
//! # Components
//!
//! - [`Client`]: Top-level state machine composing the pieces below
//! - [`SubscriptionRegistry`]: Which topics are live for the active room
//! - [`router`]: Maps `MESSAGE` frames to room-scoped events
//! - [`ChatStore`]: Rooms, current room, its messages and typing users
//! - [`publisher`]: Builds outbound `SEND` frames
//! - [`SyncEvent`]: Notifications for the UI layer

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod client;
mod error;
mod event;
pub mod publisher;
pub mod router;
mod store;
mod subscription;

pub use client::{Client, ClientConfig, ClientIdentity, DEFAULT_TYPING_QUIESCENCE};
pub use error::{ClientError, ValidationError};
pub use event::{ChatSnapshot, ClientAction, ClientEvent, SyncEvent};
pub use murmur_core::{ConnectionState, env::Environment};
pub use murmur_proto::{MessageId, RoomId, UserId};
pub use router::{DropReason, InboundEvent, Routed};
pub use store::{ChatStore, TypingUser};
pub use subscription::{Subscription, SubscriptionRegistry};
