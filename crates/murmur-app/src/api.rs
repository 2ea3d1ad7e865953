//! REST collaborators.
//!
//! The chat server exposes authentication and room/message queries over
//! HTTP. The runtime only depends on these traits, so tests substitute
//! in-memory implementations.

use async_trait::async_trait;
use murmur_proto::{
    RoomId,
    payloads::{AuthSession, ChatRoom, CreateRoomRequest, Message, User},
};

use crate::ApiError;

/// Account operations. Both return the session whose token authorizes every
/// later REST call and the STOMP handshake.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Create an account and sign in.
    async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, ApiError>;

    /// Sign in to an existing account.
    async fn login(&self, username: &str, password: &str) -> Result<AuthSession, ApiError>;
}

/// Room, message and user queries for the signed-in user.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Create a room with the given participants.
    async fn create_room(&self, request: &CreateRoomRequest) -> Result<ChatRoom, ApiError>;

    /// Rooms the user belongs to.
    async fn list_rooms(&self) -> Result<Vec<ChatRoom>, ApiError>;

    /// Message history of a room in server order.
    async fn list_messages(&self, room_id: RoomId) -> Result<Vec<Message>, ApiError>;

    /// Users whose name matches `query`.
    async fn search_users(&self, query: &str) -> Result<Vec<User>, ApiError>;

    /// Users currently online.
    async fn online_users(&self) -> Result<Vec<User>, ApiError>;
}
