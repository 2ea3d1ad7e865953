//! Client error types.

use murmur_core::ConnectionError;
use murmur_proto::{ProtocolError, RoomId};
use thiserror::Error;

/// Rejected user input. Returned synchronously, nothing is sent.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// Message content is empty after trimming whitespace
    #[error("message content is empty")]
    EmptyContent,
}

/// Errors returned by [`crate::Client::handle`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Connection state machine rejected the event
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// User input failed validation
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Outbound body could not be encoded
    #[error("encoding failed: {0}")]
    Protocol(#[from] ProtocolError),

    /// Operation needs a current room and none is selected
    #[error("no active room")]
    NoActiveRoom,

    /// Room id is not in the room list
    #[error("unknown room {room_id}")]
    UnknownRoom {
        /// Requested room
        room_id: RoomId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_is_transparent() {
        let err = ClientError::from(ValidationError::EmptyContent);
        assert_eq!(err.to_string(), "message content is empty");
    }
}
