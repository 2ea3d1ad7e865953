//! Error types for the connection layer.
//!
//! Transport failures never reach the caller as errors: the connection state
//! machine turns them into a scheduled reconnect. What remains here are misuse
//! of the state machine and protocol violations by the peer.

use std::time::Duration;

use murmur_proto::{Command, ProtocolError};
use thiserror::Error;

use crate::connection::ConnectionState;

/// Errors that can occur during connection state machine operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Invalid state transition attempted
    #[error("invalid state transition: cannot {operation} from {state:?}")]
    InvalidState {
        /// Current state when error occurred
        state: ConnectionState,
        /// Operation that was attempted
        operation: String,
    },

    /// Received unexpected frame for current state
    #[error("unexpected frame: received {command} in state {state:?}")]
    UnexpectedFrame {
        /// Current state when frame was received
        state: ConnectionState,
        /// Command of the unexpected frame
        command: Command,
    },

    /// Server stopped sending anything, heart-beats included
    #[error("heart-beat timeout: nothing received for {elapsed:?}")]
    HeartbeatTimeout {
        /// How long the connection was silent
        elapsed: Duration,
    },

    /// Protocol error from frame parsing/validation
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Underlying transport error
    #[error("transport error: {0}")]
    Transport(String),
}

impl ConnectionError {
    /// Returns true if this error is transient and may succeed on retry.
    ///
    /// Silence and transport failures are transient; the reconnect loop
    /// handles them. Protocol violations and state misuse are not.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::HeartbeatTimeout { .. } | Self::Transport(_))
    }
}

impl From<ProtocolError> for ConnectionError {
    fn from(err: ProtocolError) -> Self {
        Self::Protocol(err.to_string())
    }
}
