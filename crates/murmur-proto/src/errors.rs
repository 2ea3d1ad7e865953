//! Protocol error types.

use thiserror::Error;

/// Result alias for codec operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while encoding or decoding wire data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Command line is not a STOMP command we understand.
    #[error("unknown command: {0:?}")]
    UnknownCommand(String),

    /// Header line has no `:` separator.
    #[error("malformed header line: {0:?}")]
    MalformedHeader(String),

    /// Header value contains an escape sequence STOMP 1.2 does not define.
    #[error("invalid escape sequence in header: {0:?}")]
    InvalidEscape(String),

    /// Input ended before the frame terminator.
    #[error("frame truncated: {0}")]
    Truncated(&'static str),

    /// `content-length` header is not a valid length.
    #[error("invalid content-length: {0:?}")]
    InvalidContentLength(String),

    /// Body exceeds [`crate::frame::MAX_BODY_SIZE`].
    #[error("body too large: {size} bytes (max {max})")]
    BodyTooLarge {
        /// Actual body size.
        size: usize,
        /// Maximum allowed body size.
        max: usize,
    },

    /// Frame text is not valid UTF-8.
    #[error("frame is not valid UTF-8")]
    InvalidUtf8,

    /// `heart-beat` header is not `<cx>,<cy>`.
    #[error("invalid heart-beat header: {0:?}")]
    InvalidHeartBeat(String),

    /// JSON body failed to serialize or deserialize.
    #[error("json error: {0}")]
    Json(String),
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}
