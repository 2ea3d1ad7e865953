//! Application layer errors.

use murmur_client::{ClientError, ValidationError};
use thiserror::Error;

/// REST collaborator failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// Credentials rejected or token expired.
    #[error("unauthorized")]
    Unauthorized,

    /// Server answered with a non-success status.
    #[error("server returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },

    /// Request never completed.
    #[error("request failed: {0}")]
    Transport(String),

    /// Response body did not match the expected shape.
    #[error("invalid response: {0}")]
    Decode(String),
}

/// Errors surfaced through [`crate::SyncHandle`].
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The runtime task has stopped.
    #[error("runtime stopped")]
    Stopped,

    /// The client rejected the request.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// A REST call failed.
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl From<ValidationError> for RuntimeError {
    fn from(err: ValidationError) -> Self {
        Self::Client(ClientError::Validation(err))
    }
}
