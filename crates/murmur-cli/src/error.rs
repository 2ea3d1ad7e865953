//! CLI errors.

use murmur_app::{ApiError, RuntimeError};
use thiserror::Error;

/// Errors reported by the terminal client.
#[derive(Debug, Error)]
pub enum CliError {
    /// Unrecognized slash command.
    #[error("unknown command `{0}`, try /help")]
    UnknownCommand(String),

    /// Command arguments did not parse.
    #[error("usage: {0}")]
    Usage(&'static str),

    /// `--register` without `--email`.
    #[error("--register needs --email")]
    MissingEmail,

    /// Sign-in or a REST call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The runtime rejected a request or stopped.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    /// Reading stdin failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The runtime task panicked.
    #[error("runtime task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
