//! Application layer for Murmur
//!
//! Runs the sans-IO [`murmur_client::Client`] against real I/O. A single task
//! owns the client and drives it from UI commands, transport events, REST
//! completions and a timer, so the state machines never need locking.
//!
//! # Components
//!
//! - [`Driver`]: Trait for the platform-specific transport
//! - [`ChatApi`] / [`AuthApi`]: REST collaborators
//! - [`Runtime`]: Generic orchestration loop using Driver
//! - [`SyncHandle`]: Cloneable UI handle (commands, event bus, snapshots)
//!
//! # Features
//!
//! - `websocket`: [`WsDriver`], STOMP over tokio-tungstenite
//! - `http`: [`HttpApi`], reqwest client for the REST endpoints

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod api;
mod driver;
mod error;
mod handle;
#[cfg(feature = "http")]
mod http;
mod runtime;
#[cfg(feature = "websocket")]
mod ws;

pub use api::{AuthApi, ChatApi};
pub use driver::{Driver, TransportEvent};
pub use error::{ApiError, RuntimeError};
pub use handle::SyncHandle;
#[cfg(feature = "http")]
pub use http::HttpApi;
pub use runtime::{
    DEFAULT_COMMAND_CAPACITY, DEFAULT_EVENT_CAPACITY, DEFAULT_TICK_INTERVAL, Runtime,
    RuntimeConfig,
};
#[cfg(feature = "websocket")]
pub use ws::{WsDriver, WsError};
