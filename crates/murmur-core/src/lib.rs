//! Core
//!
//! Sans-IO connection management for the Murmur sync layer. State machines in
//! this crate take the current time as input and return actions for a driver
//! to execute. They never touch sockets or clocks themselves.
//!
//! # Components
//!
//! - [`connection::Connection`]: transport lifecycle, STOMP handshake,
//!   heart-beats and automatic reconnect
//! - [`env::Environment`]: time source, swapped for virtual time in tests
//! - [`error::ConnectionError`]: connection state machine failures

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod connection;
pub mod env;
pub mod error;

pub use connection::{
    Connection, ConnectionAction, ConnectionConfig, ConnectionState, Credentials,
};
pub use env::{Environment, SystemEnv};
pub use error::ConnectionError;
