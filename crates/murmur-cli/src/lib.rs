//! Terminal client for Murmur
//!
//! A thin shell over [`murmur_app::Runtime`]: reads commands from stdin and
//! prints sync events. All orchestration lives in the runtime.
//!
//! This crate only handles input parsing and output formatting.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod command;
pub mod error;
pub mod output;

pub use command::{Input, parse};
pub use error::CliError;
