//! Driver trait for abstracting transport I/O.
//!
//! The [`Driver`] trait decouples the runtime from a specific transport. The
//! WebSocket driver carries STOMP text frames in production; tests plug in a
//! channel-backed driver, while the generic [`crate::Runtime`] handles all
//! orchestration.

use std::future::Future;

use murmur_proto::{Packet, ProtocolError};

/// What the transport produced.
#[derive(Debug)]
pub enum TransportEvent {
    /// A decoded packet (frame or heart-beat).
    Packet(Packet),

    /// A payload that could not be decoded. The transport stays open.
    Garbled(ProtocolError),

    /// The transport closed.
    Closed {
        /// Failure description, `None` for an orderly close.
        reason: Option<String>,
    },
}

/// Abstracts transport I/O for the runtime.
///
/// One transport exists at a time. The runtime only calls [`open`] when the
/// connection manager asks for it, and only polls [`next_event`] while
/// [`is_open`] holds.
///
/// [`open`]: Driver::open
/// [`next_event`]: Driver::next_event
/// [`is_open`]: Driver::is_open
pub trait Driver: Send {
    /// Platform-specific error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Open the transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport cannot be established.
    fn open(&mut self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Send a packet.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport is closed or the write fails.
    fn send(&mut self, packet: Packet) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Wait for the next transport event.
    ///
    /// Must be cancel safe: the runtime drops the future whenever another
    /// source becomes ready first. After yielding [`TransportEvent::Closed`]
    /// the driver reports `is_open() == false`.
    fn next_event(&mut self) -> impl Future<Output = TransportEvent> + Send;

    /// Close the transport. Idempotent.
    fn close(&mut self) -> impl Future<Output = ()> + Send;

    /// Check if the transport is open.
    fn is_open(&self) -> bool;
}
