//! `heart-beat` header handling.
//!
//! Each side advertises `<cx>,<cy>` in milliseconds: `cx` is the smallest
//! interval at which it can send heart-beats, `cy` the interval at which it
//! wants to receive them. Zero means "cannot" / "do not want".
//!
//! The effective interval in one direction is `max(sender.cx, receiver.cy)`,
//! or disabled when either value is zero.

use std::time::Duration;

use crate::errors::{ProtocolError, Result};

/// One side's advertised heart-beat capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeartBeat {
    /// Smallest interval at which this side sends heart-beats.
    pub outgoing: Duration,
    /// Interval at which this side wants to receive heart-beats.
    pub incoming: Duration,
}

/// Heart-beat intervals agreed for a session. `None` disables a direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NegotiatedHeartBeat {
    /// Client must send something at least this often.
    pub send_every: Option<Duration>,
    /// Server promises to send something at least this often.
    pub expect_every: Option<Duration>,
}

impl HeartBeat {
    /// Capabilities with both directions disabled.
    pub const DISABLED: Self = Self { outgoing: Duration::ZERO, incoming: Duration::ZERO };

    /// Create from send/receive intervals.
    pub fn new(outgoing: Duration, incoming: Duration) -> Self {
        Self { outgoing, incoming }
    }

    /// Parse a `heart-beat` header value.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::InvalidHeartBeat` if the value is not two
    ///   comma-separated integers
    pub fn parse(value: &str) -> Result<Self> {
        let invalid = || ProtocolError::InvalidHeartBeat(value.to_string());

        let (cx, cy) = value.split_once(',').ok_or_else(invalid)?;
        let cx: u64 = cx.trim().parse().map_err(|_| invalid())?;
        let cy: u64 = cy.trim().parse().map_err(|_| invalid())?;

        Ok(Self { outgoing: Duration::from_millis(cx), incoming: Duration::from_millis(cy) })
    }

    /// Header value in milliseconds.
    pub fn to_header_value(&self) -> String {
        format!("{},{}", self.outgoing.as_millis(), self.incoming.as_millis())
    }

    /// Combine our (client) capabilities with the server's reply.
    pub fn negotiate(&self, server: &HeartBeat) -> NegotiatedHeartBeat {
        NegotiatedHeartBeat {
            send_every: effective(self.outgoing, server.incoming),
            expect_every: effective(server.outgoing, self.incoming),
        }
    }
}

fn effective(sender: Duration, receiver: Duration) -> Option<Duration> {
    if sender.is_zero() || receiver.is_zero() { None } else { Some(sender.max(receiver)) }
}
