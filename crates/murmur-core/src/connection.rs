//! Transport connection state machine.
//!
//! Manages the transport lifecycle, the STOMP handshake, heart-beats and
//! automatic reconnect. Uses the action pattern: methods take time as input
//! and return actions for the driver to execute. This keeps the state machine
//! pure (no I/O) and makes testing straightforward.
//!
//! # State Machine
//!
//! ```text
//!                 connect                CONNECTED
//! ┌──────────────┐───────>┌────────────┐──────────>┌───────────┐
//! │ Disconnected │        │ Connecting │           │ Connected │
//! └──────────────┘<───────└────────────┘<──────────└───────────┘
//!        ↑      disconnect   ↑  (retry)   drop/silence    │
//!        │                   └────────────────────────────┘
//!        │  transport closed  ┌───────────────┐  disconnect │
//!        └────────────────────│ Disconnecting │<────────────┘
//!                             └───────────────┘
//! ```
//!
//! The connection never remembers subscriptions. A drop emits
//! [`ConnectionAction::Lost`] and a later [`ConnectionAction::Established`];
//! whoever owns subscriptions re-issues them on the latter.

use std::{
    fmt,
    ops::Sub,
    time::{Duration, Instant},
};

use murmur_proto::{Command, Frame, HeartBeat, NegotiatedHeartBeat, Packet};
use tracing::{debug, info, warn};

use crate::error::ConnectionError;

/// Delay between losing the transport and the next connection attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Interval at which the client offers to send heart-beats.
pub const DEFAULT_HEARTBEAT_OUTGOING: Duration = Duration::from_secs(4);

/// Interval at which the client asks the server for heart-beats.
pub const DEFAULT_HEARTBEAT_INCOMING: Duration = Duration::from_secs(4);

/// Number of incoming heart-beat intervals that may pass in silence before
/// the connection is declared lost.
pub const DEFAULT_HEARTBEAT_TOLERANCE: u32 = 2;

/// Virtual host sent in `CONNECT`.
pub const DEFAULT_HOST: &str = "localhost";

/// STOMP version negotiated in `CONNECT`.
pub const ACCEPT_VERSION: &str = "1.2";

/// Actions returned by the connection state machine.
///
/// Transport actions (`OpenTransport`, `CloseTransport`, `Send`) are executed
/// by the driver. The rest are notifications for the layer above.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionAction {
    /// Open the underlying transport. Report the outcome with
    /// [`Connection::transport_opened`] or [`Connection::transport_failed`].
    OpenTransport,

    /// Close the underlying transport
    CloseTransport,

    /// Send this packet to the server
    Send(Packet),

    /// Handshake completed; the connection is usable
    Established,

    /// A `MESSAGE` frame arrived for a subscription
    Deliver(Frame),

    /// Server reported an error. The connection is not torn down.
    Failure {
        /// `message` header and body of the `ERROR` frame
        diagnostic: String,
    },

    /// Transport dropped unexpectedly; a reconnect is scheduled
    Lost {
        /// Why the transport is gone
        reason: String,
    },

    /// Explicit disconnect completed
    Closed,
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Idle, no transport and no retry scheduled
    Disconnected,
    /// Opening the transport, waiting for `CONNECTED`, or waiting to retry
    Connecting,
    /// Handshake complete
    Connected,
    /// `DISCONNECT` sent, waiting for the transport to close
    Disconnecting,
}

/// Credentials presented in the `CONNECT` frame.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Login name (`login` header)
    pub login: String,
    /// Bearer token (`Authorization` header)
    pub token: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Connection configuration
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Virtual host for the `host` header
    pub host: String,
    /// Credentials for the handshake. `None` connects anonymously.
    pub credentials: Option<Credentials>,
    /// Fixed delay before each reconnect attempt
    pub reconnect_delay: Duration,
    /// Offered outgoing heart-beat interval (zero disables)
    pub heartbeat_outgoing: Duration,
    /// Requested incoming heart-beat interval (zero disables)
    pub heartbeat_incoming: Duration,
    /// Missed incoming intervals tolerated before declaring the link dead
    pub heartbeat_tolerance: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            credentials: None,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            heartbeat_outgoing: DEFAULT_HEARTBEAT_OUTGOING,
            heartbeat_incoming: DEFAULT_HEARTBEAT_INCOMING,
            heartbeat_tolerance: DEFAULT_HEARTBEAT_TOLERANCE,
        }
    }
}

impl ConnectionConfig {
    fn heartbeat(&self) -> HeartBeat {
        HeartBeat::new(self.heartbeat_outgoing, self.heartbeat_incoming)
    }
}

/// Connection state machine
///
/// This is a pure state machine - no I/O, no Environment storage.
/// Time is passed as parameters to methods that need it.
///
/// Generic over `Instant` to support both real time and virtual time for
/// deterministic testing.
#[derive(Debug, Clone)]
pub struct Connection<I = Instant>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    state: ConnectionState,
    config: ConnectionConfig,
    /// Transport reported open and not yet dropped
    transport_open: bool,
    /// Set while waiting out the reconnect delay
    retry_since: Option<I>,
    last_received: Option<I>,
    last_sent: Option<I>,
    heartbeat: NegotiatedHeartBeat,
    /// Transport opens since the last successful handshake
    attempts: u32,
}

impl<I> Connection<I>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    /// Create a new connection in [`ConnectionState::Disconnected`] state
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            config,
            transport_open: false,
            retry_since: None,
            last_received: None,
            last_sent: None,
            heartbeat: NegotiatedHeartBeat::default(),
            attempts: 0,
        }
    }

    /// Current connection state
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// True once `CONNECTED` was received and until the link drops
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// True while waiting out the reconnect delay
    #[must_use]
    pub fn is_retry_pending(&self) -> bool {
        self.retry_since.is_some()
    }

    /// Heart-beat intervals agreed with the server. Disabled until connected.
    #[must_use]
    pub fn heartbeat(&self) -> NegotiatedHeartBeat {
        self.heartbeat
    }

    /// Transport opens since the last successful handshake
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Start connecting.
    ///
    /// Completion is reported later through [`ConnectionAction::Established`].
    /// A no-op while already connecting or connected.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::InvalidState` while a disconnect is in progress
    pub fn connect(&mut self) -> Result<Vec<ConnectionAction>, ConnectionError> {
        match self.state {
            ConnectionState::Disconnected => {
                info!(host = %self.config.host, "connecting");
                self.state = ConnectionState::Connecting;
                self.attempts = 0;
                Ok(self.open())
            },
            ConnectionState::Connecting | ConnectionState::Connected => Ok(vec![]),
            ConnectionState::Disconnecting => Err(ConnectionError::InvalidState {
                state: self.state,
                operation: "connect".to_string(),
            }),
        }
    }

    /// Disconnect and stop reconnecting. Idempotent.
    ///
    /// From `Connected` this sends `DISCONNECT` and closes the transport;
    /// [`ConnectionAction::Closed`] follows once the transport reports closed.
    pub fn disconnect(&mut self) -> Vec<ConnectionAction> {
        match self.state {
            ConnectionState::Connected => {
                info!("disconnecting");
                self.state = ConnectionState::Disconnecting;
                vec![
                    ConnectionAction::Send(Packet::Frame(Frame::new(Command::Disconnect))),
                    ConnectionAction::CloseTransport,
                ]
            },
            ConnectionState::Connecting if self.transport_open => {
                debug!("abandoning handshake");
                self.state = ConnectionState::Disconnecting;
                vec![ConnectionAction::CloseTransport]
            },
            ConnectionState::Connecting => {
                debug!("abandoning connection attempt");
                self.reset();
                vec![ConnectionAction::Closed]
            },
            ConnectionState::Disconnecting | ConnectionState::Disconnected => vec![],
        }
    }

    /// Transport is open; start the STOMP handshake.
    ///
    /// An open that completes after the attempt was abandoned is answered
    /// with [`ConnectionAction::CloseTransport`].
    ///
    /// # Errors
    ///
    /// - `ConnectionError::InvalidState` if no open was requested
    pub fn transport_opened(&mut self, now: I) -> Result<Vec<ConnectionAction>, ConnectionError> {
        match self.state {
            ConnectionState::Connecting if !self.transport_open && self.retry_since.is_none() => {
                debug!(attempt = self.attempts, "transport open, sending CONNECT");
                self.transport_open = true;
                self.last_received = Some(now);
                self.last_sent = Some(now);
                Ok(vec![ConnectionAction::Send(Packet::Frame(self.connect_frame()))])
            },
            ConnectionState::Disconnected => Ok(vec![ConnectionAction::CloseTransport]),
            state => Err(ConnectionError::InvalidState {
                state,
                operation: "transport_opened".to_string(),
            }),
        }
    }

    /// Transport could not be opened or failed mid-session.
    pub fn transport_failed(&mut self, reason: impl Into<String>, now: I) -> Vec<ConnectionAction> {
        let reason = reason.into();
        if self.awaiting_transport() {
            warn!(%reason, attempt = self.attempts, "transport failed");
        }
        self.transport_gone(reason, now)
    }

    /// Transport closed.
    pub fn transport_closed(&mut self, now: I) -> Vec<ConnectionAction> {
        if self.awaiting_transport() {
            info!("transport closed by peer");
        }
        self.transport_gone("transport closed".to_string(), now)
    }

    /// Process periodic maintenance: reconnect timer, heart-beats and
    /// liveness.
    pub fn tick(&mut self, now: I) -> Vec<ConnectionAction> {
        match self.state {
            ConnectionState::Connecting => match self.retry_since {
                Some(since) if now - since >= self.config.reconnect_delay => {
                    info!(attempt = self.attempts + 1, "reconnecting");
                    self.retry_since = None;
                    self.open()
                },
                _ => vec![],
            },
            ConnectionState::Connected => {
                if let (Some(expect), Some(last)) = (self.heartbeat.expect_every, self.last_received)
                {
                    let elapsed = now - last;
                    if elapsed > expect * self.config.heartbeat_tolerance {
                        let reason = ConnectionError::HeartbeatTimeout { elapsed }.to_string();
                        warn!(%reason, "connection lost");
                        let mut actions = vec![ConnectionAction::CloseTransport];
                        actions.extend(self.schedule_retry(reason, now));
                        return actions;
                    }
                }

                match (self.heartbeat.send_every, self.last_sent) {
                    (Some(every), Some(last)) if now - last >= every => {
                        self.last_sent = Some(now);
                        vec![ConnectionAction::Send(Packet::Heartbeat)]
                    },
                    _ => vec![],
                }
            },
            ConnectionState::Disconnected | ConnectionState::Disconnecting => vec![],
        }
    }

    /// Wrap an outbound frame for the transport.
    ///
    /// Outbound traffic postpones the next heart-beat.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::InvalidState` unless connected
    pub fn send(&mut self, frame: Frame, now: I) -> Result<Packet, ConnectionError> {
        if self.state != ConnectionState::Connected {
            return Err(ConnectionError::InvalidState {
                state: self.state,
                operation: format!("send {}", frame.command),
            });
        }

        self.last_sent = Some(now);
        Ok(Packet::Frame(frame))
    }

    /// Process an inbound packet and update state.
    ///
    /// Any packet refreshes liveness. Packets arriving without an open
    /// transport are stale and ignored.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::UnexpectedFrame` if the command is invalid for the
    ///   current state
    pub fn handle_packet(
        &mut self,
        packet: Packet,
        now: I,
    ) -> Result<Vec<ConnectionAction>, ConnectionError> {
        if !self.transport_open {
            debug!("ignoring packet from stale transport");
            return Ok(vec![]);
        }
        self.last_received = Some(now);

        let frame = match packet {
            Packet::Heartbeat => return Ok(vec![]),
            Packet::Frame(frame) => frame,
        };

        match (self.state, frame.command) {
            (ConnectionState::Connecting, Command::Connected) => Ok(self.handle_connected(&frame)),

            (ConnectionState::Connected, Command::Message) => {
                Ok(vec![ConnectionAction::Deliver(frame)])
            },

            (ConnectionState::Connected, Command::Receipt) => {
                debug!(receipt = frame.header("receipt-id"), "receipt");
                Ok(vec![])
            },

            (ConnectionState::Connecting | ConnectionState::Connected, Command::Error) => {
                let diagnostic = error_diagnostic(&frame);
                warn!(%diagnostic, "server error");
                Ok(vec![ConnectionAction::Failure { diagnostic }])
            },

            // Draining while the transport closes
            (ConnectionState::Disconnecting, _) => Ok(vec![]),

            (state, command) => Err(ConnectionError::UnexpectedFrame { state, command }),
        }
    }

    fn handle_connected(&mut self, frame: &Frame) -> Vec<ConnectionAction> {
        let server = match frame.header("heart-beat") {
            Some(value) => HeartBeat::parse(value).unwrap_or_else(|err| {
                warn!(%err, "ignoring server heart-beat header");
                HeartBeat::DISABLED
            }),
            None => HeartBeat::DISABLED,
        };

        self.heartbeat = self.config.heartbeat().negotiate(&server);
        self.state = ConnectionState::Connected;
        self.attempts = 0;

        info!(
            version = frame.header("version").unwrap_or("1.0"),
            server = frame.header("server").unwrap_or("unknown"),
            send_every = ?self.heartbeat.send_every,
            expect_every = ?self.heartbeat.expect_every,
            "connected"
        );

        vec![ConnectionAction::Established]
    }

    fn connect_frame(&self) -> Frame {
        let mut frame = Frame::new(Command::Connect)
            .with_header("accept-version", ACCEPT_VERSION)
            .with_header("host", &self.config.host)
            .with_header("heart-beat", self.config.heartbeat().to_header_value());

        if let Some(credentials) = &self.config.credentials {
            frame = frame
                .with_header("login", &credentials.login)
                .with_header("Authorization", format!("Bearer {}", credentials.token));
        }

        frame
    }

    fn open(&mut self) -> Vec<ConnectionAction> {
        self.attempts = self.attempts.saturating_add(1);
        self.transport_open = false;
        vec![ConnectionAction::OpenTransport]
    }

    /// True when a transport is open or an open is in flight.
    fn awaiting_transport(&self) -> bool {
        matches!(self.state, ConnectionState::Connecting | ConnectionState::Connected)
            && self.retry_since.is_none()
    }

    fn transport_gone(&mut self, reason: String, now: I) -> Vec<ConnectionAction> {
        match self.state {
            ConnectionState::Disconnecting => {
                info!("disconnected");
                self.reset();
                vec![ConnectionAction::Closed]
            },
            _ if self.awaiting_transport() => self.schedule_retry(reason, now),
            // Already scheduled a retry, or idle
            _ => vec![],
        }
    }

    fn schedule_retry(&mut self, reason: String, now: I) -> Vec<ConnectionAction> {
        debug!(delay = ?self.config.reconnect_delay, "scheduling reconnect");
        self.state = ConnectionState::Connecting;
        self.transport_open = false;
        self.retry_since = Some(now);
        self.heartbeat = NegotiatedHeartBeat::default();
        vec![ConnectionAction::Lost { reason }]
    }

    fn reset(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.transport_open = false;
        self.retry_since = None;
        self.last_received = None;
        self.last_sent = None;
        self.heartbeat = NegotiatedHeartBeat::default();
        self.attempts = 0;
    }
}

fn error_diagnostic(frame: &Frame) -> String {
    let body = frame.body_text();
    let body = body.trim();
    match frame.header("message") {
        Some(message) if body.is_empty() => message.to_string(),
        Some(message) => format!("{message}: {body}"),
        None if body.is_empty() => "server error".to_string(),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connected_frame(heart_beat: &str) -> Packet {
        Packet::Frame(
            Frame::new(Command::Connected)
                .with_header("version", "1.2")
                .with_header("heart-beat", heart_beat),
        )
    }

    /// Drive a fresh connection through the handshake at `t0`.
    fn established(t0: Instant) -> Connection {
        let mut conn = Connection::new(ConnectionConfig::default());
        conn.connect().unwrap();
        conn.transport_opened(t0).unwrap();
        let actions = conn.handle_packet(connected_frame("4000,4000"), t0).unwrap();
        assert_eq!(actions, vec![ConnectionAction::Established]);
        conn
    }

    fn sent_frame(action: &ConnectionAction) -> &Frame {
        match action {
            ConnectionAction::Send(Packet::Frame(frame)) => frame,
            other => panic!("expected Send(Frame), got {other:?}"),
        }
    }

    #[test]
    fn connection_lifecycle() {
        let t0 = Instant::now();
        let mut conn: Connection = Connection::new(ConnectionConfig::default());
        assert_eq!(conn.state(), ConnectionState::Disconnected);

        let actions = conn.connect().unwrap();
        assert_eq!(actions, vec![ConnectionAction::OpenTransport]);
        assert_eq!(conn.state(), ConnectionState::Connecting);

        let actions = conn.transport_opened(t0).unwrap();
        assert_eq!(actions.len(), 1);
        let connect = sent_frame(&actions[0]);
        assert_eq!(connect.command, Command::Connect);
        assert_eq!(connect.header("accept-version"), Some("1.2"));
        assert_eq!(connect.header("host"), Some("localhost"));
        assert_eq!(connect.header("heart-beat"), Some("4000,4000"));
        assert_eq!(connect.header("Authorization"), None);

        let actions = conn.handle_packet(connected_frame("0,0"), t0).unwrap();
        assert_eq!(actions, vec![ConnectionAction::Established]);
        assert!(conn.is_connected());
        assert_eq!(conn.attempts(), 0);
    }

    #[test]
    fn connect_frame_carries_credentials() {
        let config = ConnectionConfig {
            credentials: Some(Credentials { login: "alice".into(), token: "tok".into() }),
            ..ConnectionConfig::default()
        };
        let mut conn: Connection = Connection::new(config);
        conn.connect().unwrap();

        let actions = conn.transport_opened(Instant::now()).unwrap();
        let connect = sent_frame(&actions[0]);
        assert_eq!(connect.header("login"), Some("alice"));
        assert_eq!(connect.header("Authorization"), Some("Bearer tok"));
    }

    #[test]
    fn credentials_debug_hides_token() {
        let credentials = Credentials { login: "alice".into(), token: "secret".into() };
        let debug = format!("{credentials:?}");
        assert!(debug.contains("alice"));
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn connect_is_noop_when_connecting_or_connected() {
        let t0 = Instant::now();
        let mut conn: Connection = Connection::new(ConnectionConfig::default());
        conn.connect().unwrap();
        assert!(conn.connect().unwrap().is_empty());

        let mut conn = established(t0);
        assert!(conn.connect().unwrap().is_empty());
        assert!(conn.is_connected());
    }

    #[test]
    fn connect_while_disconnecting_is_invalid() {
        let mut conn = established(Instant::now());
        conn.disconnect();

        let result = conn.connect();
        assert!(matches!(
            result,
            Err(ConnectionError::InvalidState { state: ConnectionState::Disconnecting, .. })
        ));
    }

    #[test]
    fn heart_beat_negotiation_uses_server_reply() {
        let t0 = Instant::now();
        let mut conn: Connection = Connection::new(ConnectionConfig::default());
        conn.connect().unwrap();
        conn.transport_opened(t0).unwrap();
        conn.handle_packet(connected_frame("10000,0"), t0).unwrap();

        assert_eq!(conn.heartbeat().send_every, None);
        assert_eq!(conn.heartbeat().expect_every, Some(Duration::from_secs(10)));
    }

    #[test]
    fn malformed_server_heart_beat_disables_heart_beats() {
        let t0 = Instant::now();
        let mut conn: Connection = Connection::new(ConnectionConfig::default());
        conn.connect().unwrap();
        conn.transport_opened(t0).unwrap();

        let actions = conn.handle_packet(connected_frame("soon"), t0).unwrap();
        assert_eq!(actions, vec![ConnectionAction::Established]);
        assert_eq!(conn.heartbeat(), NegotiatedHeartBeat::default());
    }

    #[test]
    fn message_frames_are_delivered() {
        let t0 = Instant::now();
        let mut conn = established(t0);

        let frame = Frame::new(Command::Message).with_header("destination", "/topic/messages/1");
        let actions = conn.handle_packet(Packet::Frame(frame.clone()), t0).unwrap();
        assert_eq!(actions, vec![ConnectionAction::Deliver(frame)]);
    }

    #[test]
    fn receipts_and_heartbeats_are_absorbed() {
        let t0 = Instant::now();
        let mut conn = established(t0);

        let receipt = Frame::new(Command::Receipt).with_header("receipt-id", "1");
        assert!(conn.handle_packet(Packet::Frame(receipt), t0).unwrap().is_empty());
        assert!(conn.handle_packet(Packet::Heartbeat, t0).unwrap().is_empty());
    }

    #[test]
    fn error_frame_reports_failure_without_teardown() {
        let t0 = Instant::now();
        let mut conn = established(t0);

        let error = Frame::new(Command::Error)
            .with_header("message", "access denied")
            .with_body(&b"room 9"[..]);
        let actions = conn.handle_packet(Packet::Frame(error), t0).unwrap();

        assert_eq!(
            actions,
            vec![ConnectionAction::Failure { diagnostic: "access denied: room 9".into() }]
        );
        assert!(conn.is_connected());
    }

    #[test]
    fn message_before_handshake_is_unexpected() {
        let t0 = Instant::now();
        let mut conn: Connection = Connection::new(ConnectionConfig::default());
        conn.connect().unwrap();
        conn.transport_opened(t0).unwrap();

        let result = conn.handle_packet(Packet::Frame(Frame::new(Command::Message)), t0);
        assert_eq!(
            result,
            Err(ConnectionError::UnexpectedFrame {
                state: ConnectionState::Connecting,
                command: Command::Message,
            })
        );
    }

    #[test]
    fn drop_schedules_reconnect_after_fixed_delay() {
        let t0 = Instant::now();
        let mut conn = established(t0);

        let actions = conn.transport_closed(t0);
        assert!(matches!(actions.as_slice(), [ConnectionAction::Lost { .. }]));
        assert_eq!(conn.state(), ConnectionState::Connecting);
        assert!(conn.is_retry_pending());

        assert!(conn.tick(t0 + Duration::from_secs(4)).is_empty());

        let actions = conn.tick(t0 + DEFAULT_RECONNECT_DELAY);
        assert_eq!(actions, vec![ConnectionAction::OpenTransport]);
        assert!(!conn.is_retry_pending());
    }

    #[test]
    fn retries_continue_indefinitely() {
        let mut now = Instant::now();
        let mut conn: Connection = Connection::new(ConnectionConfig::default());
        conn.connect().unwrap();

        for attempt in 1..=20 {
            assert_eq!(conn.attempts(), attempt);
            let actions = conn.transport_failed("refused", now);
            assert!(matches!(actions.as_slice(), [ConnectionAction::Lost { .. }]));

            now += DEFAULT_RECONNECT_DELAY;
            assert_eq!(conn.tick(now), vec![ConnectionAction::OpenTransport]);
        }
    }

    #[test]
    fn heartbeat_sent_when_idle() {
        let t0 = Instant::now();
        let mut conn = established(t0);

        assert!(conn.tick(t0 + Duration::from_secs(1)).is_empty());

        // Server traffic keeps the link alive but does not count as our send
        conn.handle_packet(Packet::Heartbeat, t0 + Duration::from_secs(3)).unwrap();
        let actions = conn.tick(t0 + Duration::from_secs(4));
        assert_eq!(actions, vec![ConnectionAction::Send(Packet::Heartbeat)]);
    }

    #[test]
    fn outbound_frames_postpone_heartbeat() {
        let t0 = Instant::now();
        let mut conn = established(t0);

        conn.send(Frame::new(Command::Send), t0 + Duration::from_secs(3)).unwrap();
        assert!(conn.tick(t0 + Duration::from_secs(4)).is_empty());
    }

    #[test]
    fn silence_past_tolerance_is_a_drop() {
        let t0 = Instant::now();
        let mut conn = established(t0);

        // 4s interval x tolerance 2 = 8s of allowed silence
        let actions = conn.tick(t0 + Duration::from_secs(8));
        assert!(!actions.iter().any(|a| matches!(a, ConnectionAction::Lost { .. })));

        let actions = conn.tick(t0 + Duration::from_secs(9));
        assert_eq!(actions[0], ConnectionAction::CloseTransport);
        assert!(matches!(&actions[1], ConnectionAction::Lost { reason } if reason.contains("heart-beat")));
        assert_eq!(conn.state(), ConnectionState::Connecting);

        // The close we asked for must not schedule a second retry
        assert!(conn.transport_closed(t0 + Duration::from_secs(10)).is_empty());
        let actions = conn.tick(t0 + Duration::from_secs(14));
        assert_eq!(actions, vec![ConnectionAction::OpenTransport]);
    }

    #[test]
    fn disconnect_from_connected() {
        let t0 = Instant::now();
        let mut conn = established(t0);

        let actions = conn.disconnect();
        assert_eq!(sent_frame(&actions[0]).command, Command::Disconnect);
        assert_eq!(actions[1], ConnectionAction::CloseTransport);
        assert_eq!(conn.state(), ConnectionState::Disconnecting);

        // Idempotent
        assert!(conn.disconnect().is_empty());

        let actions = conn.transport_closed(t0);
        assert_eq!(actions, vec![ConnectionAction::Closed]);
        assert_eq!(conn.state(), ConnectionState::Disconnected);

        // No reconnect after an explicit disconnect
        assert!(conn.tick(t0 + Duration::from_secs(60)).is_empty());
        assert!(conn.disconnect().is_empty());
    }

    #[test]
    fn disconnect_during_backoff_stops_retrying() {
        let t0 = Instant::now();
        let mut conn = established(t0);
        conn.transport_failed("reset", t0);

        assert_eq!(conn.disconnect(), vec![ConnectionAction::Closed]);
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert!(conn.tick(t0 + Duration::from_secs(60)).is_empty());
    }

    #[test]
    fn late_open_after_abandon_is_closed() {
        let t0 = Instant::now();
        let mut conn: Connection = Connection::new(ConnectionConfig::default());
        conn.connect().unwrap();
        assert_eq!(conn.disconnect(), vec![ConnectionAction::Closed]);

        let actions = conn.transport_opened(t0).unwrap();
        assert_eq!(actions, vec![ConnectionAction::CloseTransport]);
    }

    #[test]
    fn send_requires_connection() {
        let mut conn: Connection = Connection::new(ConnectionConfig::default());
        let result = conn.send(Frame::new(Command::Send), Instant::now());
        assert!(matches!(result, Err(ConnectionError::InvalidState { .. })));
    }

    #[test]
    fn stale_packets_are_ignored_during_backoff() {
        let t0 = Instant::now();
        let mut conn = established(t0);
        conn.transport_closed(t0);

        let actions =
            conn.handle_packet(Packet::Frame(Frame::new(Command::Message)), t0).unwrap();
        assert!(actions.is_empty());
    }
}
