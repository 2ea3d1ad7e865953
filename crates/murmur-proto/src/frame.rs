//! STOMP frames and the text codec.
//!
//! A frame on the wire is:
//!
//! ```text
//! COMMAND\n
//! name:value\n          (zero or more headers)
//! \n
//! body\0
//! ```
//!
//! A lone end-of-line between frames is a heart-beat. One WebSocket message may
//! carry several frames and heart-beats back to back, so decoding returns a
//! list of [`Packet`]s.
//!
//! Header names and values are escaped per STOMP 1.2 (`\r`, `\n`, `\c`, `\\`)
//! on every frame except `CONNECT`, `STOMP` and `CONNECTED`.

use std::{borrow::Cow, fmt};

use bytes::{BufMut, Bytes};
use serde::{Serialize, de::DeserializeOwned};

use crate::errors::{ProtocolError, Result};

/// Maximum accepted body size (1 MiB).
pub const MAX_BODY_SIZE: usize = 1024 * 1024;

const NUL: u8 = 0;
const LF: u8 = b'\n';
const CR: u8 = b'\r';

/// STOMP command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Client handshake.
    Connect,
    /// Client handshake (STOMP 1.2 alias of `CONNECT`).
    Stomp,
    /// Server handshake reply.
    Connected,
    /// Client publish.
    Send,
    /// Client subscribe.
    Subscribe,
    /// Client unsubscribe.
    Unsubscribe,
    /// Client graceful shutdown.
    Disconnect,
    /// Server delivery on a subscription.
    Message,
    /// Server receipt acknowledgement.
    Receipt,
    /// Server error.
    Error,
}

impl Command {
    /// Wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Stomp => "STOMP",
            Self::Connected => "CONNECTED",
            Self::Send => "SEND",
            Self::Subscribe => "SUBSCRIBE",
            Self::Unsubscribe => "UNSUBSCRIBE",
            Self::Disconnect => "DISCONNECT",
            Self::Message => "MESSAGE",
            Self::Receipt => "RECEIPT",
            Self::Error => "ERROR",
        }
    }

    /// Parse a command line.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::UnknownCommand` for anything outside the supported set
    pub fn parse(line: &str) -> Result<Self> {
        match line {
            "CONNECT" => Ok(Self::Connect),
            "STOMP" => Ok(Self::Stomp),
            "CONNECTED" => Ok(Self::Connected),
            "SEND" => Ok(Self::Send),
            "SUBSCRIBE" => Ok(Self::Subscribe),
            "UNSUBSCRIBE" => Ok(Self::Unsubscribe),
            "DISCONNECT" => Ok(Self::Disconnect),
            "MESSAGE" => Ok(Self::Message),
            "RECEIPT" => Ok(Self::Receipt),
            "ERROR" => Ok(Self::Error),
            other => Err(ProtocolError::UnknownCommand(other.to_string())),
        }
    }

    fn escapes_headers(self) -> bool {
        !matches!(self, Self::Connect | Self::Stomp | Self::Connected)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single STOMP frame.
///
/// Headers keep their wire order. When a header repeats, the first occurrence
/// wins (STOMP 1.2), which is what [`Frame::header`] returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame command.
    pub command: Command,
    /// Headers in wire order (unescaped).
    pub headers: Vec<(String, String)>,
    /// Raw body bytes.
    pub body: Bytes,
}

impl Frame {
    /// Create a frame with no headers and an empty body.
    pub fn new(command: Command) -> Self {
        Self { command, headers: Vec::new(), body: Bytes::new() }
    }

    /// Append a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Replace the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Serialize `value` as the JSON body and tag the content type.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::Json` if serialization fails
    pub fn with_json<T: Serialize>(self, value: &T) -> Result<Self> {
        let body = serde_json::to_vec(value)?;
        Ok(self.with_header("content-type", "application/json").with_body(body))
    }

    /// First value of the named header. `None` if absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
    }

    /// `destination` header. `None` if absent.
    pub fn destination(&self) -> Option<&str> {
        self.header("destination")
    }

    /// Deserialize the body as JSON.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::Json` if the body is not valid JSON for `T`
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Body as text (lossy).
    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Encode into `dst`.
    ///
    /// A `content-length` header is added for non-empty bodies unless the
    /// caller already set one.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::BodyTooLarge` if the body exceeds [`MAX_BODY_SIZE`]
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        if self.body.len() > MAX_BODY_SIZE {
            return Err(ProtocolError::BodyTooLarge { size: self.body.len(), max: MAX_BODY_SIZE });
        }

        let escape = self.command.escapes_headers();
        let mut head = String::with_capacity(64);
        head.push_str(self.command.as_str());
        head.push('\n');

        for (name, value) in &self.headers {
            if escape {
                escape_into(name, &mut head);
                head.push(':');
                escape_into(value, &mut head);
            } else {
                head.push_str(name);
                head.push(':');
                head.push_str(value);
            }
            head.push('\n');
        }

        if !self.body.is_empty() && self.header("content-length").is_none() {
            head.push_str("content-length:");
            head.push_str(&self.body.len().to_string());
            head.push('\n');
        }
        head.push('\n');

        dst.put_slice(head.as_bytes());
        dst.put_slice(&self.body);
        dst.put_u8(NUL);
        Ok(())
    }

    /// Encode into a fresh buffer.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::BodyTooLarge` if the body exceeds [`MAX_BODY_SIZE`]
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(64 + self.body.len());
        self.encode(&mut buf)?;
        Ok(buf)
    }

    /// Decode a single frame, ignoring any trailing heart-beats.
    ///
    /// # Errors
    ///
    /// - Any codec error from the frame itself
    /// - `ProtocolError::Truncated` if `input` holds only heart-beats
    pub fn decode(input: &[u8]) -> Result<Self> {
        decode_packets(input)?
            .into_iter()
            .find_map(|packet| match packet {
                Packet::Frame(frame) => Some(frame),
                Packet::Heartbeat => None,
            })
            .ok_or(ProtocolError::Truncated("no frame in input"))
    }
}

/// Unit of transport traffic: a frame or a heart-beat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// A full STOMP frame.
    Frame(Frame),
    /// A bare end-of-line keep-alive.
    Heartbeat,
}

impl Packet {
    /// Encode for the wire.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::BodyTooLarge` if a frame body exceeds the limit
    pub fn encode(&self) -> Result<Vec<u8>> {
        match self {
            Self::Frame(frame) => frame.to_bytes(),
            Self::Heartbeat => Ok(vec![LF]),
        }
    }

    /// Encode as text for WebSocket text messages.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::InvalidUtf8` if the body is not UTF-8
    /// - `ProtocolError::BodyTooLarge` if a frame body exceeds the limit
    pub fn to_text(&self) -> Result<String> {
        String::from_utf8(self.encode()?).map_err(|_| ProtocolError::InvalidUtf8)
    }
}

impl From<Frame> for Packet {
    fn from(frame: Frame) -> Self {
        Self::Frame(frame)
    }
}

/// Decode every frame and heart-beat contained in `input`.
///
/// # Errors
///
/// Fails on the first malformed frame. Use [`decode_packets_prefix`] to keep
/// the packets that precede it.
pub fn decode_packets(input: &[u8]) -> Result<Vec<Packet>> {
    match decode_packets_prefix(input) {
        (packets, None) => Ok(packets),
        (_, Some(err)) => Err(err),
    }
}

/// Decode packets up to the first malformed frame.
///
/// Returns the packets decoded before the failure together with the error.
/// Nothing after a bad frame is decoded, since its end is unknown.
pub fn decode_packets_prefix(input: &[u8]) -> (Vec<Packet>, Option<ProtocolError>) {
    let mut packets = Vec::new();
    let mut pos = 0;

    while pos < input.len() {
        let rest = &input[pos..];
        match rest {
            [LF, ..] => {
                packets.push(Packet::Heartbeat);
                pos += 1;
            },
            [CR, LF, ..] => {
                packets.push(Packet::Heartbeat);
                pos += 2;
            },
            _ => match parse_frame(rest) {
                Ok((frame, consumed)) => {
                    packets.push(Packet::Frame(frame));
                    pos += consumed;
                },
                Err(err) => return (packets, Some(err)),
            },
        }
    }

    (packets, None)
}

fn parse_frame(input: &[u8]) -> Result<(Frame, usize)> {
    let mut pos = 0;

    let command_line = read_line(input, &mut pos)?.ok_or(ProtocolError::Truncated("command"))?;
    let command = Command::parse(command_line)?;
    let escape = command.escapes_headers();

    let mut headers = Vec::new();
    loop {
        let line = read_line(input, &mut pos)?.ok_or(ProtocolError::Truncated("headers"))?;
        if line.is_empty() {
            break;
        }
        let (name, value) =
            line.split_once(':').ok_or_else(|| ProtocolError::MalformedHeader(line.to_string()))?;
        if escape {
            headers.push((unescape(name)?, unescape(value)?));
        } else {
            headers.push((name.to_string(), value.to_string()));
        }
    }

    let rest = &input[pos..];
    let content_length = headers
        .iter()
        .find(|(name, _)| name == "content-length")
        .map(|(_, value)| {
            value
                .trim()
                .parse::<usize>()
                .map_err(|_| ProtocolError::InvalidContentLength(value.clone()))
        })
        .transpose()?;

    let body_len = match content_length {
        Some(len) => {
            if len > MAX_BODY_SIZE {
                return Err(ProtocolError::BodyTooLarge { size: len, max: MAX_BODY_SIZE });
            }
            if rest.get(len) != Some(&NUL) {
                return Err(ProtocolError::Truncated("body"));
            }
            len
        },
        None => rest
            .iter()
            .position(|byte| *byte == NUL)
            .ok_or(ProtocolError::Truncated("frame terminator"))?,
    };

    if body_len > MAX_BODY_SIZE {
        return Err(ProtocolError::BodyTooLarge { size: body_len, max: MAX_BODY_SIZE });
    }

    let body = Bytes::copy_from_slice(&rest[..body_len]);
    Ok((Frame { command, headers, body }, pos + body_len + 1))
}

/// Read one line ending in LF (optional CR stripped). `None` if no LF remains.
fn read_line<'a>(input: &'a [u8], pos: &mut usize) -> Result<Option<&'a str>> {
    let rest = &input[*pos..];
    let Some(end) = rest.iter().position(|byte| *byte == LF) else {
        return Ok(None);
    };

    let mut line = &rest[..end];
    if let [head @ .., CR] = line {
        line = head;
    }
    *pos += end + 1;

    std::str::from_utf8(line).map(Some).map_err(|_| ProtocolError::InvalidUtf8)
}

fn escape_into(raw: &str, out: &mut String) {
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
}

fn unescape(raw: &str) -> Result<String> {
    if !raw.contains('\\') {
        return Ok(raw.to_string());
    }

    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some('c') => out.push(':'),
            Some('\\') => out.push('\\'),
            _ => return Err(ProtocolError::InvalidEscape(raw.to_string())),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_send_frame_adds_content_length() {
        let frame = Frame::new(Command::Send)
            .with_header("destination", "/app/sendMessage")
            .with_body(&b"{}"[..]);

        let bytes = frame.to_bytes().unwrap();
        assert_eq!(bytes, b"SEND\ndestination:/app/sendMessage\ncontent-length:2\n\n{}\0");
    }

    #[test]
    fn connect_headers_are_not_escaped() {
        let frame = Frame::new(Command::Connect).with_header("host", "chat:8080");
        let bytes = frame.to_bytes().unwrap();
        assert_eq!(bytes, b"CONNECT\nhost:chat:8080\n\n\0");
    }

    #[test]
    fn message_headers_escape_colons() {
        let frame = Frame::new(Command::Subscribe).with_header("id", "a:b");
        let bytes = frame.to_bytes().unwrap();
        assert_eq!(bytes, b"SUBSCRIBE\nid:a\\cb\n\n\0");

        let decoded = Frame::decode(&bytes).unwrap();
        assert_eq!(decoded.header("id"), Some("a:b"));
    }

    #[test]
    fn decode_message_with_crlf_lines() {
        let input = b"MESSAGE\r\ndestination:/topic/messages/7\r\nsubscription:sub-0\r\n\r\nhi\0";
        let frame = Frame::decode(input).unwrap();

        assert_eq!(frame.command, Command::Message);
        assert_eq!(frame.destination(), Some("/topic/messages/7"));
        assert_eq!(frame.header("subscription"), Some("sub-0"));
        assert_eq!(&frame.body[..], b"hi");
    }

    #[test]
    fn content_length_allows_embedded_nul() {
        let input = b"MESSAGE\ncontent-length:3\n\na\0b\0";
        let frame = Frame::decode(input).unwrap();
        assert_eq!(&frame.body[..], b"a\0b");
    }

    #[test]
    fn first_repeated_header_wins() {
        let input = b"MESSAGE\nfoo:first\nfoo:second\n\n\0";
        let frame = Frame::decode(input).unwrap();
        assert_eq!(frame.header("foo"), Some("first"));
    }

    #[test]
    fn decode_packets_splits_frames_and_heartbeats() {
        let input = b"\nRECEIPT\nreceipt-id:1\n\n\0\r\n\nMESSAGE\n\nx\0";
        let packets = decode_packets(input).unwrap();

        assert_eq!(packets.len(), 5);
        assert_eq!(packets[0], Packet::Heartbeat);
        assert!(matches!(&packets[1], Packet::Frame(f) if f.command == Command::Receipt));
        assert_eq!(packets[2], Packet::Heartbeat);
        assert_eq!(packets[3], Packet::Heartbeat);
        assert!(matches!(&packets[4], Packet::Frame(f) if f.command == Command::Message));
    }

    #[test]
    fn prefix_keeps_frames_before_malformed_one() {
        let input = b"RECEIPT\nreceipt-id:1\n\n\0\nSHOUT\n\n\0MESSAGE\n\nx\0";

        let (packets, err) = decode_packets_prefix(input);
        assert_eq!(packets.len(), 2);
        assert!(matches!(&packets[0], Packet::Frame(f) if f.command == Command::Receipt));
        assert_eq!(packets[1], Packet::Heartbeat);
        assert_eq!(err, Some(ProtocolError::UnknownCommand("SHOUT".into())));

        assert!(decode_packets(input).is_err());
    }

    #[test]
    fn missing_terminator_is_truncated() {
        let result = Frame::decode(b"MESSAGE\n\nno terminator");
        assert_eq!(result, Err(ProtocolError::Truncated("frame terminator")));
    }

    #[test]
    fn content_length_past_end_is_truncated() {
        let result = Frame::decode(b"MESSAGE\ncontent-length:10\n\nabc\0");
        assert_eq!(result, Err(ProtocolError::Truncated("body")));
    }

    #[test]
    fn unknown_command_rejected() {
        let result = Frame::decode(b"SHOUT\n\n\0");
        assert_eq!(result, Err(ProtocolError::UnknownCommand("SHOUT".into())));
    }

    #[test]
    fn header_without_separator_rejected() {
        let result = Frame::decode(b"MESSAGE\nbogus\n\n\0");
        assert!(matches!(result, Err(ProtocolError::MalformedHeader(_))));
    }

    #[test]
    fn undefined_escape_rejected() {
        let result = Frame::decode(b"MESSAGE\nfoo:bad\\t\n\n\0");
        assert!(matches!(result, Err(ProtocolError::InvalidEscape(_))));
    }

    #[test]
    fn heartbeat_encodes_as_newline() {
        assert_eq!(Packet::Heartbeat.encode().unwrap(), b"\n");
        assert_eq!(Packet::Heartbeat.to_text().unwrap(), "\n");
    }

    #[test]
    fn oversized_body_rejected_on_encode() {
        let frame = Frame::new(Command::Send).with_body(vec![b'a'; MAX_BODY_SIZE + 1]);
        assert!(matches!(frame.to_bytes(), Err(ProtocolError::BodyTooLarge { .. })));
    }
}
