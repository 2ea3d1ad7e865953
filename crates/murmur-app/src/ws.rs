//! WebSocket transport driver.
//!
//! Carries STOMP frames as WebSocket text messages. One text message may hold
//! several frames and heart-beats; they are split and queued so the runtime
//! sees one packet at a time.

use std::collections::VecDeque;

use futures::{SinkExt, StreamExt};
use murmur_proto::{Packet, ProtocolError, decode_packets_prefix};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{self, Message},
};
use tracing::{debug, warn};

use crate::{Driver, TransportEvent};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport errors.
#[derive(Debug, Error)]
pub enum WsError {
    /// Handshake or socket failure.
    #[error("websocket: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// Packet could not be encoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Write attempted without an open transport.
    #[error("transport not open")]
    NotOpen,
}

/// [`Driver`] over a raw WebSocket endpoint (e.g. `ws://host/ws/websocket`).
pub struct WsDriver {
    url: String,
    stream: Option<WsStream>,
    inbox: VecDeque<TransportEvent>,
}

impl WsDriver {
    /// Driver for `url`. Nothing is opened until the runtime asks.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), stream: None, inbox: VecDeque::new() }
    }

    /// Endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Frames ahead of a malformed one are still delivered.
    fn on_text(&mut self, text: &str) {
        let (packets, err) = decode_packets_prefix(text.as_bytes());
        self.inbox.extend(packets.into_iter().map(TransportEvent::Packet));
        if let Some(err) = err {
            self.inbox.push_back(TransportEvent::Garbled(err));
        }
    }

    fn closed(&mut self, reason: Option<String>) -> TransportEvent {
        self.stream = None;
        self.inbox.clear();
        TransportEvent::Closed { reason }
    }
}

impl Driver for WsDriver {
    type Error = WsError;

    async fn open(&mut self) -> Result<(), Self::Error> {
        debug!(url = %self.url, "opening websocket");
        let (stream, _response) = connect_async(self.url.as_str()).await?;
        self.stream = Some(stream);
        self.inbox.clear();
        Ok(())
    }

    async fn send(&mut self, packet: Packet) -> Result<(), Self::Error> {
        let stream = self.stream.as_mut().ok_or(WsError::NotOpen)?;
        let text = packet.to_text()?;
        stream.send(Message::Text(text.into())).await?;
        Ok(())
    }

    async fn next_event(&mut self) -> TransportEvent {
        loop {
            if let Some(event) = self.inbox.pop_front() {
                return event;
            }

            let Some(stream) = self.stream.as_mut() else {
                return std::future::pending().await;
            };

            match stream.next().await {
                Some(Ok(Message::Text(text))) => self.on_text(text.as_str()),
                Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                    Ok(text) => self.on_text(text),
                    Err(err) => warn!(%err, "dropping non UTF-8 binary message"),
                },
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame.map(|f| f.reason.to_string()).filter(|r| !r.is_empty());
                    debug!(?reason, "websocket closed by peer");
                    // A close frame from the server is still an unexpected drop
                    return self.closed(Some(reason.unwrap_or_else(|| "closed by peer".into())));
                },
                // Ping/pong are answered by tungstenite
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {},
                Some(Err(err)) => return self.closed(Some(err.to_string())),
                None => return self.closed(Some("stream ended".to_string())),
            }
        }
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take()
            && let Err(err) = stream.close(None).await
        {
            debug!(%err, "websocket close failed");
        }
        self.inbox.clear();
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }
}
