//! One endpoint of a paired channel.
//!
//! Wraps a blocking WebSocket session and performs the service's handshake.
//! Every way the transport can report the end of a session (close frame,
//! closed-connection error, reset, zero-length payload) is surfaced as a
//! single [`Received::Closed`] signal so scenario code never has to care
//! which one the service used.

use crate::error::{HarnessError, Result};
use crate::frame::Handshake;
use std::io::ErrorKind;
use std::net::TcpStream;
use std::time::Duration;
use tracing::{debug, trace};
use tungstenite::error::ProtocolError;
use tungstenite::protocol::frame::coding::CloseCode;
use tungstenite::protocol::CloseFrame;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Error as WsError, Message, WebSocket};

/// How long `close` waits for the service to acknowledge the close handshake.
const CLOSE_ACK_TIMEOUT: Duration = Duration::from_secs(1);

/// Shortest read timeout used for a bounded receive.
const MIN_READ_TIMEOUT: Duration = Duration::from_millis(1);

/// Outcome of a receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    /// A non-empty payload.
    Message(String),
    /// The session is no longer connected; carries a description of how.
    Closed(String),
}

impl Received {
    /// Returns true for the close signal.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed(_))
    }
}

/// A client session paired through the service.
pub struct PairedConnection {
    socket: WebSocket<MaybeTlsStream<TcpStream>>,
    handshake: Handshake,
    url: String,
    closed: Option<String>,
}

impl PairedConnection {
    /// Connect to `url` and read the handshake frame.
    ///
    /// # Errors
    ///
    /// - `Refused` if the service rejects the upgrade with an HTTP status
    /// - `Closed` if the service drops the session before the handshake
    /// - `Handshake` if the first frame is not a valid control frame
    /// - `Transport` for any other connect failure
    pub fn connect(url: &str) -> Result<Self> {
        debug!(url, "connecting");
        let (socket, _response) = tungstenite::connect(url).map_err(|e| match e {
            WsError::Http(response) => HarnessError::Refused {
                status: response.status().as_u16(),
            },
            other if is_close_error(&other) => HarnessError::Closed(format!("during upgrade: {other}")),
            other => HarnessError::Transport(format!("connect to {url}: {other}")),
        })?;

        let mut conn = Self {
            socket,
            handshake: Handshake {
                link: String::new(),
                channel_id: String::new(),
            },
            url: url.to_string(),
            closed: None,
        };

        conn.handshake = match conn.receive()? {
            Received::Message(text) => Handshake::parse(&text)?,
            Received::Closed(reason) => return Err(HarnessError::Closed(reason)),
        };
        debug!(
            url,
            link = %conn.handshake.link,
            channel_id = %conn.handshake.channel_id,
            "handshake complete"
        );

        Ok(conn)
    }

    /// Routing path the peer connects to.
    pub fn link(&self) -> &str {
        &self.handshake.link
    }

    /// Identifier of this connection's channel.
    pub fn channel_id(&self) -> &str {
        &self.handshake.channel_id
    }

    /// Decoded handshake frame.
    pub fn handshake(&self) -> &Handshake {
        &self.handshake
    }

    /// URL this connection was opened with.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send a text message.
    ///
    /// Returns `Closed` if the session has been closed by either side.
    pub fn send(&mut self, message: &str) -> Result<()> {
        if let Some(reason) = &self.closed {
            return Err(HarnessError::Closed(reason.clone()));
        }
        trace!(url = %self.url, len = message.len(), "send");
        match self.socket.send(Message::text(message.to_owned())) {
            Ok(()) => Ok(()),
            Err(e) if is_close_error(&e) => Err(HarnessError::Closed(self.mark_closed(e.to_string()))),
            Err(e) => Err(HarnessError::Transport(e.to_string())),
        }
    }

    /// Block until a payload or a close signal arrives.
    pub fn receive(&mut self) -> Result<Received> {
        loop {
            if let Some(received) = self.poll()? {
                return Ok(received);
            }
        }
    }

    /// Like [`receive`](Self::receive), but gives up after `timeout`.
    ///
    /// Returns `None` if nothing arrived in time. A zero `timeout` polls once.
    pub fn receive_timeout(&mut self, timeout: Duration) -> Result<Option<Received>> {
        if self.closed.is_some() {
            return self.poll();
        }
        // A zero read timeout is rejected by the OS.
        self.set_read_timeout(Some(timeout.max(MIN_READ_TIMEOUT)))?;
        let received = self.poll();
        self.set_read_timeout(None)?;
        received
    }

    /// Whether the session is no longer connected.
    pub fn is_closed(&self) -> bool {
        self.closed.is_some() || !self.socket.can_write()
    }

    /// Close the session gracefully with a human-readable reason.
    pub fn close(&mut self, reason: &str) -> Result<()> {
        if self.is_closed() {
            return Ok(());
        }
        debug!(url = %self.url, reason, "closing");
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: reason.to_string().into(),
        };
        match self.socket.close(Some(frame)) {
            Ok(()) => {}
            Err(e) if is_close_error(&e) => {
                self.mark_closed(e.to_string());
                return Ok(());
            }
            Err(e) => return Err(HarnessError::Transport(e.to_string())),
        }

        // Drain until the service acknowledges; ignore anything still in flight.
        self.set_read_timeout(Some(CLOSE_ACK_TIMEOUT))?;
        loop {
            match self.socket.read() {
                Ok(_) => continue,
                Err(_) => break,
            }
        }
        self.mark_closed(format!("closed by harness: {reason}"));
        Ok(())
    }

    /// Read the next frame. `None` means the read timed out.
    fn poll(&mut self) -> Result<Option<Received>> {
        if let Some(reason) = &self.closed {
            return Ok(Some(Received::Closed(reason.clone())));
        }
        loop {
            let message = match self.socket.read() {
                Ok(message) => message,
                Err(WsError::Io(e))
                    if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
                {
                    return Ok(None);
                }
                Err(e) if is_close_error(&e) => {
                    return Ok(Some(Received::Closed(self.mark_closed(e.to_string()))));
                }
                Err(e) => return Err(HarnessError::Transport(e.to_string())),
            };

            match message {
                Message::Text(text) => {
                    if text.is_empty() {
                        return Ok(Some(Received::Closed(self.mark_closed("empty frame".into()))));
                    }
                    return Ok(Some(Received::Message(text.as_str().to_owned())));
                }
                Message::Binary(data) => {
                    if data.is_empty() {
                        return Ok(Some(Received::Closed(self.mark_closed("empty frame".into()))));
                    }
                    let text = String::from_utf8(data.to_vec())
                        .map_err(|e| HarnessError::Frame(format!("binary frame is not UTF-8: {e}")))?;
                    return Ok(Some(Received::Message(text)));
                }
                Message::Close(frame) => {
                    let reason = match frame {
                        Some(f) => format!("close frame {} {}", u16::from(f.code), &*f.reason),
                        None => "close frame".to_string(),
                    };
                    // Sends our half of the close handshake.
                    let _ = self.socket.flush();
                    return Ok(Some(Received::Closed(self.mark_closed(reason))));
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            }
        }
    }

    fn mark_closed(&mut self, reason: String) -> String {
        debug!(url = %self.url, %reason, "session closed");
        self.closed = Some(reason.clone());
        reason
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match self.socket.get_ref() {
            MaybeTlsStream::Plain(stream) => Ok(stream.set_read_timeout(timeout)?),
            _ => Err(HarnessError::Transport(
                "read timeouts require a plain TCP stream".to_string(),
            )),
        }
    }
}

/// Whether a transport error means the far end is gone.
fn is_close_error(err: &WsError) -> bool {
    match err {
        WsError::ConnectionClosed | WsError::AlreadyClosed => true,
        WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake) => true,
        WsError::Protocol(ProtocolError::SendAfterClosing) => true,
        WsError::Io(e) => matches!(
            e.kind(),
            ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
                | ErrorKind::BrokenPipe
                | ErrorKind::UnexpectedEof
        ),
        _ => false,
    }
}
