//! Transport abstraction layer for mirai-ws.
//!
//! Provides the [`Connector`], [`FrameSource`], and [`FrameSink`] traits that
//! abstract over the streaming socket underneath the protocol engine. The
//! engine only ever sees text fragments coming in and text messages going
//! out; sockets, TLS, and the HTTP upgrade live behind these traits.
//!
//! A connection is split in two halves right after the upgrade:
//!
//! ```text
//!                 ┌──────────────┐
//!   recv() ◄──────│  FrameSource │◄──── server frames
//!                 └──────────────┘
//!                 ┌──────────────┐
//!   send_text() ─►│  FrameSink   │────► server
//!                 └──────────────┘
//! ```
//!
//! Each half is owned by its own task and closed independently.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket connector via `tokio-tungstenite`
//! - `tls`: `wss://` endpoints through the rustls backend

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnector, WebSocketSink, WebSocketSource};

use std::fmt;
use std::future::Future;

/// Opaque identifier for a connection, used in log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Where to connect and what to present during the upgrade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Host name or IP address of the server.
    pub server_name: String,
    /// TCP port.
    pub port: u16,
    /// Use TLS (`wss://`) instead of plain `ws://`.
    pub secure: bool,
    /// Request path, including the leading `/`.
    pub path: String,
    /// Extra request headers sent with the upgrade request.
    pub headers: Vec<(String, String)>,
    /// Largest inbound message the transport will accept, in bytes. `None`
    /// leaves the transport's own default in place.
    pub max_message_size: Option<usize>,
}

impl Endpoint {
    /// Creates an endpoint with path `/` and no extra headers.
    pub fn new(server_name: impl Into<String>, port: u16, secure: bool) -> Self {
        Self {
            server_name: server_name.into(),
            port,
            secure,
            path: "/".to_string(),
            headers: Vec::new(),
            max_message_size: None,
        }
    }

    /// Sets the request path.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Adds a request header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Caps the size of inbound messages.
    pub fn max_message_size(mut self, limit: usize) -> Self {
        self.max_message_size = Some(limit);
        self
    }

    /// Renders the endpoint as a `ws://` or `wss://` URL.
    ///
    /// IPv6 literals are wrapped in brackets.
    pub fn url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        let host = if self.server_name.contains(':') && !self.server_name.starts_with('[') {
            format!("[{}]", self.server_name)
        } else {
            self.server_name.clone()
        };
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };
        format!("{scheme}://{host}:{}{path}", self.port)
    }
}

/// What kind of payload a fragment carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKind {
    /// UTF-8 text; the only kind the protocol engine consumes.
    Text,
    /// Binary payload; ignored by the engine.
    Binary,
}

/// One receive completion: a slice of a logical message.
///
/// `is_final` marks the last fragment of a message. A transport that
/// already reassembles messages itself delivers every message as a single
/// final fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// The bytes received in this completion.
    pub data: Vec<u8>,
    /// `true` if this fragment ends the logical message.
    pub is_final: bool,
    /// Payload kind.
    pub kind: FragmentKind,
}

impl Fragment {
    /// A complete text message in one fragment.
    pub fn text(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            is_final: true,
            kind: FragmentKind::Text,
        }
    }

    /// A non-final text fragment.
    pub fn partial(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            is_final: false,
            kind: FragmentKind::Text,
        }
    }
}

/// Opens connections to an [`Endpoint`].
///
/// Opening the session, connecting, and completing the protocol upgrade are
/// collapsed into one awaited operation. On success the connection is handed
/// back as two independently owned halves.
pub trait Connector: Send + Sync + 'static {
    /// The outbound half.
    type Sink: FrameSink;
    /// The inbound half.
    type Source: FrameSource;

    /// Connects and upgrades, returning the two halves of the stream.
    fn connect(
        &self,
        endpoint: &Endpoint,
    ) -> impl Future<Output = Result<(Self::Sink, Self::Source), TransportError>> + Send;
}

/// The receiving half of a connection.
pub trait FrameSource: Send + 'static {
    /// Waits for the next fragment.
    ///
    /// Returns `Ok(None)` when the peer closed the stream cleanly.
    fn recv(&mut self) -> impl Future<Output = Result<Option<Fragment>, TransportError>> + Send;

    /// Releases the receiving half.
    fn close(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// The sending half of a connection.
pub trait FrameSink: Send + 'static {
    /// Sends one complete text message.
    fn send_text(&mut self, text: String) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Sends a close frame and releases the sending half.
    fn close(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;
}
