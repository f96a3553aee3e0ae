//! WebSocket connector implementation using `tokio-tungstenite`.

use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::error::CapacityError;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use crate::{
    ConnectionId, Connector, Endpoint, Fragment, FragmentKind, FrameSink, FrameSource,
    TransportError,
};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// A [`Connector`] that dials WebSocket endpoints.
///
/// `tungstenite` reassembles continuation frames itself, so every message
/// arrives from [`WebSocketSource`] as one final [`Fragment`]. The endpoint's
/// `max_message_size` is handed to `tungstenite` as both its frame and
/// message limit, so an oversized message is refused before it is buffered.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl Connector for WebSocketConnector {
    type Sink = WebSocketSink;
    type Source = WebSocketSource;

    async fn connect(
        &self,
        endpoint: &Endpoint,
    ) -> Result<(Self::Sink, Self::Source), TransportError> {
        let url = endpoint.url();
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::InvalidEndpoint(e.to_string()))?;

        for (name, value) in &endpoint.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TransportError::InvalidEndpoint(format!("header {name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| TransportError::InvalidEndpoint(format!("header {name}: {e}")))?;
            request.headers_mut().insert(name, value);
        }

        let config = endpoint.max_message_size.map(|limit| {
            WebSocketConfig::default()
                .max_message_size(Some(limit))
                .max_frame_size(Some(limit))
        });
        let (ws, response) = tokio_tungstenite::connect_async_with_config(request, config, false)
            .await
            .map_err(|e| {
                TransportError::ConnectFailed(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    e,
                ))
            })?;

        let id = ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(%id, %url, status = %response.status(), "WebSocket upgrade complete");

        let (sink, stream) = ws.split();
        Ok((
            WebSocketSink { id, sink },
            WebSocketSource { id, stream },
        ))
    }
}

/// The sending half of a WebSocket connection.
pub struct WebSocketSink {
    id: ConnectionId,
    sink: SplitSink<WsStream, Message>,
}

impl WebSocketSink {
    /// Returns the connection this half belongs to.
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl FrameSink for WebSocketSink {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.sink
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| {
                TransportError::SendFailed(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    e,
                ))
            })
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        tracing::trace!(id = %self.id, "closing WebSocket sink");
        self.sink.close().await.map_err(|e| {
            TransportError::CloseFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }
}

/// The receiving half of a WebSocket connection.
pub struct WebSocketSource {
    id: ConnectionId,
    stream: SplitStream<WsStream>,
}

impl WebSocketSource {
    /// Returns the connection this half belongs to.
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl FrameSource for WebSocketSource {
    async fn recv(&mut self) -> Result<Option<Fragment>, TransportError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(Fragment::text(text.as_bytes().to_vec())));
                }
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(Fragment {
                        data: data.to_vec(),
                        is_final: true,
                        kind: FragmentKind::Binary,
                    }));
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!(id = %self.id, ?frame, "server sent close frame");
                    return Ok(None);
                }
                None => return Ok(None),
                Some(Ok(_)) => continue, // ping/pong/raw frame
                Some(Err(WsError::Capacity(CapacityError::MessageTooLong { size, max_size }))) => {
                    tracing::warn!(id = %self.id, size, limit = max_size, "inbound message too large");
                    return Err(TransportError::MessageTooLarge { limit: max_size });
                }
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(std::io::Error::new(
                        std::io::ErrorKind::ConnectionReset,
                        e,
                    )));
                }
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        // The socket itself is shut down through the sink; dropping the
        // stream releases this half.
        tracing::trace!(id = %self.id, "closing WebSocket source");
        Ok(())
    }
}
