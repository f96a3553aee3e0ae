/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The endpoint could not be turned into a valid upgrade request
    /// (bad host, bad header name or value).
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Opening the connection or completing the upgrade failed.
    #[error("connect failed: {0}")]
    ConnectFailed(#[source] std::io::Error),

    /// The connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// An inbound message exceeded the endpoint's size limit. The stream
    /// cannot continue past it.
    #[error("inbound message exceeds the {limit}-byte limit")]
    MessageTooLarge { limit: usize },

    /// Closing one half of the connection failed.
    #[error("close failed: {0}")]
    CloseFailed(#[source] std::io::Error),
}
