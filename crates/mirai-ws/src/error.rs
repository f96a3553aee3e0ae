//! Unified error type for the mirai-ws client.

use mirai_ws_protocol::ProtocolError;
use mirai_ws_registry::RegistryError;
use mirai_ws_transport::TransportError;

use crate::ConnectionState;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` conversions let `?` lift sub-crate errors automatically.
/// Only synchronous failures come back through this type; anything that
/// happens on the connection after `connect()` returns is reported as a
/// [`ClientEvent`](crate::ClientEvent).
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// A transport-level error (connect, send, receive).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encoding an outbound command).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Too many calls are waiting for responses.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The connection is not streaming, so nothing can be sent.
    #[error("not connected (state: {0})")]
    NotConnected(ConnectionState),

    /// The operation is not valid in the current connection state.
    #[error("cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: ConnectionState,
    },

    /// `connect()` was called outside a Tokio runtime.
    #[error("no Tokio runtime available to drive the connection")]
    NoRuntime,

    /// The connection closed before the server answered the call.
    #[error("call abandoned: connection closed before a response arrived")]
    CallAbandoned,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let client_err: ClientError = err.into();
        assert!(matches!(client_err, ClientError::Transport(_)));
        assert!(client_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::MissingSource;
        let client_err: ClientError = err.into();
        assert!(matches!(client_err, ClientError::Protocol(_)));
    }

    #[test]
    fn test_from_registry_error() {
        let err = RegistryError::Full { capacity: 4 };
        let client_err: ClientError = err.into();
        assert!(matches!(client_err, ClientError::Registry(_)));
        assert!(client_err.to_string().contains('4'));
    }

    #[test]
    fn test_invalid_state_message() {
        let err = ClientError::InvalidState {
            operation: "connect",
            state: ConnectionState::Streaming,
        };
        assert_eq!(err.to_string(), "cannot connect while streaming");
    }
}
