//! Events delivered to the application.

use mirai_ws_protocol::{
    AuthInfo, FriendMessage, GroupMessage, OtherClientMessage, ProtocolError, PushedEvent,
    StrangerMessage, TempMessage,
};
use mirai_ws_transport::TransportError;

/// Something that happened on the connection.
///
/// Events are passed to the [`EventHandler`] by reference and dropped when
/// the handler returns; clone what you need to keep.
#[derive(Debug)]
pub enum ClientEvent {
    /// Outcome of the connect attempt started by
    /// [`Client::connect`](crate::Client::connect).
    Connected(Result<(), TransportError>),
    /// The transport failed after connecting. The connection is torn down.
    NetworkError(TransportError),
    /// An inbound message could not be understood. The connection stays up.
    MalformedMessage {
        /// The message text, lossily decoded as UTF-8.
        raw: String,
        error: ProtocolError,
    },
    /// The server's answer to the authentication handshake.
    Auth(AuthInfo),
    FriendMessage(FriendMessage),
    GroupMessage(GroupMessage),
    TempMessage(TempMessage),
    StrangerMessage(StrangerMessage),
    OtherClientMessage(OtherClientMessage),
    /// Both halves of the connection are closed and everything is released.
    /// Always the last event.
    Closed,
}

impl From<PushedEvent> for ClientEvent {
    fn from(event: PushedEvent) -> Self {
        match event {
            PushedEvent::Friend(m) => Self::FriendMessage(m),
            PushedEvent::Group(m) => Self::GroupMessage(m),
            PushedEvent::Temp(m) => Self::TempMessage(m),
            PushedEvent::Stranger(m) => Self::StrangerMessage(m),
            PushedEvent::OtherClient(m) => Self::OtherClientMessage(m),
        }
    }
}

/// Receives [`ClientEvent`]s.
///
/// Called from the connection's tasks, one event at a time. Keep it quick:
/// the next inbound frame is not read until it returns. Sending from inside
/// the handler is fine, since sends never block.
///
/// Any `Fn(&ClientEvent)` closure is a handler.
pub trait EventHandler: Send + Sync + 'static {
    fn on_event(&self, event: &ClientEvent);
}

impl<F> EventHandler for F
where
    F: Fn(&ClientEvent) + Send + Sync + 'static,
{
    fn on_event(&self, event: &ClientEvent) {
        self(event)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use mirai_ws_protocol::{ClientSender, MessageChain};

    use super::*;

    #[test]
    fn test_closure_is_a_handler() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handler = move |event: &ClientEvent| {
            sink.lock().unwrap().push(format!("{event:?}"));
        };

        handler.on_event(&ClientEvent::Closed);
        assert_eq!(*seen.lock().unwrap(), vec!["Closed".to_string()]);
    }

    #[test]
    fn test_pushed_event_maps_to_client_event() {
        let pushed = PushedEvent::OtherClient(OtherClientMessage {
            sender: ClientSender {
                id: 1,
                platform: "MOBILE".into(),
            },
            chain: MessageChain::new(),
        });
        assert!(matches!(
            ClientEvent::from(pushed),
            ClientEvent::OtherClientMessage(_)
        ));
    }
}
