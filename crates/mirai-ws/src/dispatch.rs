//! Routing of complete inbound messages.
//!
//! Every reassembled message goes through [`Dispatcher::dispatch`]:
//!   1. Classify it with [`Frame::parse`]
//!   2. Handshake → `Auth` event
//!   3. Pushed event → typed message event (unknown types are dropped)
//!   4. Response → resolve the pending call and run its continuation
//!
//! Anything that fails along the way becomes one `MalformedMessage` event.

use std::sync::Arc;

use mirai_ws_protocol::{parse_receipt, Frame, ProtocolError};
use mirai_ws_registry::CallRegistry;

use crate::{ClientEvent, EventHandler};

/// Routes complete inbound messages to the handler or the call registry.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<CallRegistry>,
    handler: Arc<dyn EventHandler>,
    reserved_sync_id: i64,
}

impl Dispatcher {
    /// Creates a dispatcher. `reserved_sync_id` is the `syncId` the server
    /// uses for pushed events.
    pub fn new(
        registry: Arc<CallRegistry>,
        handler: Arc<dyn EventHandler>,
        reserved_sync_id: i64,
    ) -> Self {
        Self {
            registry,
            handler,
            reserved_sync_id,
        }
    }

    /// Handles one complete message.
    pub fn dispatch(&self, raw: &[u8]) {
        let frame = match Frame::parse(raw, self.reserved_sync_id) {
            Ok(frame) => frame,
            Err(error) => return self.malformed(raw, error),
        };

        match frame {
            Frame::Handshake(auth) => {
                tracing::debug!(code = auth.code, "handshake result");
                self.handler.on_event(&ClientEvent::Auth(auth));
            }
            Frame::Event(event) => {
                self.handler.on_event(&ClientEvent::from(event));
            }
            Frame::Ignored { kind } => {
                tracing::debug!(%kind, "ignoring unmodeled event");
            }
            Frame::Response { call_id, data } => {
                let Some(call) = self.registry.resolve(call_id) else {
                    let error = ProtocolError::InvalidFrame(format!("no pending call for {call_id}"));
                    return self.malformed(raw, error);
                };
                match parse_receipt(&data) {
                    Ok(receipt) => {
                        tracing::debug!(%call_id, code = receipt.code, "call resolved");
                        call.complete(receipt);
                    }
                    // The call is consumed either way; its continuation is
                    // dropped without running.
                    Err(error) => self.malformed(raw, error),
                }
            }
        }
    }

    /// Reports a message that could not be handled.
    pub fn malformed(&self, raw: &[u8], error: ProtocolError) {
        tracing::warn!(%error, len = raw.len(), "malformed message");
        self.handler.on_event(&ClientEvent::MalformedMessage {
            raw: String::from_utf8_lossy(raw).into_owned(),
            error,
        });
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("reserved_sync_id", &self.reserved_sync_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use mirai_ws_protocol::{CallKind, SendReceipt};
    use serde_json::json;

    use super::*;

    /// Records a short description of every event it receives.
    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl EventHandler for Recorder {
        fn on_event(&self, event: &ClientEvent) {
            let line = match event {
                ClientEvent::Auth(auth) => format!(
                    "auth {} {:?} {:?}",
                    auth.code, auth.session, auth.message
                ),
                ClientEvent::FriendMessage(m) => format!("friend {} {}", m.sender.id, m.chain),
                ClientEvent::GroupMessage(m) => format!("group {}", m.sender.group.id),
                ClientEvent::MalformedMessage { .. } => "malformed".to_string(),
                other => format!("{other:?}"),
            };
            self.0.lock().unwrap().push(line);
        }
    }

    fn setup() -> (Dispatcher, Arc<Recorder>, Arc<CallRegistry>) {
        let recorder = Arc::new(Recorder::default());
        let registry = Arc::new(CallRegistry::default());
        let dispatcher = Dispatcher::new(Arc::clone(&registry), recorder.clone(), 0);
        (dispatcher, recorder, registry)
    }

    fn events(recorder: &Recorder) -> Vec<String> {
        recorder.0.lock().unwrap().clone()
    }

    #[test]
    fn test_handshake_becomes_auth_event() {
        let (dispatcher, recorder, _) = setup();
        dispatcher.dispatch(br#"{"syncId":"","data":{"code":0,"session":"abc"}}"#);
        assert_eq!(events(&recorder), vec![r#"auth 0 Some("abc") None"#]);
    }

    #[test]
    fn test_friend_message_is_delivered() {
        let (dispatcher, recorder, _) = setup();
        let raw = json!({
            "syncId": "0",
            "data": {
                "type": "FriendMessage",
                "sender": {"id": 7, "nickname": "n", "remark": "r"},
                "messageChain": [
                    {"type": "Source", "id": 1, "time": 1},
                    {"type": "Plain", "text": "hey"}
                ]
            }
        });
        dispatcher.dispatch(raw.to_string().as_bytes());
        assert_eq!(events(&recorder), vec!["friend 7 hey"]);
    }

    #[test]
    fn test_unknown_event_type_emits_nothing() {
        let (dispatcher, recorder, _) = setup();
        dispatcher.dispatch(br#"{"syncId":"0","data":{"type":"UnknownFutureType"}}"#);
        assert!(events(&recorder).is_empty());
    }

    #[test]
    fn test_response_without_pending_call_is_malformed() {
        let (dispatcher, recorder, _) = setup();
        dispatcher.dispatch(br#"{"syncId":"42","data":{"code":0,"msg":"success"}}"#);
        assert_eq!(events(&recorder), vec!["malformed"]);
    }

    #[test]
    fn test_response_runs_continuation_once() {
        let (dispatcher, recorder, registry) = setup();
        let received = Arc::new(Mutex::new(None::<SendReceipt>));
        let slot = Arc::clone(&received);
        let id = registry
            .allocate(CallKind::FriendMessage, move |receipt| {
                *slot.lock().unwrap() = Some(receipt);
            })
            .unwrap();

        let raw = json!({"syncId": id.0.to_string(), "data": {"code": 0, "msg": "success", "messageId": 321}});
        dispatcher.dispatch(raw.to_string().as_bytes());

        let receipt = received.lock().unwrap().clone().expect("continuation should run");
        assert_eq!(receipt.message_id, 321);
        assert!(events(&recorder).is_empty());
        assert!(registry.is_empty());

        // A duplicate response finds nothing.
        dispatcher.dispatch(raw.to_string().as_bytes());
        assert_eq!(events(&recorder), vec!["malformed"]);
    }

    #[test]
    fn test_bad_receipt_consumes_call_without_running_it() {
        let (dispatcher, recorder, registry) = setup();
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&hits);
        let id = registry
            .allocate(CallKind::GroupMessage, move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        let raw = json!({"syncId": id.0.to_string(), "data": {"msg": "no code"}});
        dispatcher.dispatch(raw.to_string().as_bytes());

        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(registry.is_empty());
        assert_eq!(events(&recorder), vec!["malformed"]);
    }

    #[test]
    fn test_garbage_is_malformed_with_raw_text() {
        let recorder = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&recorder);
        let handler = move |event: &ClientEvent| {
            if let ClientEvent::MalformedMessage { raw, .. } = event {
                sink.lock().unwrap().push(raw.clone());
            }
        };
        let dispatcher = Dispatcher::new(Arc::new(CallRegistry::default()), Arc::new(handler), 0);

        dispatcher.dispatch(b"not json \xff");
        assert_eq!(*recorder.lock().unwrap(), vec!["not json \u{fffd}".to_string()]);
    }
}
