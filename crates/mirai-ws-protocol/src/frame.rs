//! Inbound frame classification and the outbound command envelope.
//!
//! Every message on the channel is one JSON object. Inbound:
//!
//! ```json
//! {"syncId": "<string>", "data": { ... }}
//! ```
//!
//! The `syncId` decides what `data` is: empty for the authentication
//! handshake, the reserved event id for server-pushed events, and anything
//! else for the response to a command this client sent.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codec::{decode_chain, encode_chain};
use crate::types::{
    AuthInfo, CallId, CallKind, ClientSender, FriendMessage, FriendSender, GroupMessage,
    MemberSender, MessageChain, OtherClientMessage, PushedEvent, SendReceipt, StrangerMessage,
    TempMessage,
};
use crate::ProtocolError;

/// One classified inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// The authentication result sent right after the upgrade.
    Handshake(AuthInfo),
    /// A server-pushed event this engine models.
    Event(PushedEvent),
    /// A pushed event of a type this engine does not model. Not an error.
    Ignored {
        /// The event's `data.type`.
        kind: String,
    },
    /// The response to an outbound command. `data` is resolved against the
    /// caller's pending call before it is decoded.
    Response { call_id: CallId, data: Value },
}

impl Frame {
    /// Classifies one complete text message.
    ///
    /// `reserved_sync_id` is the id the server stamps on pushed events.
    ///
    /// # Errors
    ///
    /// Any [`ProtocolError`] means the message is malformed: not a JSON
    /// object, a non-string `syncId`, a non-object `data`, a `syncId` that is
    /// not an integer, or an event payload that fails to decode.
    pub fn parse(raw: &[u8], reserved_sync_id: i64) -> Result<Self, ProtocolError> {
        let mut root: Value = serde_json::from_slice(raw).map_err(ProtocolError::Decode)?;
        let object = root
            .as_object_mut()
            .ok_or_else(|| ProtocolError::InvalidFrame("not a JSON object".into()))?;

        let sync_id = match object.get("syncId") {
            Some(Value::String(id)) => id.clone(),
            Some(_) => {
                return Err(ProtocolError::InvalidField {
                    field: "syncId",
                    expected: "a string",
                })
            }
            None => return Err(ProtocolError::MissingField("syncId")),
        };
        let data = match object.remove("data") {
            Some(data @ Value::Object(_)) => data,
            Some(_) => {
                return Err(ProtocolError::InvalidField {
                    field: "data",
                    expected: "an object",
                })
            }
            None => return Err(ProtocolError::MissingField("data")),
        };

        if sync_id.is_empty() {
            return parse_auth(&data).map(Frame::Handshake);
        }

        let id: i64 = sync_id
            .trim()
            .parse()
            .map_err(|_| ProtocolError::InvalidFrame(format!("syncId {sync_id:?} is not an integer")))?;

        if id == reserved_sync_id {
            return parse_event(&data);
        }

        let call_id = CallId::from_sync_id(id)
            .ok_or_else(|| ProtocolError::InvalidFrame(format!("syncId {id} names no call")))?;
        Ok(Frame::Response {
            call_id,
            data,
        })
    }
}

fn parse_auth(data: &Value) -> Result<AuthInfo, ProtocolError> {
    let code = match data.get("code") {
        Some(code) => code.as_i64().ok_or(ProtocolError::InvalidField {
            field: "code",
            expected: "an integer",
        })?,
        None => return Err(ProtocolError::MissingField("code")),
    };
    let text = |key: &str| data.get(key).and_then(Value::as_str).map(str::to_string);
    Ok(AuthInfo {
        code,
        session: text("session"),
        message: text("msg"),
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessagePayload<S> {
    sender: S,
    message_chain: Vec<Value>,
}

fn payload<S: DeserializeOwned>(data: &Value) -> Result<(S, MessageChain), ProtocolError> {
    let MessagePayload {
        sender,
        message_chain,
    } = MessagePayload::<S>::deserialize(data).map_err(ProtocolError::Decode)?;
    let chain = decode_chain(&message_chain)?;
    Ok((sender, chain))
}

fn parse_event(data: &Value) -> Result<Frame, ProtocolError> {
    let kind = match data.get("type") {
        Some(Value::String(kind)) => kind.as_str(),
        Some(_) => {
            return Err(ProtocolError::InvalidField {
                field: "type",
                expected: "a string",
            })
        }
        None => return Err(ProtocolError::MissingField("type")),
    };

    let event = match kind {
        "FriendMessage" => {
            let (sender, chain) = payload::<FriendSender>(data)?;
            PushedEvent::Friend(FriendMessage { sender, chain })
        }
        "GroupMessage" => {
            let (sender, chain) = payload::<MemberSender>(data)?;
            PushedEvent::Group(GroupMessage { sender, chain })
        }
        "TempMessage" => {
            let (sender, chain) = payload::<MemberSender>(data)?;
            PushedEvent::Temp(TempMessage { sender, chain })
        }
        "StrangerMessage" => {
            let (sender, chain) = payload::<FriendSender>(data)?;
            PushedEvent::Stranger(StrangerMessage { sender, chain })
        }
        "OtherClientMessage" => {
            let (sender, chain) = payload::<ClientSender>(data)?;
            PushedEvent::OtherClient(OtherClientMessage { sender, chain })
        }
        other => {
            return Ok(Frame::Ignored {
                kind: other.to_string(),
            })
        }
    };
    Ok(Frame::Event(event))
}

/// Decodes the `data` of a send-command response.
///
/// # Errors
///
/// Returns [`ProtocolError::Decode`] if `code` or `msg` is missing, or any
/// field has the wrong JSON kind.
pub fn parse_receipt(data: &Value) -> Result<SendReceipt, ProtocolError> {
    SendReceipt::deserialize(data).map_err(ProtocolError::Decode)
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// Body of a send-message command.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageContent {
    /// Friend id or group id.
    pub target: i64,
    pub message_chain: Vec<Value>,
}

/// An outbound command envelope.
///
/// ```json
/// {"syncId": "5", "command": "sendGroupMessage", "subCommand": null,
///  "content": {"target": 123, "messageChain": [...]}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    pub sync_id: String,
    pub command: &'static str,
    pub sub_command: Option<String>,
    pub content: MessageContent,
}

impl Command {
    /// Builds a send-message command for an allocated call.
    pub fn send_message(call_id: CallId, kind: CallKind, target: i64, chain: &MessageChain) -> Self {
        Self {
            sync_id: call_id.0.to_string(),
            command: kind.command(),
            sub_command: None,
            content: MessageContent {
                target,
                message_chain: encode_chain(chain),
            },
        }
    }

    /// Serializes the envelope into the text sent on the wire.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Encode`] if serialization fails.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }
}

// =========================================================================
// Tests
// =========================================================================
