//! Wire protocol for the mirai-api-http WebSocket adapter.
//!
//! - **Types** ([`MessageChain`], [`MessageBlock`], [`PushedEvent`], ...):
//!   the typed message model handed to applications.
//! - **Codec** ([`decode_chain`], [`encode_chain`]): mapping chains to and
//!   from the wire's tagged-object arrays.
//! - **Frames** ([`Frame`], [`Command`]): classifying inbound messages and
//!   building outbound command envelopes.
//! - **Errors** ([`ProtocolError`]): everything that makes one message
//!   malformed.
//!
//! # Architecture
//!
//! The protocol layer knows nothing about sockets or pending calls. It turns
//! complete text messages into [`Frame`]s and chains into JSON values; the
//! client crate decides what to do with them.
//!
//! ```text
//! Transport (fragments) → reassembly → Frame::parse → dispatch
//! ```

mod codec;
mod error;
mod frame;
mod types;

pub use codec::{decode_chain, decode_chain_value, encode_chain};
pub use error::ProtocolError;
pub use frame::{parse_receipt, Command, Frame, MessageContent};
pub use types::{
    AuthInfo, CallId, CallKind, ClientSender, FriendMessage, FriendSender, GroupInfo,
    GroupMessage, Image, InertKind, MemberSender, MessageBlock, MessageChain,
    OtherClientMessage, PushedEvent, SendReceipt, Source, StrangerMessage, TempMessage, Voice,
};
