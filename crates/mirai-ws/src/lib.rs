//! # mirai-ws
//!
//! Client-side protocol engine for the mirai-api-http WebSocket adapter.
//!
//! A [`Client`] holds one persistent connection to the bot gateway. It
//! decodes what the server pushes (authentication results, friend and group
//! messages) into typed [`ClientEvent`]s, and sends commands whose responses
//! arrive later on the same connection, matched back to the caller by their
//! `syncId`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mirai_ws::prelude::*;
//!
//! # async fn run() -> Result<(), ClientError> {
//! let config = ClientConfig::builder().verify_key("INITKEY").qq(10001).build();
//! let client = Client::new(config, |event: &ClientEvent| match event {
//!     ClientEvent::Auth(auth) if auth.is_success() => println!("authenticated"),
//!     ClientEvent::FriendMessage(m) => println!("{}: {}", m.sender.nickname, m.chain),
//!     _ => {}
//! });
//! client.connect()?;
//!
//! // Once streaming:
//! let chain = MessageChain::new().plain("hello");
//! let receipt = client.send_friend_message_and_wait(123456, &chain).await?;
//! println!("sent as message {}", receipt.message_id);
//! # Ok(())
//! # }
//! ```
//!
//! ## Crates
//!
//! ```text
//! mirai-ws            (this crate)  Client, dispatch, reassembly, lifecycle
//!   ├── mirai-ws-registry           pending-call correlation
//!   ├── mirai-ws-protocol           message model, codec, frames
//!   └── mirai-ws-transport          connector traits, WebSocket connector
//! ```

mod client;
mod config;
mod dispatch;
mod error;
mod event;
mod reassembly;
mod state;

pub use client::Client;
pub use config::{ClientConfig, ClientConfigBuilder};
pub use dispatch::Dispatcher;
pub use error::ClientError;
pub use event::{ClientEvent, EventHandler};
pub use reassembly::{Reassembler, Reassembly, DEFAULT_MAX_MESSAGE_SIZE};
pub use state::{ConnectionState, Half, TeardownTracker};

pub use mirai_ws_protocol as protocol;
pub use mirai_ws_registry as registry;
pub use mirai_ws_transport as transport;

/// Everything needed to run a bot.
pub mod prelude {
    pub use crate::{Client, ClientConfig, ClientError, ClientEvent, ConnectionState, EventHandler};
    pub use mirai_ws_protocol::{
        AuthInfo, CallId, FriendMessage, GroupMessage, Image, MessageBlock, MessageChain,
        SendReceipt, Voice,
    };
}
