//! Pending-call correlation for mirai-ws.
//!
//! Every command the client sends carries a numeric `syncId`. The server's
//! response arrives later, on the same connection, interleaved with pushed
//! events. This crate remembers what each outstanding id was for:
//!
//! 1. **Allocation**: [`CallRegistry::allocate`] hands out the next id and
//!    stores the caller's continuation.
//! 2. **Resolution**: [`CallRegistry::resolve`] removes the entry for an id
//!    exactly once, returning the [`PendingCall`] to complete.
//!
//! # How it fits in the stack
//!
//! ```text
//! Client (above)  ← allocates on send, resolves on response
//!     ↕
//! Registry (this crate)  ← id → pending call
//!     ↕
//! Protocol (below)  ← provides CallId, CallKind, SendReceipt
//! ```

mod call;
mod error;
mod registry;

pub use call::{Continuation, PendingCall};
pub use error::RegistryError;
pub use registry::{CallRegistry, DEFAULT_CAPACITY};
