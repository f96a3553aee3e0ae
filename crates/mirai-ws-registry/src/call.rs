//! A call waiting for its response.

use std::fmt;

use mirai_ws_protocol::{CallId, CallKind, SendReceipt};

/// Code run once with the server's receipt for a call.
pub type Continuation = Box<dyn FnOnce(SendReceipt) + Send + 'static>;

/// An outbound call that has been sent but not yet answered.
///
/// Owned by the registry until [`resolve`](crate::CallRegistry::resolve)
/// hands it back. Dropping it without calling [`complete`](Self::complete)
/// abandons the call: the continuation never runs.
pub struct PendingCall {
    id: CallId,
    kind: CallKind,
    continuation: Continuation,
}

impl PendingCall {
    pub(crate) fn new(id: CallId, kind: CallKind, continuation: Continuation) -> Self {
        Self {
            id,
            kind,
            continuation,
        }
    }

    /// The id the call was sent with.
    pub fn id(&self) -> CallId {
        self.id
    }

    /// What the call was.
    pub fn kind(&self) -> CallKind {
        self.kind
    }

    /// Runs the continuation with the server's receipt, consuming the call.
    pub fn complete(self, receipt: SendReceipt) {
        (self.continuation)(receipt);
    }
}

impl fmt::Debug for PendingCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingCall")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}
