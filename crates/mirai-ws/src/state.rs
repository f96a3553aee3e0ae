//! Connection lifecycle states and teardown bookkeeping.

use std::fmt;

/// Where a connection is in its lifecycle.
///
/// ```text
/// Idle ──connect()──→ Handshaking ──upgraded──→ Streaming
///                         │                        │
///                         └──failure──→ Errored ←──┘
///                                          │
///                                          ▼
/// Idle / Handshaking / Streaming ──destroy()──→ Closing
///                                          │
///                                both halves closed
///                                          ▼
///                                       Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Created, `connect()` not called yet.
    Idle,
    /// Opening the socket and performing the WebSocket upgrade.
    Handshaking,
    /// Upgraded; frames flow in both directions.
    Streaming,
    /// The transport failed. Teardown follows.
    Errored,
    /// Both transport halves have been asked to close.
    Closing,
    /// Every resource is released. Terminal.
    Closed,
}

impl ConnectionState {
    /// Returns `true` if `next` is a legal successor of `self`.
    pub fn can_transition_to(self, next: Self) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Idle, Handshaking)
                | (Idle, Closing)
                | (Handshaking, Streaming)
                | (Handshaking, Errored)
                | (Handshaking, Closing)
                | (Streaming, Errored)
                | (Streaming, Closing)
                | (Errored, Closing)
                | (Closing, Closed)
        )
    }

    /// Returns `true` once teardown has started or finished.
    pub fn is_shutting_down(self) -> bool {
        matches!(self, Self::Errored | Self::Closing | Self::Closed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Handshaking => "handshaking",
            Self::Streaming => "streaming",
            Self::Errored => "errored",
            Self::Closing => "closing",
            Self::Closed => "closed",
        })
    }
}

/// One of the two independently-closed halves of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Half {
    /// The receiving half, driven by the reader task.
    Source,
    /// The sending half, driven by the writer task.
    Sink,
}

/// Waits for both halves to confirm closure.
///
/// [`confirm`](Self::confirm) returns `true` exactly once: on the call that
/// sees the second half close, whichever order they arrive in. Repeated
/// confirmations of the same half are ignored.
#[derive(Debug, Default)]
pub struct TeardownTracker {
    source_closed: bool,
    sink_closed: bool,
    finished: bool,
}

impl TeardownTracker {
    /// Creates a tracker with both halves open.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `half` has closed. Returns `true` if this completes the
    /// teardown.
    pub fn confirm(&mut self, half: Half) -> bool {
        match half {
            Half::Source => self.source_closed = true,
            Half::Sink => self.sink_closed = true,
        }
        if self.finished || !(self.source_closed && self.sink_closed) {
            return false;
        }
        self.finished = true;
        true
    }

    /// Returns `true` once both halves have closed.
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}
