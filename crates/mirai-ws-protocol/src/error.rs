//! Error types for the protocol layer.
//!
//! Every variant describes a problem with one message: a frame that is not
//! valid JSON, an envelope with the wrong shape, or a message chain that
//! fails the per-block field checks. None of them are fatal to the
//! connection; the dispatcher reports them and moves on to the next frame.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning an outbound command into JSON text).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, a missing required field,
    /// or a field holding the wrong JSON kind.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// A required field is absent.
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    /// A field is present but holds the wrong JSON kind.
    #[error("field `{field}` must be {expected}")]
    InvalidField {
        /// The offending field name.
        field: &'static str,
        /// The JSON kind that was expected ("a string", "an integer", ...).
        expected: &'static str,
    },

    /// A received message chain carries no `Source` marker.
    #[error("message chain has no Source marker")]
    MissingSource,

    /// A message block carries a `type` tag this engine does not know.
    #[error("unknown message block type {0:?}")]
    UnknownBlock(String),

    /// The envelope itself is invalid (bad `syncId`, wrong top-level shape).
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// A message grew past the receive buffer without reaching its end.
    #[error("message exceeds the {limit}-byte receive buffer")]
    MessageTooLarge {
        /// The receive buffer capacity in bytes.
        limit: usize,
    },
}
