//! Receive-side message reassembly.
//!
//! The transport may deliver one text message as several fragments. They are
//! accumulated in a buffer of fixed capacity until the final fragment
//! arrives; then the whole message is handed to the dispatcher and the
//! buffer starts over.

use mirai_ws_transport::Fragment;

/// Default receive buffer capacity in bytes.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// What happened to one pushed fragment.
#[derive(Debug, PartialEq, Eq)]
pub enum Reassembly {
    /// Buffered; the message continues.
    Partial,
    /// The final fragment arrived. Holds the whole message.
    Complete(Vec<u8>),
    /// The message outgrew the buffer. Holds what was buffered plus the
    /// fragment that overflowed it. The rest of the message will be skipped.
    Overflowed(Vec<u8>),
    /// Dropped: part of a message that already overflowed.
    Skipped,
}

/// Accumulates fragments into complete messages.
#[derive(Debug)]
pub struct Reassembler {
    buffer: Vec<u8>,
    capacity: usize,
    /// Set while skipping the tail of an overflowed message.
    discarding: bool,
}

impl Reassembler {
    /// Creates a reassembler that holds at most `capacity` bytes per message.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: Vec::new(),
            capacity,
            discarding: false,
        }
    }

    /// Appends one fragment.
    pub fn push(&mut self, fragment: &Fragment) -> Reassembly {
        if self.discarding {
            if fragment.is_final {
                self.discarding = false;
            }
            return Reassembly::Skipped;
        }

        if self.buffer.len() + fragment.data.len() > self.capacity {
            self.discarding = !fragment.is_final;
            let mut partial = std::mem::take(&mut self.buffer);
            partial.extend_from_slice(&fragment.data);
            return Reassembly::Overflowed(partial);
        }

        self.buffer.extend_from_slice(&fragment.data);
        if fragment.is_final {
            Reassembly::Complete(std::mem::take(&mut self.buffer))
        } else {
            Reassembly::Partial
        }
    }

    /// Bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// The buffer capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_final_fragment_completes() {
        let mut r = Reassembler::default();
        assert_eq!(
            r.push(&Fragment::text("hello")),
            Reassembly::Complete(b"hello".to_vec())
        );
        assert_eq!(r.buffered(), 0);
    }

    #[test]
    fn test_fragments_concatenate_and_reset() {
        let mut r = Reassembler::default();
        assert_eq!(r.push(&Fragment::partial("{\"sync")), Reassembly::Partial);
        assert_eq!(r.push(&Fragment::partial("Id\":\"\",")), Reassembly::Partial);
        assert_eq!(r.buffered(), 13);
        assert_eq!(
            r.push(&Fragment::text("\"data\":{}}")),
            Reassembly::Complete(br#"{"syncId":"","data":{}}"#.to_vec())
        );
        assert_eq!(r.buffered(), 0);

        // The next message starts from an empty buffer.
        assert_eq!(r.push(&Fragment::text("x")), Reassembly::Complete(b"x".to_vec()));
    }

    #[test]
    fn test_message_exactly_at_capacity_fits() {
        let mut r = Reassembler::new(4);
        assert_eq!(r.push(&Fragment::partial("ab")), Reassembly::Partial);
        assert_eq!(
            r.push(&Fragment::text("cd")),
            Reassembly::Complete(b"abcd".to_vec())
        );
    }

    #[test]
    fn test_overflow_skips_rest_of_message() {
        let mut r = Reassembler::new(4);
        assert_eq!(r.push(&Fragment::partial("abc")), Reassembly::Partial);
        assert_eq!(
            r.push(&Fragment::partial("de")),
            Reassembly::Overflowed(b"abcde".to_vec())
        );
        assert_eq!(r.buffered(), 0);
        assert_eq!(r.push(&Fragment::partial("fg")), Reassembly::Skipped);
        assert_eq!(r.push(&Fragment::text("h")), Reassembly::Skipped);

        // Recovered: the next message is delivered normally.
        assert_eq!(r.push(&Fragment::text("ok")), Reassembly::Complete(b"ok".to_vec()));
    }

    #[test]
    fn test_overflow_on_final_fragment_does_not_skip_next() {
        let mut r = Reassembler::new(2);
        assert_eq!(
            r.push(&Fragment::text("too long")),
            Reassembly::Overflowed(b"too long".to_vec())
        );
        assert_eq!(r.push(&Fragment::text("ok")), Reassembly::Complete(b"ok".to_vec()));
    }
}
