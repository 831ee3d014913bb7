//! Holder of a socket's current relay buffer.
//!
//! Relay buffers are never rewound. When a logical exchange restarts, the
//! slot installs a new buffer and finishes the old one, so readers still
//! holding the old buffer see end-of-stream instead of the next exchange's
//! bytes.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::Mutex;

use super::buffer::RelayBuffer;

// ============================================================================
// RelaySlot
// ============================================================================

#[derive(Debug)]
struct SlotState {
    current: Arc<RelayBuffer>,
    /// Set once the socket feeding this slot has ended.
    ended: bool,
}

/// The socket-facing end of a relay: appends go to whichever buffer is
/// current at the time.
#[derive(Debug)]
pub struct RelaySlot {
    state: Mutex<SlotState>,
}

impl Default for RelaySlot {
    fn default() -> Self {
        Self::new()
    }
}

impl RelaySlot {
    /// Creates a slot holding a fresh relay.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SlotState {
                current: Arc::new(RelayBuffer::new()),
                ended: false,
            }),
        }
    }

    /// Returns the current relay buffer.
    #[must_use]
    pub fn current(&self) -> Arc<RelayBuffer> {
        Arc::clone(&self.state.lock().current)
    }

    /// Appends to the current relay buffer.
    ///
    /// The slot lock is held across the append so a concurrent
    /// [`rollover`](Self::rollover) cannot lose bytes.
    pub fn append(&self, bytes: &[u8]) -> bool {
        let state = self.state.lock();
        state.current.append(bytes)
    }

    /// Marks the feeding socket as ended and finishes the current relay.
    ///
    /// Buffers installed afterwards are born finished.
    pub fn finish(&self) {
        let mut state = self.state.lock();
        state.ended = true;
        state.current.finish();
    }

    /// Returns `true` once [`finish`](Self::finish) was called.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state.lock().ended
    }

    /// Blocks until the current relay has unread bytes (`true`) or has
    /// finished empty (`false`).
    pub fn wait_readable(&self) -> bool {
        self.current().wait_readable()
    }

    /// Replaces the current relay with an empty one, discarding unread bytes.
    pub fn reset(&self) -> Arc<RelayBuffer> {
        let mut state = self.state.lock();
        state.current.finish();

        let next = Arc::new(if state.ended {
            RelayBuffer::finished()
        } else {
            RelayBuffer::new()
        });
        state.current = Arc::clone(&next);
        next
    }

    /// Replaces the current relay, carrying its unread bytes over.
    ///
    /// Used when a request is closed while further requests may already be
    /// pipelined behind it.
    pub fn rollover(&self) -> Arc<RelayBuffer> {
        let mut state = self.state.lock();
        let leftover = state.current.drain_unread();
        state.current.finish();

        let next = RelayBuffer::with_bytes(&leftover);
        if state.ended {
            next.finish();
        }
        let next = Arc::new(next);
        state.current = Arc::clone(&next);
        next
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_goes_to_current() {
        let slot = RelaySlot::new();
        slot.append(b"abc");
        assert_eq!(slot.current().available(), 3);
    }

    #[test]
    fn test_reset_discards_unread_and_finishes_old() {
        let slot = RelaySlot::new();
        slot.append(b"stale");
        let old = slot.current();

        let fresh = slot.reset();
        assert!(old.is_finished());
        assert_eq!(fresh.available(), 0);
        assert!(!fresh.is_finished());
        assert!(Arc::ptr_eq(&fresh, &slot.current()));
    }

    #[test]
    fn test_rollover_carries_unread_bytes() {
        let slot = RelaySlot::new();
        slot.append(b"firstsecond");

        let mut buf = [0u8; 5];
        assert_eq!(slot.current().read(&mut buf), 5);

        let next = slot.rollover();
        let mut rest = [0u8; 16];
        let n = next.read(&mut rest);
        assert_eq!(&rest[..n], b"second");
    }

    #[test]
    fn test_replacements_after_finish_are_finished() {
        let slot = RelaySlot::new();
        slot.finish();

        assert!(slot.reset().is_finished());
        assert!(slot.rollover().is_finished());
        assert!(!slot.append(b"late"));
        assert!(!slot.wait_readable());
    }

    #[test]
    fn test_rollover_after_finish_keeps_leftover_readable() {
        let slot = RelaySlot::new();
        slot.append(b"tail");
        slot.finish();

        let next = slot.rollover();
        assert!(next.is_finished());
        assert_eq!(next.available(), 4);
    }
}
