//! Thread-safe byte relay between an async producer and a blocking consumer.
//!
//! The socket event loop appends whatever the network delivers; a worker
//! thread reads with ordinary blocking `std::io::Read` calls. Appending never
//! blocks. Reading waits on a condition variable until bytes arrive or the
//! relay is finished.
//!
//! Bytes appended before [`RelayBuffer::finish`] are still delivered; only
//! once they are drained do reads report end-of-stream.

// ============================================================================
// Imports
// ============================================================================

use std::io::{self, BufRead, Read};
use std::sync::Arc;

use bytes::{Buf, Bytes, BytesMut};
use parking_lot::{Condvar, Mutex};

// ============================================================================
// RelayState
// ============================================================================

#[derive(Debug, Default)]
struct RelayState {
    /// Bytes appended but not yet read.
    unread: BytesMut,
    /// Total bytes ever appended.
    appended: u64,
    /// Total bytes handed to readers (the cursor).
    consumed: u64,
    /// Terminal flag; no appends are accepted once set.
    finished: bool,
}

impl RelayState {
    /// Waits until something is unread or the relay is finished.
    fn is_blocked(&self) -> bool {
        self.unread.is_empty() && !self.finished
    }

    fn take(&mut self, max: usize) -> Bytes {
        let count = max.min(self.unread.len());
        self.consumed += count as u64;
        self.unread.split_to(count).freeze()
    }
}

// ============================================================================
// RelayBuffer
// ============================================================================

/// Append-only byte relay with a blocking read side.
///
/// No maximum size is enforced; a slow consumer lets the relay grow.
#[derive(Debug, Default)]
pub struct RelayBuffer {
    state: Mutex<RelayState>,
    readable: Condvar,
}

impl RelayBuffer {
    /// Creates an empty, unfinished relay.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an unfinished relay pre-filled with `bytes`.
    #[must_use]
    pub fn with_bytes(bytes: &[u8]) -> Self {
        let relay = Self::new();
        relay.append(bytes);
        relay
    }

    /// Creates a relay that is already finished and empty.
    #[must_use]
    pub fn finished() -> Self {
        let relay = Self::new();
        relay.finish();
        relay
    }

    /// Appends bytes and wakes waiting readers.
    ///
    /// Returns `false` (dropping the bytes) if the relay is finished.
    pub fn append(&self, bytes: &[u8]) -> bool {
        let mut state = self.state.lock();
        if state.finished {
            return false;
        }
        if bytes.is_empty() {
            return true;
        }

        state.unread.extend_from_slice(bytes);
        state.appended += bytes.len() as u64;
        drop(state);

        self.readable.notify_all();
        true
    }

    /// Marks the relay terminal and wakes all blocked readers. Idempotent.
    pub fn finish(&self) {
        let mut state = self.state.lock();
        if state.finished {
            return;
        }
        state.finished = true;
        drop(state);

        self.readable.notify_all();
    }

    /// Same as [`finish`](Self::finish).
    #[inline]
    pub fn close(&self) {
        self.finish();
    }

    /// Returns `true` once [`finish`](Self::finish) was called.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state.lock().finished
    }

    /// Number of bytes appended but not yet read.
    #[must_use]
    pub fn available(&self) -> usize {
        self.state.lock().unread.len()
    }

    /// Total bytes appended since creation.
    #[must_use]
    pub fn appended(&self) -> u64 {
        self.state.lock().appended
    }

    /// Total bytes read since creation.
    #[must_use]
    pub fn consumed(&self) -> u64 {
        self.state.lock().consumed
    }

    /// Reads up to `buf.len()` bytes, blocking while nothing is available.
    ///
    /// Returns 0 for an empty `buf` (without blocking) and at end-of-stream.
    pub fn read(&self, buf: &mut [u8]) -> usize {
        if buf.is_empty() {
            return 0;
        }

        let mut state = self.state.lock();
        while state.is_blocked() {
            self.readable.wait(&mut state);
        }

        let chunk = state.take(buf.len());
        buf[..chunk.len()].copy_from_slice(&chunk);
        chunk.len()
    }

    /// Reads a single byte, blocking while nothing is available.
    ///
    /// Returns `None` at end-of-stream.
    pub fn read_byte(&self) -> Option<u8> {
        let mut byte = [0u8; 1];
        match self.read(&mut byte) {
            0 => None,
            _ => Some(byte[0]),
        }
    }

    /// Blocks until at least one byte is unread or the relay is finished.
    ///
    /// Returns `true` if bytes are available, `false` at end-of-stream.
    pub fn wait_readable(&self) -> bool {
        let mut state = self.state.lock();
        while state.is_blocked() {
            self.readable.wait(&mut state);
        }
        !state.unread.is_empty()
    }

    /// Blocks like [`read`](Self::read) and returns every unread byte.
    ///
    /// An empty chunk means end-of-stream.
    pub fn take_available(&self) -> Bytes {
        let mut state = self.state.lock();
        while state.is_blocked() {
            self.readable.wait(&mut state);
        }
        let all = state.unread.len();
        state.take(all)
    }

    /// Removes and returns unread bytes without blocking.
    pub(crate) fn drain_unread(&self) -> Bytes {
        let mut state = self.state.lock();
        let all = state.unread.len();
        state.take(all)
    }

    /// Returns a blocking reader over this relay.
    #[must_use]
    pub fn reader(self: &Arc<Self>) -> RelayReader {
        RelayReader::new(Arc::clone(self))
    }
}

// ============================================================================
// RelayReader
// ============================================================================

/// `Read`/`BufRead` adapter over a shared [`RelayBuffer`].
///
/// `fill_buf` pulls every unread byte into a local window; bytes in the
/// window count as consumed from the relay's point of view.
#[derive(Debug)]
pub struct RelayReader {
    relay: Arc<RelayBuffer>,
    window: Bytes,
}

impl RelayReader {
    /// Creates a reader over `relay`.
    #[must_use]
    pub fn new(relay: Arc<RelayBuffer>) -> Self {
        Self {
            relay,
            window: Bytes::new(),
        }
    }

    /// Returns the relay this reader drains.
    #[must_use]
    pub fn relay(&self) -> &Arc<RelayBuffer> {
        &self.relay
    }
}

impl Read for RelayReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        if !self.window.is_empty() {
            let count = buf.len().min(self.window.len());
            buf[..count].copy_from_slice(&self.window[..count]);
            self.window.advance(count);
            return Ok(count);
        }

        Ok(self.relay.read(buf))
    }
}

impl BufRead for RelayReader {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.window.is_empty() {
            self.window = self.relay.take_available();
        }
        Ok(&self.window)
    }

    fn consume(&mut self, amt: usize) {
        let amt = amt.min(self.window.len());
        self.window.advance(amt);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::thread;
    use std::time::Duration;

    use proptest::prelude::*;

    #[test]
    fn test_read_returns_appended_bytes_in_order() {
        let relay = RelayBuffer::new();
        relay.append(b"hello ");
        relay.append(b"world");

        let mut buf = [0u8; 32];
        let n = relay.read(&mut buf);
        assert_eq!(&buf[..n], b"hello world");
        assert_eq!(relay.appended(), 11);
        assert_eq!(relay.consumed(), 11);
    }

    #[test]
    fn test_zero_length_read_does_not_block() {
        let relay = RelayBuffer::new();
        let mut empty = [0u8; 0];
        assert_eq!(relay.read(&mut empty), 0);
    }

    #[test]
    fn test_finish_delivers_pending_bytes_then_eof() {
        let relay = RelayBuffer::new();
        relay.append(b"abc");
        relay.finish();

        assert!(!relay.append(b"dropped"));
        assert_eq!(relay.read_byte(), Some(b'a'));
        assert_eq!(relay.read_byte(), Some(b'b'));
        assert_eq!(relay.read_byte(), Some(b'c'));
        assert_eq!(relay.read_byte(), None);
        assert_eq!(relay.read_byte(), None);
    }

    #[test]
    fn test_finish_is_idempotent() {
        let relay = RelayBuffer::new();
        relay.finish();
        relay.close();
        relay.finish();
        assert!(relay.is_finished());
        assert!(!relay.wait_readable());
    }

    #[test]
    fn test_blocked_reader_woken_by_append() {
        let relay = Arc::new(RelayBuffer::new());
        let producer = Arc::clone(&relay);

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            producer.append(b"late");
        });

        let mut buf = [0u8; 8];
        let n = relay.read(&mut buf);
        assert_eq!(&buf[..n], b"late");
        handle.join().expect("producer thread");
    }

    #[test]
    fn test_blocked_reader_woken_by_finish() {
        let relay = Arc::new(RelayBuffer::new());
        let closer = Arc::clone(&relay);

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            closer.finish();
        });

        assert_eq!(relay.read_byte(), None);
        handle.join().expect("closer thread");
    }

    #[test]
    fn test_partial_reads_respect_buffer_size() {
        let relay = RelayBuffer::with_bytes(b"0123456789");
        let mut buf = [0u8; 4];

        assert_eq!(relay.read(&mut buf), 4);
        assert_eq!(&buf, b"0123");
        assert_eq!(relay.available(), 6);
    }

    #[test]
    fn test_reader_implements_buf_read() {
        let relay = Arc::new(RelayBuffer::with_bytes(b"line one\nline two\n"));
        relay.finish();

        let mut reader = relay.reader();
        let mut line = String::new();
        reader.read_line(&mut line).expect("read_line");
        assert_eq!(line, "line one\n");

        let mut rest = String::new();
        reader.read_to_string(&mut rest).expect("read_to_string");
        assert_eq!(rest, "line two\n");
    }

    #[test]
    fn test_finished_constructor() {
        let relay = RelayBuffer::finished();
        assert!(relay.is_finished());
        assert!(relay.take_available().is_empty());
    }

    proptest! {
        #[test]
        fn prop_reads_concatenate_appends(
            chunks in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..64), 0..32),
            read_size in 1usize..40,
        ) {
            let relay = Arc::new(RelayBuffer::new());
            let producer = Arc::clone(&relay);
            let expected: Vec<u8> = chunks.concat();

            let handle = thread::spawn(move || {
                for chunk in &chunks {
                    producer.append(chunk);
                }
                producer.finish();
            });

            let mut received = Vec::new();
            let mut buf = vec![0u8; read_size];
            loop {
                let n = relay.read(&mut buf);
                if n == 0 {
                    break;
                }
                received.extend_from_slice(&buf[..n]);
            }
            handle.join().expect("producer thread");

            prop_assert_eq!(received, expected);
            prop_assert_eq!(relay.consumed(), relay.appended());
        }
    }
}
