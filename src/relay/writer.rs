//! Coalescing output buffer.
//!
//! Small writes are gathered and handed downstream as one chunk once the
//! buffer grows past [`FLUSH_THRESHOLD`], or on explicit flush or drop.

// ============================================================================
// Imports
// ============================================================================

use std::io::{self, Write};
use std::mem;

use bytes::Bytes;

// ============================================================================
// Constants
// ============================================================================

/// Buffered bytes above which a write triggers an automatic flush.
pub const FLUSH_THRESHOLD: usize = 4096;

// ============================================================================
// ChunkSink
// ============================================================================

/// Destination of flushed chunks (a socket, an HTTP body channel, ...).
pub trait ChunkSink: Send {
    /// Delivers one chunk. Must not block on the network.
    fn send_chunk(&mut self, chunk: Bytes) -> io::Result<()>;
}

impl ChunkSink for Vec<Bytes> {
    fn send_chunk(&mut self, chunk: Bytes) -> io::Result<()> {
        self.push(chunk);
        Ok(())
    }
}

// ============================================================================
// CoalescingWriter
// ============================================================================

/// `Write` adapter that batches bytes before handing them to a [`ChunkSink`].
#[derive(Debug)]
pub struct CoalescingWriter<S: ChunkSink> {
    sink: S,
    buffer: Vec<u8>,
}

impl<S: ChunkSink> CoalescingWriter<S> {
    /// Creates a writer flushing into `sink`.
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            buffer: Vec::with_capacity(FLUSH_THRESHOLD + 1),
        }
    }

    /// Bytes currently waiting for a flush.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Returns the sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Returns the sink mutably.
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Removes the buffered bytes without sending them.
    ///
    /// Used by writers that must emit everything in one final write.
    pub(crate) fn take_buffer(&mut self) -> Vec<u8> {
        mem::take(&mut self.buffer)
    }
}

impl<S: ChunkSink> Write for CoalescingWriter<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        if self.buffer.len() > FLUSH_THRESHOLD {
            self.flush()?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let chunk = Bytes::from(mem::take(&mut self.buffer));
        self.sink.send_chunk(chunk)
    }
}

impl<S: ChunkSink> Drop for CoalescingWriter<S> {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

// ============================================================================
// Tests
// ============================================================================
