//! Engine request/response adapters over a relay slot and a socket.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::io::{self, Read, Write};
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::engine::{RpcRequest, RpcResponse};
use crate::relay::{CoalescingWriter, RelayReader, RelaySlot};
use crate::transport::SocketHandle;

// ============================================================================
// StreamRequest
// ============================================================================

/// Request reading from a connection's current relay buffer.
///
/// Closing rolls the slot over: the next request starts with whatever the
/// engine left unread.
pub struct StreamRequest {
    slot: Arc<RelaySlot>,
    reader: RelayReader,
    /// Relay cursor when the request was created.
    start: u64,
    closed: bool,
}

impl StreamRequest {
    /// Creates a request over the slot's current buffer.
    #[must_use]
    pub fn new(slot: Arc<RelaySlot>) -> Self {
        let reader = slot.current().reader();
        let start = reader.relay().consumed();
        Self {
            slot,
            reader,
            start,
            closed: false,
        }
    }

    /// Bytes read through this request so far.
    #[must_use]
    pub fn consumed(&self) -> u64 {
        self.reader.relay().consumed() - self.start
    }
}

impl RpcRequest for StreamRequest {
    fn input_stream(&mut self) -> &mut dyn Read {
        &mut self.reader
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.slot.rollover();
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

impl fmt::Debug for StreamRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamRequest")
            .field("consumed", &self.consumed())
            .field("closed", &self.closed)
            .finish()
    }
}

// ============================================================================
// StreamResponse
// ============================================================================

/// Response writing through a coalescing writer to the socket.
///
/// Properties have no wire representation on a raw socket; they are kept
/// for inspection only.
pub struct StreamResponse {
    writer: CoalescingWriter<SocketHandle>,
    properties: FxHashMap<String, String>,
    closed: bool,
}

impl StreamResponse {
    /// Creates a response bound to `socket`.
    #[must_use]
    pub fn new(socket: SocketHandle) -> Self {
        Self {
            writer: CoalescingWriter::new(socket),
            properties: FxHashMap::default(),
            closed: false,
        }
    }

    /// Returns a recorded property.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }
}

impl RpcResponse for StreamResponse {
    fn output_stream(&mut self) -> &mut dyn Write {
        &mut self.writer
    }

    fn set_property(&mut self, name: &str, value: &str) {
        trace!(name, value, "Response property");
        self.properties.insert(name.to_string(), value.to_string());
    }

    fn close(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.writer.flush()
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

impl fmt::Debug for StreamResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamResponse")
            .field("socket", &self.writer.sink().id())
            .field("buffered", &self.writer.buffered())
            .field("closed", &self.closed)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
