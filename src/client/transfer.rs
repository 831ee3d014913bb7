//! Transfer sessions and download streams.
//!
//! A transfer session owns one secondary socket for the length of one
//! upload or download call. Dropping the session shuts the socket down,
//! so every exit path tears it down exactly once. A data download hands
//! the session to the returned [`DownloadStream`] instead.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::io::{self, Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use flate2::read::GzDecoder;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::{Error, Result};
use crate::protocol::{SentinelReader, read_frame, write_frame};
use crate::relay::{CoalescingWriter, RelayReader, RelaySlot};
use crate::transport::SocketHandle;

// ============================================================================
// Types
// ============================================================================

/// The connection's record of its in-flight transfer socket.
pub(crate) type TransferRegistry = Arc<Mutex<Option<ActiveTransfer>>>;

/// In-flight transfer socket with the relay its replies land in.
pub(crate) struct ActiveTransfer {
    socket: SocketHandle,
    slot: Arc<RelaySlot>,
    aborted: Arc<AtomicBool>,
}

impl ActiveTransfer {
    /// Shuts the socket down and ends the reply stream.
    ///
    /// The relay is finished here rather than by the event loop, so a
    /// reader still holding the stream sees end-of-stream even if the loop
    /// never runs again.
    pub(crate) fn teardown(self) {
        self.aborted.store(true, Ordering::Release);
        self.socket.shutdown();
        self.slot.finish();
        debug!(conn = %self.socket.id(), "Transfer socket torn down");
    }
}

// ============================================================================
// TransferSession
// ============================================================================

/// RAII owner of a transfer socket.
pub(crate) struct TransferSession {
    socket: SocketHandle,
    slot: Arc<RelaySlot>,
    registry: TransferRegistry,
    /// Set when the connection tore the socket down under this session.
    aborted: Arc<AtomicBool>,
    closed: bool,
}

impl TransferSession {
    /// Wraps a freshly spawned transfer socket and records it in `registry`.
    pub(crate) fn register(
        socket: SocketHandle,
        slot: Arc<RelaySlot>,
        registry: TransferRegistry,
    ) -> Self {
        let aborted = Arc::new(AtomicBool::new(false));
        let active = ActiveTransfer {
            socket: socket.clone(),
            slot: Arc::clone(&slot),
            aborted: Arc::clone(&aborted),
        };
        if let Some(stale) = registry.lock().replace(active) {
            stale.teardown();
        }
        Self {
            socket,
            slot,
            registry,
            aborted,
            closed: false,
        }
    }

    /// Returns `true` if the owning connection tore the socket down.
    pub(crate) fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    /// Writes raw header bytes.
    pub(crate) fn send_header(&self, header: &[u8]) -> Result<()> {
        self.socket
            .write(Bytes::copy_from_slice(header))
            .map_err(|e| Error::transfer(format!("transfer socket unavailable: {e}")))
    }

    /// Writes one request frame.
    pub(crate) fn send_frame<T, F>(&self, body: F) -> Result<T>
    where
        F: FnOnce(&mut dyn Write) -> io::Result<T>,
    {
        let mut writer = CoalescingWriter::new(self.socket.clone());
        write_frame(&mut writer, body)
            .map_err(|e| Error::transfer(format!("sending request failed: {e}")))
    }

    /// Reads one reply frame.
    pub(crate) fn read_frame<T, F>(&self, body: F) -> Result<T>
    where
        F: FnOnce(&mut dyn Read) -> io::Result<T>,
    {
        let mut reader = self.reader();
        Ok(read_frame(&mut reader, body)?)
    }

    /// Reader over the reply bytes.
    pub(crate) fn reader(&self) -> RelayReader {
        self.slot.current().reader()
    }

    /// Shuts the socket down and forgets it. Idempotent.
    pub(crate) fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        self.socket.shutdown();
        self.slot.finish();

        let mut registry = self.registry.lock();
        if registry.as_ref().map(|active| active.socket.id()) == Some(self.socket.id()) {
            registry.take();
        }
        debug!(conn = %self.socket.id(), "Transfer socket closed");
    }
}

impl Drop for TransferSession {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for TransferSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferSession")
            .field("socket", &self.socket.id())
            .field("closed", &self.closed)
            .finish()
    }
}

// ============================================================================
// DownloadStream
// ============================================================================

enum DownloadSource {
    /// Reads the compressed block and ignores what follows it.
    Unverified(RelayReader),
    /// Also requires the trailing sentinel before reporting end-of-stream.
    Verified(SentinelReader<RelayReader>),
}

impl Read for DownloadSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Unverified(reader) => reader.read(buf),
            Self::Verified(reader) => reader.read(buf),
        }
    }
}

/// Decompressed payload of a data download.
///
/// Owns the transfer socket; reaching end-of-stream, calling
/// [`close`](Self::close) or dropping the stream shuts it down.
pub struct DownloadStream {
    decoder: GzDecoder<DownloadSource>,
    session: TransferSession,
    finished: bool,
}

impl DownloadStream {
    pub(crate) fn new(session: TransferSession, verify_sentinel: bool) -> Self {
        let reader = session.reader();
        let source = if verify_sentinel {
            DownloadSource::Verified(SentinelReader::new(reader))
        } else {
            DownloadSource::Unverified(reader)
        };

        Self {
            decoder: GzDecoder::new(source),
            session,
            finished: false,
        }
    }

    /// Releases the transfer socket. Further reads return end-of-stream.
    pub fn close(&mut self) {
        self.finished = true;
        self.session.close();
    }

    fn finish(&mut self) -> io::Result<()> {
        self.finished = true;
        let result = match self.decoder.get_mut() {
            DownloadSource::Verified(reader) => reader.skip_to_sentinel(),
            DownloadSource::Unverified(_) => Ok(()),
        };
        self.session.close();
        result
    }
}

impl Read for DownloadStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.finished || buf.is_empty() {
            return Ok(0);
        }

        let result = match self.decoder.read(buf) {
            Ok(0) => self.finish().map(|()| 0),
            Ok(n) => return Ok(n),
            Err(e) => {
                self.close();
                Err(e)
            }
        };

        // A payload cut short by the connection's own teardown ends the
        // stream; a payload cut short by the peer is an error.
        match result {
            Err(_) if self.session.is_aborted() => {
                debug!(conn = %self.session.socket.id(), "Download ended by connection teardown");
                Ok(0)
            }
            other => other,
        }
    }
}

impl fmt::Debug for DownloadStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadStream")
            .field("session", &self.session)
            .field("finished", &self.finished)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
