//! Per-socket event loop.
//!
//! Every socket, client or server side, is driven by one tokio task that
//! owns both halves of the stream. Inbound bytes are handed to a
//! [`SocketEvents`] callback; outbound bytes arrive over an unbounded
//! command channel, so producers on worker threads never block the loop.
//!
//! # Event Loop
//!
//! The task selects over:
//!
//! - Socket reads, forwarded to [`SocketEvents::on_data`]
//! - [`SocketCommand::Write`] from any [`SocketHandle`] clone
//! - [`SocketCommand::Shutdown`] or all handles gone
//!
//! When it ends, or when the runtime drops the task first,
//! [`SocketEvents::on_closed`] is called exactly once.

// ============================================================================
// Imports
// ============================================================================

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::ConnectionId;
use crate::relay::{ChunkSink, RelaySlot};

// ============================================================================
// Constants
// ============================================================================

/// Read buffer reserved before each socket read.
const READ_CHUNK: usize = 8192;

// ============================================================================
// SocketEvents
// ============================================================================

/// Why a socket's event loop ended.
#[derive(Debug)]
pub enum CloseReason {
    /// Peer closed its write half.
    Eof,
    /// [`SocketHandle::shutdown`] was called or every handle was dropped.
    Local,
    /// Read or write failed.
    Error(io::Error),
}

/// Callbacks invoked on the event loop task. Implementations must not block.
pub trait SocketEvents: Send + 'static {
    /// Called for every chunk read from the socket.
    fn on_data(&mut self, chunk: Bytes);

    /// Called once when the loop ends.
    fn on_closed(&mut self, reason: CloseReason);
}

impl SocketEvents for Arc<RelaySlot> {
    fn on_data(&mut self, chunk: Bytes) {
        self.append(&chunk);
    }

    fn on_closed(&mut self, _reason: CloseReason) {
        self.finish();
    }
}

// ============================================================================
// SocketCommand
// ============================================================================

/// Internal commands for the event loop.
#[derive(Debug)]
enum SocketCommand {
    /// Write a chunk to the socket.
    Write(Bytes),
    /// Flush pending writes, shut down the write half and stop.
    Shutdown,
}

// ============================================================================
// SocketHandle
// ============================================================================

/// Cloneable handle to a running socket event loop.
///
/// # Thread Safety
///
/// `SocketHandle` is `Send + Sync`; writes from any thread are queued in
/// call order and never block.
#[derive(Debug, Clone)]
pub struct SocketHandle {
    id: ConnectionId,
    command_tx: mpsc::UnboundedSender<SocketCommand>,
    closed: Arc<AtomicBool>,
}

impl SocketHandle {
    /// Spawns the event loop for `stream` on `runtime`.
    pub fn spawn<S, E>(runtime: &Handle, stream: S, events: E) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
        E: SocketEvents,
    {
        Self::spawn_with(runtime, stream, |_| events)
    }

    /// Spawns the event loop, building the callbacks from the new handle.
    ///
    /// Used when the callbacks need to write back to their own socket.
    pub fn spawn_with<S, E, F>(runtime: &Handle, stream: S, make_events: F) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
        E: SocketEvents,
        F: FnOnce(SocketHandle) -> E,
    {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let handle = Self {
            id: ConnectionId::next(),
            command_tx,
            closed: Arc::new(AtomicBool::new(false)),
        };

        // Built outside the task so a never-polled task still closes.
        let events = ClosingEvents {
            id: handle.id,
            events: Some(make_events(handle.clone())),
            closed: Arc::clone(&handle.closed),
        };
        runtime.spawn(run_event_loop(handle.id, stream, command_rx, events));

        handle
    }

    /// Returns the socket's log id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queues a chunk for writing.
    ///
    /// # Errors
    ///
    /// [`Error::ConnectionClosed`] if the event loop has ended.
    pub fn write(&self, chunk: Bytes) -> Result<()> {
        if chunk.is_empty() {
            return Ok(());
        }
        self.command_tx
            .send(SocketCommand::Write(chunk))
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Asks the event loop to flush queued writes and close. Idempotent.
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(SocketCommand::Shutdown);
    }

    /// Returns `true` once the event loop has ended.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl ChunkSink for SocketHandle {
    fn send_chunk(&mut self, chunk: Bytes) -> io::Result<()> {
        self.write(chunk)
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "socket closed"))
    }
}

// ============================================================================
// Event Loop
// ============================================================================

/// Owns the callbacks for one event loop.
///
/// `on_closed` fires exactly once: when the loop ends, or when the task is
/// dropped by a runtime shutting down before the loop could end.
struct ClosingEvents<E: SocketEvents> {
    id: ConnectionId,
    events: Option<E>,
    closed: Arc<AtomicBool>,
}

impl<E: SocketEvents> ClosingEvents<E> {
    fn on_data(&mut self, chunk: Bytes) {
        if let Some(events) = self.events.as_mut() {
            events.on_data(chunk);
        }
    }

    fn close(&mut self, reason: CloseReason) {
        self.closed.store(true, Ordering::Release);
        if let Some(mut events) = self.events.take() {
            events.on_closed(reason);
        }
    }
}

impl<E: SocketEvents> Drop for ClosingEvents<E> {
    fn drop(&mut self) {
        if self.events.is_some() {
            debug!(conn = %self.id, "Socket task dropped before its loop ended");
            self.close(CloseReason::Local);
        }
    }
}

async fn run_event_loop<S, E>(
    id: ConnectionId,
    stream: S,
    mut command_rx: mpsc::UnboundedReceiver<SocketCommand>,
    mut events: ClosingEvents<E>,
) where
    S: AsyncRead + AsyncWrite + Send + 'static,
    E: SocketEvents,
{
    let (mut reader, mut writer) = tokio::io::split(stream);
    let mut buf = BytesMut::with_capacity(READ_CHUNK);

    debug!(conn = %id, "Socket event loop started");

    let reason = loop {
        buf.reserve(READ_CHUNK);

        tokio::select! {
            // Inbound bytes
            result = reader.read_buf(&mut buf) => {
                match result {
                    Ok(0) => {
                        debug!(conn = %id, "Socket closed by peer");
                        break CloseReason::Eof;
                    }

                    Ok(n) => {
                        trace!(conn = %id, bytes = n, "Socket read");
                        events.on_data(buf.split().freeze());
                    }

                    Err(e) => {
                        warn!(conn = %id, error = %e, "Socket read failed");
                        break CloseReason::Error(e);
                    }
                }
            }

            // Commands from handles
            command = command_rx.recv() => {
                match command {
                    Some(SocketCommand::Write(chunk)) => {
                        if let Err(e) = writer.write_all(&chunk).await {
                            warn!(conn = %id, error = %e, "Socket write failed");
                            break CloseReason::Error(e);
                        }
                        trace!(conn = %id, bytes = chunk.len(), "Socket write");
                    }

                    Some(SocketCommand::Shutdown) | None => {
                        let _ = writer.flush().await;
                        let _ = writer.shutdown().await;
                        debug!(conn = %id, "Socket shut down locally");
                        break CloseReason::Local;
                    }
                }
            }
        }
    };

    events.close(reason);

    debug!(conn = %id, "Socket event loop terminated");
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use tokio::io::duplex;
    use tokio::sync::mpsc::UnboundedSender;

    /// Forwards events to the test body.
    struct Probe(UnboundedSender<Option<Bytes>>);

    impl SocketEvents for Probe {
        fn on_data(&mut self, chunk: Bytes) {
            let _ = self.0.send(Some(chunk));
        }

        fn on_closed(&mut self, _reason: CloseReason) {
            let _ = self.0.send(None);
        }
    }

    #[tokio::test]
    async fn test_inbound_bytes_reach_callback() {
        let (local, mut remote) = duplex(64);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _handle = SocketHandle::spawn(&Handle::current(), local, Probe(tx));

        remote.write_all(b"ping").await.expect("write");
        let chunk = rx.recv().await.flatten().expect("chunk");
        assert_eq!(&chunk[..], b"ping");

        drop(remote);
        assert_eq!(rx.recv().await, Some(None));
    }

    #[tokio::test]
    async fn test_writes_are_delivered_in_order() {
        let (local, mut remote) = duplex(64);
        let (tx, _rx) = mpsc::unbounded_channel();
        let handle = SocketHandle::spawn(&Handle::current(), local, Probe(tx));

        handle.write(Bytes::from_static(b"one ")).expect("write");
        handle.write(Bytes::from_static(b"two")).expect("write");
        handle.shutdown();

        let mut received = Vec::new();
        remote.read_to_end(&mut received).await.expect("read");
        assert_eq!(received, b"one two");
    }

    #[tokio::test]
    async fn test_shutdown_marks_closed_and_rejects_writes() {
        let (local, _remote) = duplex(64);
        let slot = Arc::new(RelaySlot::new());
        let handle = SocketHandle::spawn(&Handle::current(), local, Arc::clone(&slot));

        handle.shutdown();
        handle.shutdown();

        tokio::time::timeout(Duration::from_secs(2), async {
            while !handle.is_closed() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("loop should end");

        assert!(slot.is_finished());
        assert!(matches!(
            handle.write(Bytes::from_static(b"late")),
            Err(Error::ConnectionClosed)
        ));
    }

    #[test]
    fn test_runtime_shutdown_finishes_relay() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .expect("runtime");

        // Remote half kept alive so the loop would otherwise run forever.
        let (local, _remote) = duplex(64);
        let slot = Arc::new(RelaySlot::new());
        let handle = SocketHandle::spawn(runtime.handle(), local, Arc::clone(&slot));
        let mut reader = slot.current().reader();

        runtime.shutdown_timeout(Duration::from_secs(2));

        assert!(slot.is_finished());
        assert!(handle.is_closed());
        let mut rest = Vec::new();
        std::io::Read::read_to_end(&mut reader, &mut rest).expect("eof");
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn test_spawn_with_receives_own_handle() {
        struct Echo(SocketHandle);

        impl SocketEvents for Echo {
            fn on_data(&mut self, chunk: Bytes) {
                let _ = self.0.write(chunk);
            }

            fn on_closed(&mut self, _reason: CloseReason) {}
        }

        let (local, mut remote) = duplex(64);
        let _handle = SocketHandle::spawn_with(&Handle::current(), local, Echo);

        remote.write_all(b"echo").await.expect("write");
        let mut buf = [0u8; 4];
        remote.read_exact(&mut buf).await.expect("read");
        assert_eq!(&buf, b"echo");
    }
}
