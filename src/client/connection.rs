//! Client side of the socket transport.
//!
//! [`NetSocketConnection`] owns one primary socket carrying the RPC byte
//! stream and, per upload or download call, one short-lived transfer
//! socket.
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──open──► Connecting ──ok──► Open ──close(owner)──► Closed
//!   ▲                 │                                    (terminal)
//!   └──── failure ────┘
//! ```
//!
//! The first session that opens the connection becomes its owner; only the
//! owner's `close` tears the socket down.
//!
//! # Blocking
//!
//! All methods block the calling thread. They must not be called from
//! inside an async task.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::io::{self, Read};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::ClientOptions;
use crate::engine::FileHandle;
use crate::error::{Error, Result};
use crate::identifiers::{CacheKey, SessionId};
use crate::protocol::{DownloadOp, StreamMode, read_i64, read_utf, write_i64, write_utf};
use crate::relay::{CoalescingWriter, RelayReader, RelaySlot};
use crate::transport::{BoxedStream, Dialer, SocketHandle, TcpDialer};

use super::handle::{DownloadExecutor, RemoteFileHandle, UploadExecutor};
use super::transfer::{DownloadStream, TransferRegistry, TransferSession};

// ============================================================================
// Types
// ============================================================================

/// Writer returned by [`NetSocketConnection::output_stream`].
pub type ConnectionWriter = CoalescingWriter<SocketHandle>;

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state of the primary socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Not connected; `open` may be called.
    Idle,
    /// `open` is in progress.
    Connecting,
    /// Connected.
    Open,
    /// Closed by the owner. Terminal.
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Internal State
// ============================================================================

/// Primary socket with the relay its replies land in.
struct Primary {
    socket: SocketHandle,
    slot: Arc<RelaySlot>,
}

impl Primary {
    fn teardown(self) {
        self.socket.shutdown();
        self.slot.finish();
        debug!(conn = %self.socket.id(), "Primary socket torn down");
    }
}

struct Inner {
    state: ConnectionState,
    primary: Option<Primary>,
    owner: Option<SessionId>,
}

// ============================================================================
// NetSocketConnection
// ============================================================================

/// Client connection to a [`NetSocketServer`](crate::server::NetSocketServer).
///
/// # Example
///
/// ```ignore
/// use std::io::{Read, Write};
/// use netsocket_rpc::{ClientOptions, NetSocketConnection, SessionId};
///
/// let connection = NetSocketConnection::new(ClientOptions::new("localhost", 8888))?;
/// let session = SessionId::generate();
/// connection.open(session)?;
///
/// let mut out = connection.output_stream()?;
/// out.write_all(b"hello\n")?;
/// out.flush()?;
///
/// let mut reply = [0u8; 6];
/// connection.input_stream()?.read_exact(&mut reply)?;
///
/// connection.close(session);
/// ```
pub struct NetSocketConnection {
    options: ClientOptions,
    dialer: Arc<dyn Dialer>,
    /// Present when the connection created its own event loop.
    runtime: Option<Runtime>,
    handle: Handle,
    inner: Mutex<Inner>,
    transfer: TransferRegistry,
}

// ============================================================================
// NetSocketConnection - Constructors
// ============================================================================

impl NetSocketConnection {
    /// Creates a connection with a private event loop and a [`TcpDialer`].
    ///
    /// # Errors
    ///
    /// [`Error::Config`] for invalid options, [`Error::Io`] if the event
    /// loop cannot be started.
    pub fn new(options: ClientOptions) -> Result<Self> {
        let dialer = Arc::new(TcpDialer::new(options.reconnect_policy()));
        Self::with_dialer(options, dialer)
    }

    /// Creates a connection with a private event loop and a custom dialer.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn with_dialer(options: ClientOptions, dialer: Arc<dyn Dialer>) -> Result<Self> {
        options.validate()?;

        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("netsocket-client")
            .enable_all()
            .build()?;
        let handle = runtime.handle().clone();

        Ok(Self::assemble(options, dialer, Some(runtime), handle))
    }

    /// Creates a connection driven by an existing multi-thread runtime.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] for invalid options.
    pub fn with_handle(options: ClientOptions, handle: Handle) -> Result<Self> {
        options.validate()?;
        let dialer = Arc::new(TcpDialer::new(options.reconnect_policy()));
        Ok(Self::assemble(options, dialer, None, handle))
    }

    fn assemble(
        options: ClientOptions,
        dialer: Arc<dyn Dialer>,
        runtime: Option<Runtime>,
        handle: Handle,
    ) -> Self {
        Self {
            options,
            dialer,
            runtime,
            handle,
            inner: Mutex::new(Inner {
                state: ConnectionState::Idle,
                primary: None,
                owner: None,
            }),
            transfer: TransferRegistry::default(),
        }
    }
}

// ============================================================================
// NetSocketConnection - Lifecycle
// ============================================================================

impl NetSocketConnection {
    /// Returns the options.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    /// Returns `true` while the primary socket is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        let inner = self.inner.lock();
        inner.state == ConnectionState::Open
            && inner.primary.as_ref().is_some_and(|p| !p.socket.is_closed())
    }

    /// Returns the owner session, if any.
    #[must_use]
    pub fn owner(&self) -> Option<SessionId> {
        self.inner.lock().owner
    }

    /// Opens the primary socket.
    ///
    /// Any previous primary socket is torn down first. Waits at most the
    /// configured open timeout; retries are left to the dialer. On success
    /// the Communication mode byte is sent and `session` becomes the owner
    /// unless one is already recorded.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] if the connection is closed or opening
    /// - [`Error::ConnectionTimeout`] if no socket is ready in time
    /// - [`Error::Connection`] if the dialer fails
    pub fn open(&self, session: SessionId) -> Result<()> {
        let previous = {
            let mut inner = self.inner.lock();
            match inner.state {
                ConnectionState::Closed | ConnectionState::Connecting => {
                    return Err(Error::invalid_state("open", inner.state));
                }
                ConnectionState::Idle | ConnectionState::Open => {}
            }
            inner.state = ConnectionState::Connecting;
            inner.primary.take()
        };

        if let Some(previous) = previous {
            previous.teardown();
        }

        let stream = match self.dial() {
            Ok(stream) => stream,
            Err(e) => {
                self.inner.lock().state = ConnectionState::Idle;
                return Err(e);
            }
        };

        let slot = Arc::new(RelaySlot::new());
        let socket = SocketHandle::spawn(&self.handle, stream, Arc::clone(&slot));
        let primary = Primary { socket, slot };

        let mode = Bytes::copy_from_slice(&[StreamMode::Communication.as_byte()]);
        if let Err(e) = primary.socket.write(mode) {
            primary.teardown();
            self.inner.lock().state = ConnectionState::Idle;
            return Err(e);
        }

        let mut inner = self.inner.lock();
        if inner.state != ConnectionState::Connecting {
            // Closed by the owner while dialing.
            let state = inner.state;
            drop(inner);
            primary.teardown();
            return Err(Error::invalid_state("open", state));
        }

        info!(
            conn = %primary.socket.id(),
            host = %self.options.host,
            port = self.options.port,
            "Connection opened"
        );

        inner.primary = Some(primary);
        inner.state = ConnectionState::Open;
        inner.owner.get_or_insert(session);
        Ok(())
    }

    /// Closes the connection if `session` is its owner.
    ///
    /// Tears down the transfer socket, the primary socket and the
    /// connection's event loop tasks, then moves to
    /// [`ConnectionState::Closed`]. Calls from any other session are no-ops.
    ///
    /// Returns `true` if the connection was closed by this call.
    pub fn close(&self, session: SessionId) -> bool {
        let primary = {
            let mut inner = self.inner.lock();
            if inner.owner != Some(session) || inner.state == ConnectionState::Closed {
                debug!(%session, "Close ignored, not the owner");
                return false;
            }
            inner.state = ConnectionState::Closed;
            inner.primary.take()
        };

        if let Some(transfer) = self.transfer.lock().take() {
            transfer.teardown();
        }
        if let Some(primary) = primary {
            primary.teardown();
        }

        info!(%session, "Connection closed");
        true
    }

    /// Dials with the bounded open wait.
    fn dial(&self) -> Result<BoxedStream> {
        let host = self.options.host.as_str();
        let port = self.options.port;
        let wait = self.options.open_timeout();

        // The timer must be created inside the runtime, not on the caller's thread.
        let dialed = self
            .handle
            .block_on(async { timeout(wait, self.dialer.dial(host, port)).await });

        match dialed {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => {
                warn!(host, port, error = %e, "Connect failed");
                Err(Error::connection(format!("{host}:{port}: {e}")))
            }
            Err(_) => {
                warn!(host, port, timeout_ms = self.options.open_timeout_ms, "Connect timed out");
                Err(Error::connection_timeout(self.options.open_timeout_ms))
            }
        }
    }
}

// ============================================================================
// NetSocketConnection - RPC Streams
// ============================================================================

impl NetSocketConnection {
    /// Starts a new exchange and returns a writer for the request.
    ///
    /// Replies to the previous exchange that were not read are discarded.
    ///
    /// # Errors
    ///
    /// [`Error::NotConnected`] unless the connection is open.
    pub fn output_stream(&self) -> Result<ConnectionWriter> {
        let inner = self.inner.lock();
        let primary = Self::primary(&inner)?;
        primary.slot.reset();
        Ok(CoalescingWriter::new(primary.socket.clone()))
    }

    /// Returns a reader over the current exchange's reply bytes.
    ///
    /// The reader reports end-of-stream once the socket is torn down or the
    /// next [`output_stream`](Self::output_stream) call starts a new
    /// exchange.
    ///
    /// # Errors
    ///
    /// [`Error::NotConnected`] unless the connection is open.
    pub fn input_stream(&self) -> Result<RelayReader> {
        let inner = self.inner.lock();
        let primary = Self::primary(&inner)?;
        Ok(primary.slot.current().reader())
    }

    fn primary(inner: &Inner) -> Result<&Primary> {
        match (inner.state, inner.primary.as_ref()) {
            (ConnectionState::Open, Some(primary)) => Ok(primary),
            _ => Err(Error::NotConnected),
        }
    }
}

// ============================================================================
// NetSocketConnection - Transfers
// ============================================================================

impl NetSocketConnection {
    /// Returns the length of the payload stored under `key`.
    ///
    /// `None` returns 0 without any I/O.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] unless the connection is open
    /// - [`Error::Transfer`] if the transfer socket cannot be used
    /// - [`Error::Io`] for a malformed reply
    pub fn content_length(&self, key: Option<&CacheKey>) -> Result<u64> {
        let Some(key) = key else {
            return Ok(0);
        };

        let session = self.start_transfer(&[
            StreamMode::Download.as_byte(),
            DownloadOp::Length.as_byte(),
        ])?;
        session.send_frame(|w| write_utf(w, key.as_str()))?;
        let length = session.read_frame(|r| read_i64(r))?;

        debug!(key = %key, length, "Content length received");
        u64::try_from(length).map_err(|_| Error::protocol(format!("negative length {length}")))
    }

    /// Opens the payload stored under `key`.
    ///
    /// The returned stream owns the transfer socket. `None` returns `None`
    /// without any I/O.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] unless the connection is open
    /// - [`Error::Transfer`] if the transfer socket cannot be used
    pub fn download(&self, key: Option<&CacheKey>) -> Result<Option<DownloadStream>> {
        let Some(key) = key else {
            return Ok(None);
        };

        let session = self.start_transfer(&[
            StreamMode::Download.as_byte(),
            DownloadOp::Data.as_byte(),
        ])?;
        session.send_frame(|w| write_utf(w, key.as_str()))?;

        debug!(key = %key, "Download started");
        Ok(Some(DownloadStream::new(
            session,
            self.options.verify_download_sentinel,
        )))
    }

    /// Uploads `file` and returns the handle the server stored it under.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] unless the connection is open
    /// - [`Error::Transfer`] if the transfer socket cannot be used or the
    ///   handle yields fewer bytes than its length
    /// - [`Error::Io`] if the handle cannot be read or the reply is malformed
    pub fn upload(&self, file: &dyn FileHandle) -> Result<RemoteFileHandle> {
        let length = file.length()?;
        let declared = i64::try_from(length)
            .map_err(|_| Error::transfer(format!("file too large: {length} bytes")))?;
        let mut content = file.open()?;

        let session = self.start_transfer(&[StreamMode::Upload.as_byte()])?;
        let sent = session.send_frame(|w| {
            write_i64(w, declared)?;
            io::copy(&mut (&mut content).take(length), w)
        })?;

        if sent != length {
            return Err(Error::transfer(format!(
                "file handle produced {sent} of {length} bytes"
            )));
        }

        let key = CacheKey::from(session.read_frame(|r| read_utf(r))?);
        info!(key = %key, bytes = length, "Upload completed");

        Ok(RemoteFileHandle::new(
            file.file_name().map(str::to_owned),
            key,
        ))
    }

    /// Opens a fresh transfer socket and sends its mode header.
    fn start_transfer(&self, header: &[u8]) -> Result<TransferSession> {
        {
            let inner = self.inner.lock();
            Self::primary(&inner)?;
        }

        let stream = self
            .dial()
            .map_err(|e| Error::transfer(format!("transfer socket failed: {e}")))?;

        let slot = Arc::new(RelaySlot::new());
        let socket = SocketHandle::spawn(&self.handle, stream, Arc::clone(&slot));
        debug!(conn = %socket.id(), "Transfer socket opened");

        let session = TransferSession::register(socket, slot, Arc::clone(&self.transfer));
        session.send_header(header)?;
        Ok(session)
    }
}

// ============================================================================
// Executors
// ============================================================================

impl DownloadExecutor for NetSocketConnection {
    fn read_content(&self, handle: &RemoteFileHandle) -> Result<Box<dyn Read + Send>> {
        match self.download(Some(handle.key()))? {
            Some(stream) => Ok(Box::new(stream)),
            None => Ok(Box::new(io::empty())),
        }
    }

    fn content_length(&self, handle: &RemoteFileHandle) -> Result<u64> {
        NetSocketConnection::content_length(self, Some(handle.key()))
    }
}

impl UploadExecutor for NetSocketConnection {
    fn write_content(&self, file: &dyn FileHandle) -> Result<RemoteFileHandle> {
        self.upload(file)
    }
}

// ============================================================================
// Drop
// ============================================================================

impl Drop for NetSocketConnection {
    fn drop(&mut self) {
        if let Some(transfer) = self.transfer.lock().take() {
            transfer.teardown();
        }
        if let Some(primary) = self.inner.get_mut().primary.take() {
            primary.teardown();
        }
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl fmt::Debug for NetSocketConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("NetSocketConnection")
            .field("host", &self.options.host)
            .field("port", &self.options.port)
            .field("state", &inner.state)
            .field("owner", &inner.owner)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::future;
    use std::sync::mpsc;
    use std::time::{Duration, Instant};

    use async_trait::async_trait;
    use tokio::io::{AsyncReadExt, DuplexStream, duplex};

    /// Dialer whose connect never completes.
    struct PendingDialer;

    #[async_trait]
    impl Dialer for PendingDialer {
        async fn dial(&self, _host: &str, _port: u16) -> io::Result<BoxedStream> {
            future::pending().await
        }
    }

    /// Dialer that always fails.
    struct RefusingDialer;

    #[async_trait]
    impl Dialer for RefusingDialer {
        async fn dial(&self, _host: &str, _port: u16) -> io::Result<BoxedStream> {
            Err(io::Error::from(io::ErrorKind::ConnectionRefused))
        }
    }

    /// Dialer handing out in-memory streams; keeps every peer end.
    #[derive(Default)]
    struct DuplexDialer {
        peers: Mutex<Vec<DuplexStream>>,
    }

    impl DuplexDialer {
        fn take_first(&self) -> DuplexStream {
            self.peers.lock().remove(0)
        }
    }

    #[async_trait]
    impl Dialer for DuplexDialer {
        async fn dial(&self, _host: &str, _port: u16) -> io::Result<BoxedStream> {
            let (local, peer) = duplex(1 << 16);
            self.peers.lock().push(peer);
            Ok(Box::new(local))
        }
    }

    fn open_over_duplex() -> (NetSocketConnection, Arc<DuplexDialer>, SessionId) {
        let dialer = Arc::new(DuplexDialer::default());
        let connection =
            NetSocketConnection::with_dialer(options(1000), Arc::clone(&dialer) as Arc<dyn Dialer>)
                .expect("new");
        let owner = SessionId::generate();
        connection.open(owner).expect("open");
        (connection, dialer, owner)
    }

    /// Reads `reader` to the end on another thread, failing after `deadline`.
    fn drain_within<R: Read + Send + 'static>(mut reader: R, deadline: Duration) -> usize {
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let mut sink = Vec::new();
            let _ = tx.send(reader.read_to_end(&mut sink));
        });
        rx.recv_timeout(deadline)
            .expect("reader still blocked")
            .expect("end-of-stream")
    }

    fn options(open_timeout_ms: u64) -> ClientOptions {
        ClientOptions::new("localhost", 8888).with_open_timeout_ms(open_timeout_ms)
    }

    #[test]
    fn test_open_times_out_with_pending_dialer() {
        let connection =
            NetSocketConnection::with_dialer(options(200), Arc::new(PendingDialer)).expect("new");

        let started = Instant::now();
        let err = connection.open(SessionId::generate()).unwrap_err();
        let elapsed = started.elapsed();

        assert!(err.is_timeout());
        assert!(elapsed >= Duration::from_millis(200));
        assert!(elapsed < Duration::from_millis(2000));
        assert_eq!(connection.state(), ConnectionState::Idle);
    }

    #[test]
    fn test_open_sends_mode_byte() {
        let (connection, dialer, owner) = open_over_duplex();
        assert_eq!(connection.state(), ConnectionState::Open);
        assert_eq!(connection.owner(), Some(owner));

        let mut peer = dialer.take_first();
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime");
        let mut mode = [0u8; 1];
        rt.block_on(peer.read_exact(&mut mode)).expect("mode byte");
        assert_eq!(mode[0], StreamMode::Communication.as_byte());
    }

    #[test]
    fn test_close_ends_held_readers() {
        let (connection, _dialer, owner) = open_over_duplex();
        let input = connection.input_stream().expect("input");
        let download = connection
            .download(Some(&CacheKey::new("k")))
            .expect("download")
            .expect("stream");

        assert!(connection.close(owner));

        assert_eq!(drain_within(input, Duration::from_secs(5)), 0);
        assert_eq!(drain_within(download, Duration::from_secs(5)), 0);
    }

    #[test]
    fn test_drop_ends_held_readers() {
        let (connection, _dialer, _owner) = open_over_duplex();
        let input = connection.input_stream().expect("input");
        let download = connection
            .download(Some(&CacheKey::new("k")))
            .expect("download")
            .expect("stream");

        drop(connection);

        assert_eq!(drain_within(input, Duration::from_secs(5)), 0);
        assert_eq!(drain_within(download, Duration::from_secs(5)), 0);
    }

    #[test]
    fn test_open_failure_returns_to_idle() {
        let connection =
            NetSocketConnection::with_dialer(options(1000), Arc::new(RefusingDialer)).expect("new");

        let err = connection.open(SessionId::generate()).unwrap_err();
        assert!(matches!(err, Error::Connection { .. }));
        assert_eq!(connection.state(), ConnectionState::Idle);
        assert_eq!(connection.owner(), None);
    }

    #[test]
    fn test_streams_require_open_connection() {
        let connection =
            NetSocketConnection::with_dialer(options(100), Arc::new(RefusingDialer)).expect("new");

        assert!(matches!(connection.output_stream(), Err(Error::NotConnected)));
        assert!(matches!(connection.input_stream(), Err(Error::NotConnected)));
        let key = CacheKey::new("k");
        assert!(matches!(
            connection.content_length(Some(&key)),
            Err(Error::NotConnected)
        ));
    }

    #[test]
    fn test_none_key_is_noop() {
        let connection =
            NetSocketConnection::with_dialer(options(100), Arc::new(RefusingDialer)).expect("new");

        assert_eq!(connection.content_length(None).expect("length"), 0);
        assert!(connection.download(None).expect("download").is_none());
    }

    #[test]
    fn test_close_without_owner_is_noop() {
        let connection =
            NetSocketConnection::with_dialer(options(100), Arc::new(RefusingDialer)).expect("new");

        assert!(!connection.close(SessionId::generate()));
        assert_eq!(connection.state(), ConnectionState::Idle);
    }

    #[test]
    fn test_invalid_options_rejected() {
        let result = NetSocketConnection::with_dialer(
            ClientOptions::new("", 8888),
            Arc::new(RefusingDialer),
        );
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
