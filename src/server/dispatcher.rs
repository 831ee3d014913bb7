//! Per-socket dispatch and the RPC worker loop.
//!
//! Every accepted socket gets a [`DataHandler`] as its event callbacks.
//! The handler relays incoming chunks and, on the first one, starts the
//! socket's single worker thread. The worker reads the mode byte and
//! either loops over engine calls (Communication) or runs one transfer
//! handler (Upload, Download).
//!
//! # Worker Loop
//!
//! ```text
//! wait_readable ──► process(request, response) ──► request.close (rollover)
//!      ▲                                            response.close (flush)
//!      └──────────────────────────────────────────────────┘
//! ```
//!
//! One call per wakeup, never two at once. The loop ends when the relay
//! finishes empty, the stop flag is set, or the engine fails.

// ============================================================================
// Imports
// ============================================================================

use std::io::{BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use bytes::Bytes;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tokio::runtime::Handle;
use tracing::{debug, error, info, trace, warn};

use crate::engine::{FileStore, RpcEngine, RpcRequest, RpcResponse};
use crate::error::{Error, Result};
use crate::identifiers::ConnectionId;
use crate::protocol::StreamMode;
use crate::relay::{CoalescingWriter, RelaySlot};
use crate::transport::{AsyncStream, CloseReason, SocketEvents, SocketHandle};

use super::adapters::{StreamRequest, StreamResponse};
use super::transfer::{handle_download, handle_upload};

// ============================================================================
// DispatchContext
// ============================================================================

/// Live sockets of one server, keyed by connection id.
pub(crate) type ConnectionRegistry = RwLock<FxHashMap<ConnectionId, SocketHandle>>;

/// What every connection of a server shares.
pub(crate) struct DispatchContext {
    pub(crate) engine: Arc<dyn RpcEngine>,
    pub(crate) store: Arc<dyn FileStore>,
    pub(crate) connections: ConnectionRegistry,
}

impl DispatchContext {
    pub(crate) fn new(engine: Arc<dyn RpcEngine>, store: Arc<dyn FileStore>) -> Self {
        Self {
            engine,
            store,
            connections: RwLock::new(FxHashMap::default()),
        }
    }

    /// Shuts every live socket down and forgets them.
    pub(crate) fn shutdown_all(&self) -> usize {
        let sockets: Vec<_> = self.connections.write().drain().collect();
        let count = sockets.len();
        for (id, socket) in sockets {
            socket.shutdown();
            debug!(conn = %id, "Connection closed during shutdown");
        }
        count
    }
}

/// Starts the event loop for an accepted socket and registers it.
pub(crate) fn accept<S>(runtime: &Handle, stream: S, context: &Arc<DispatchContext>) -> SocketHandle
where
    S: AsyncStream + 'static,
{
    SocketHandle::spawn_with(runtime, stream, |socket| {
        context
            .connections
            .write()
            .insert(socket.id(), socket.clone());
        DataHandler::new(socket, Arc::clone(context))
    })
}

// ============================================================================
// DataHandler
// ============================================================================

/// Event callbacks of one server-side socket.
pub(crate) struct DataHandler {
    socket: SocketHandle,
    slot: Arc<RelaySlot>,
    context: Arc<DispatchContext>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    /// Set once a worker was started or failed to start.
    started: bool,
}

impl DataHandler {
    fn new(socket: SocketHandle, context: Arc<DispatchContext>) -> Self {
        Self {
            socket,
            slot: Arc::new(RelaySlot::new()),
            context,
            stop: Arc::new(AtomicBool::new(false)),
            worker: None,
            started: false,
        }
    }

    fn start_worker(&mut self) {
        self.started = true;

        let worker = Worker {
            socket: self.socket.clone(),
            slot: Arc::clone(&self.slot),
            context: Arc::clone(&self.context),
            stop: Arc::clone(&self.stop),
        };

        let spawned = thread::Builder::new()
            .name(format!("rpc-worker-{}", self.socket.id()))
            .spawn(move || worker.run());

        match spawned {
            Ok(handle) => self.worker = Some(handle),
            Err(e) => {
                error!(conn = %self.socket.id(), error = %e, "Worker thread failed to start");
                self.socket.shutdown();
            }
        }
    }
}

impl SocketEvents for DataHandler {
    fn on_data(&mut self, chunk: Bytes) {
        self.slot.append(&chunk);
        if !self.started {
            self.start_worker();
        }
    }

    fn on_closed(&mut self, reason: CloseReason) {
        let id = self.socket.id();
        match &reason {
            CloseReason::Error(e) => warn!(conn = %id, error = %e, "Connection failed"),
            CloseReason::Eof | CloseReason::Local => debug!(conn = %id, ?reason, "Connection ended"),
        }

        self.stop.store(true, Ordering::Release);
        self.slot.finish();
        self.context.connections.write().remove(&id);

        let Some(worker) = self.worker.take() else {
            return;
        };

        // A worker stuck in the engine must not stall the event loop.
        match Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn_blocking(move || {
                    if worker.join().is_err() {
                        error!(conn = %id, "Worker thread panicked");
                    }
                    trace!(conn = %id, "Worker joined");
                });
            }
            // Runtime already gone; the worker sees the finished relay and exits.
            Err(_) => trace!(conn = %id, "Worker detached"),
        }
    }
}

// ============================================================================
// Worker
// ============================================================================

struct Worker {
    socket: SocketHandle,
    slot: Arc<RelaySlot>,
    context: Arc<DispatchContext>,
    stop: Arc<AtomicBool>,
}

impl Worker {
    fn run(self) {
        let id = self.socket.id();

        let Some(byte) = self.slot.current().read_byte() else {
            return;
        };

        let result = StreamMode::try_from(byte).and_then(|mode| {
            debug!(conn = %id, %mode, "Stream mode selected");
            match mode {
                StreamMode::Communication => self.communicate(),
                StreamMode::Upload => self.transfer(|input, output, store| {
                    handle_upload(input, output, store).map(drop)
                }),
                StreamMode::Download => self.transfer(|input, output, store| {
                    handle_download(input, output, store).map(drop)
                }),
            }
        });

        match result {
            Ok(()) => trace!(conn = %id, "Worker finished"),
            Err(e @ Error::Handler { .. }) => {
                error!(conn = %id, error = %e, "Engine call failed, closing connection");
                self.socket.shutdown();
            }
            Err(e) => {
                warn!(conn = %id, error = %e, "Connection rejected");
                self.socket.shutdown();
            }
        }
    }

    fn communicate(&self) -> Result<()> {
        let id = self.socket.id();
        let mut calls = 0u64;

        while !self.stop.load(Ordering::Acquire) && self.slot.wait_readable() {
            let mut request = StreamRequest::new(Arc::clone(&self.slot));
            let mut response = StreamResponse::new(self.socket.clone());

            self.context
                .engine
                .process(&mut request, &mut response)
                .map_err(|e| Error::handler(e.to_string()))?;

            let consumed = request.consumed();
            request.close();
            response.close()?;

            calls += 1;
            trace!(conn = %id, call = calls, consumed, "Engine call completed");

            if consumed == 0 {
                // Would be handed the same bytes again forever.
                return Err(Error::handler("engine returned without reading its input"));
            }
        }

        info!(conn = %id, calls, "RPC loop ended");
        Ok(())
    }

    fn transfer<F>(&self, handler: F) -> Result<()>
    where
        F: FnOnce(&mut dyn BufRead, &mut dyn Write, &dyn FileStore) -> Result<()>,
    {
        let mut input = self.slot.current().reader();
        let mut output = CoalescingWriter::new(self.socket.clone());
        handler(&mut input, &mut output, self.context.store.as_ref())
    }
}

// ============================================================================
// Tests
// ============================================================================
