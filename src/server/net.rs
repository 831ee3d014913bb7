//! Raw socket server.
//!
//! Accepts TCP connections and hands each one to the dispatcher. The
//! server keeps a registry of live sockets so [`NetSocketServer::stop`] can
//! close them all.

// ============================================================================
// Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::config::ServerOptions;
use crate::engine::{FileStore, RpcEngine};
use crate::error::Result;

use super::dispatcher::{self, DispatchContext};
use super::lifecycle::{Lifecycle, stopped};

// ============================================================================
// NetSocketServer
// ============================================================================

/// Socket server for the Communication, Upload and Download sub-protocols.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use netsocket_rpc::{EchoEngine, MemoryFileStore, NetSocketServer, ServerOptions};
///
/// let server = NetSocketServer::new(
///     ServerOptions::default().with_port(0),
///     Arc::new(EchoEngine),
///     Arc::new(MemoryFileStore::new()),
/// )?;
/// let addr = server.start().await?;
/// println!("listening on {addr}");
///
/// server.stop();
/// server.wait().await;
/// ```
pub struct NetSocketServer {
    options: ServerOptions,
    context: Arc<DispatchContext>,
    lifecycle: Lifecycle,
}

// ============================================================================
// NetSocketServer - Constructor
// ============================================================================

impl NetSocketServer {
    /// Creates a server. Nothing is bound until [`start`](Self::start).
    ///
    /// # Errors
    ///
    /// [`Error::Config`](crate::Error::Config) for invalid options.
    pub fn new(
        options: ServerOptions,
        engine: Arc<dyn RpcEngine>,
        store: Arc<dyn FileStore>,
    ) -> Result<Arc<Self>> {
        options.validate()?;
        Ok(Arc::new(Self {
            options,
            context: Arc::new(DispatchContext::new(engine, store)),
            lifecycle: Lifecycle::new(),
        }))
    }
}

// ============================================================================
// NetSocketServer - Public API
// ============================================================================

impl NetSocketServer {
    /// Returns the options.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &ServerOptions {
        &self.options
    }

    /// Returns the bound address once started.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.lifecycle.local_addr()
    }

    /// Returns the number of live connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.context.connections.read().len()
    }

    /// Binds the listener and starts accepting.
    ///
    /// Port 0 binds an ephemeral port; the returned address has the real one.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`](crate::Error::InvalidState) if already
    ///   started or stopped
    /// - [`Error::Io`](crate::Error::Io) if binding fails
    pub async fn start(self: &Arc<Self>) -> Result<SocketAddr> {
        self.lifecycle.ensure_startable()?;

        let listener =
            TcpListener::bind((self.options.interface.as_str(), self.options.port)).await?;
        let addr = listener.local_addr()?;
        self.lifecycle.started(addr);

        let server = Arc::clone(self);
        let stop_rx = self.lifecycle.subscribe();
        tokio::spawn(async move {
            server.accept_loop(listener, stop_rx).await;
        });

        info!(%addr, "Socket server started");
        Ok(addr)
    }

    /// Stops accepting and closes every live connection. Idempotent.
    pub fn stop(&self) {
        if !self.lifecycle.stop() {
            return;
        }
        let closed = self.context.shutdown_all();
        info!(connections = closed, "Socket server stopped");
    }

    /// Resolves once [`stop`](Self::stop) was called.
    pub async fn wait(&self) {
        self.lifecycle.wait().await;
    }
}

// ============================================================================
// NetSocketServer - Accept Loop
// ============================================================================

impl NetSocketServer {
    async fn accept_loop(self: Arc<Self>, listener: TcpListener, mut stop_rx: watch::Receiver<bool>) {
        debug!("Accept loop started");
        let runtime = Handle::current();

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            if self.lifecycle.is_stopped() {
                                break;
                            }
                            if self.options.tcp_nodelay
                                && let Err(e) = stream.set_nodelay(true)
                            {
                                debug!(%addr, error = %e, "TCP_NODELAY not set");
                            }
                            let socket = dispatcher::accept(&runtime, stream, &self.context);
                            debug!(conn = %socket.id(), %addr, "Connection accepted");
                        }
                        Err(e) => {
                            error!(error = %e, "Accept failed");
                        }
                    }
                }

                () = stopped(&mut stop_rx) => {
                    break;
                }
            }
        }

        debug!("Accept loop terminated");
    }
}

impl std::fmt::Debug for NetSocketServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetSocketServer")
            .field("options", &self.options)
            .field("local_addr", &self.local_addr())
            .field("connections", &self.connection_count())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    use crate::engine::{EchoEngine, MemoryFileStore};

    fn server() -> Arc<NetSocketServer> {
        NetSocketServer::new(
            ServerOptions::default().with_interface("127.0.0.1").with_port(0),
            Arc::new(EchoEngine),
            Arc::new(MemoryFileStore::new()),
        )
        .expect("server")
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_start_echo_stop() {
        let server = server();
        let addr = server.start().await.expect("start");
        assert_ne!(addr.port(), 0);
        assert_eq!(server.local_addr(), Some(addr));

        let mut client = TcpStream::connect(addr).await.expect("connect");
        client.write_all(b"Cping\n").await.expect("write");
        let mut reply = [0u8; 5];
        client.read_exact(&mut reply).await.expect("read");
        assert_eq!(&reply, b"ping\n");
        assert_eq!(server.connection_count(), 1);

        server.stop();
        tokio::time::timeout(Duration::from_secs(1), server.wait())
            .await
            .expect("stopped");

        let mut rest = Vec::new();
        tokio::time::timeout(Duration::from_secs(5), client.read_to_end(&mut rest))
            .await
            .expect("closed in time")
            .expect("eof");
        assert_eq!(server.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_start_twice_rejected() {
        let server = server();
        server.start().await.expect("start");
        assert!(server.start().await.is_err());
        server.stop();
    }
}
