//! NetSocket RPC - socket and HTTP transport for a blocking RPC engine.
//!
//! This library moves bytes between remote clients and a synchronous RPC
//! engine. Sockets are driven by a tokio event loop that never blocks;
//! engine calls run on one dedicated worker thread per connection.
//!
//! # Architecture
//!
//! The transport follows a client-server model:
//!
//! - **Client**: [`NetSocketConnection`] opens one primary socket for the
//!   RPC byte stream plus a short-lived transfer socket per upload or
//!   download
//! - **Server**: [`NetSocketServer`] reads the leading mode byte of every
//!   socket and runs either the RPC worker loop or a one-shot transfer
//!   handler; [`HttpServer`] maps one HTTP request to one engine call
//!
//! Key design principles:
//!
//! - The relay buffer is the only structure shared between the event loop
//!   and the worker threads
//! - Bytes reach the engine in socket-receive order; calls on one
//!   connection never overlap
//! - Transfer bodies are gzip blocks followed by a fixed sentinel
//! - The first session that opens a connection owns it
//!
//! # Quick Start
//!
//! ```no_run
//! use std::io::{Read, Write};
//! use netsocket_rpc::{ClientOptions, MemoryFile, NetSocketConnection, Result, SessionId};
//!
//! fn main() -> Result<()> {
//!     let connection = NetSocketConnection::new(ClientOptions::new("localhost", 8888))?;
//!     let session = SessionId::generate();
//!     connection.open(session)?;
//!
//!     // One RPC exchange
//!     let mut request = connection.output_stream()?;
//!     request.write_all(b"hello\n")?;
//!     request.flush()?;
//!     let mut reply = [0u8; 6];
//!     connection.input_stream()?.read_exact(&mut reply)?;
//!
//!     // Round-trip a payload through the server cache
//!     let handle = connection.upload(&MemoryFile::new(Some("a.bin"), vec![1u8; 1024]))?;
//!     let length = connection.content_length(Some(handle.key()))?;
//!     assert_eq!(length, 1024);
//!
//!     connection.close(session);
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Connection lifecycle, RPC streams, transfers |
//! | [`config`] | Options structs and command-line properties |
//! | [`engine`] | Engine contract, file stores, echo engine |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Mode bytes and frame codec |
//! | [`relay`] | Async-to-blocking byte relay |
//! | [`server`] | Socket server, dispatcher, HTTP binding |
//! | [`transport`] | Socket event loop and dialer |

// ============================================================================
// Modules
// ============================================================================

/// Client connection.
///
/// - [`NetSocketConnection`] - primary socket and transfers
/// - [`DownloadStream`] - decompressed payload reader
/// - [`RemoteFileHandle`] - server-held payload reference
pub mod client;

/// Options and command-line properties.
pub mod config;

/// Engine contract and file stores.
pub mod engine;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for sessions, sockets and cache keys.
pub mod identifiers;

/// Wire protocol: mode bytes, sentinel and frame codec.
pub mod protocol;

/// Byte relay between the event loop and worker threads.
pub mod relay;

/// Socket and HTTP servers.
pub mod server;

/// Socket event loop and outbound dialing.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Client types
pub use client::{
    ConnectionState, DownloadExecutor, DownloadStream, NetSocketConnection, RemoteFileHandle,
    UploadExecutor,
};

// Configuration
pub use config::{ClientOptions, HttpOptions, ServerOptions};

// Engine contract
pub use engine::{
    EchoEngine, EngineError, FileHandle, FileStore, MemoryFile, MemoryFileStore, RpcEngine,
    RpcRequest, RpcResponse, TempFileStore,
};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{CacheKey, ConnectionId, SessionId};

// Relay
pub use relay::{RelayBuffer, RelayReader};

// Servers
pub use server::{HttpServer, NetSocketServer};
