//! Server side: socket dispatch, the RPC worker loop and the HTTP binding.
//!
//! # Architecture
//!
//! ```text
//! TcpListener ──accept──► SocketHandle ──on_data──► DataHandler
//!                                                      │ first chunk
//!                                                      ▼
//!                                            rpc-worker-<id> thread
//!                                              mode byte ─┬─ 'C' ► process() loop
//!                                                         ├─ 'U' ► handle_upload
//!                                                         └─ 'D' ► handle_download
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `adapters` | Engine request/response over relay and socket |
//! | `dispatcher` | Per-socket callbacks and the worker loop |
//! | `http` | [`HttpServer`] on hyper |
//! | `lifecycle` | Start/stop bookkeeping |
//! | `net` | [`NetSocketServer`] accept loop and registry |
//! | `transfer` | Upload and download handlers |

// ============================================================================
// Submodules
// ============================================================================

/// Engine adapters for socket connections.
pub mod adapters;

/// Per-socket dispatch.
mod dispatcher;

/// HTTP binding.
pub mod http;

/// Server start/stop state.
mod lifecycle;

/// Socket server.
pub mod net;

/// One-shot transfer handlers.
pub mod transfer;

// ============================================================================
// Re-exports
// ============================================================================

pub use adapters::{StreamRequest, StreamResponse};
pub use http::{HttpServer, KEY_PARAM};
pub use net::NetSocketServer;
pub use transfer::{handle_download, handle_upload};
