//! Client side: connection lifecycle, RPC streams and file transfers.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────┐        ┌────────────────────┐
//! │     NetSocketConnection      │        │  NetSocketServer   │
//! │                              │  0x43  │                    │
//! │  primary ── output_stream ───┼───────►│  RPC worker loop   │
//! │          ◄── input_stream ───┼────────┤                    │
//! │                              │        │                    │
//! │  transfer (one per call) ────┼──0x55─►│  upload handler    │
//! │                           ───┼──0x44─►│  download handler  │
//! └──────────────────────────────┘        └────────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | [`NetSocketConnection`] and its state machine |
//! | `handle` | [`RemoteFileHandle`] and the executor traits |
//! | `transfer` | Transfer socket guard and [`DownloadStream`] |

// ============================================================================
// Submodules
// ============================================================================

/// Connection lifecycle.
pub mod connection;

/// Remote handles and executors.
pub mod handle;

/// Transfer sockets.
pub mod transfer;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{ConnectionState, ConnectionWriter, NetSocketConnection};
pub use handle::{DownloadExecutor, RemoteFileHandle, UploadExecutor};
pub use transfer::DownloadStream;
