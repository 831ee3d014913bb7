//! Socket transport layer.
//!
//! This module drives raw byte streams on the tokio runtime and hands the
//! bytes to the blocking side through the relay.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Client         │                              │  Server         │
//! │                 │           TCP                │                 │
//! │  Dialer         │─────────────────────────────►│  TcpListener    │
//! │  → SocketHandle │◄────────────────────────────►│  → SocketHandle │
//! │  → RelaySlot    │                              │  → DataHandler  │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Socket Lifecycle
//!
//! 1. `Dialer::dial` (client) or `TcpListener::accept` (server)
//! 2. `SocketHandle::spawn` - start the event loop with its callbacks
//! 3. `SocketHandle::write` - queue outbound chunks from any thread
//! 4. `SocketHandle::shutdown` - flush and close; `on_closed` fires once
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `dialer` | Connect strategy with bounded reconnect |
//! | `socket` | Per-socket event loop and handle |

// ============================================================================
// Submodules
// ============================================================================

/// Outbound connect strategy.
pub mod dialer;

/// Per-socket event loop.
pub mod socket;

// ============================================================================
// Re-exports
// ============================================================================

pub use dialer::{AsyncStream, BoxedStream, Dialer, ReconnectPolicy, TcpDialer};
pub use socket::{CloseReason, SocketEvents, SocketHandle};
