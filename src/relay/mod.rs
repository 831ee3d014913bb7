//! Async-to-blocking byte relay.
//!
//! The network side appends without ever blocking; the engine side reads
//! with ordinary blocking `std::io` calls on its own thread.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  append   ┌───────────────┐  read (blocks)  ┌──────────────┐
//! │ socket task  │──────────►│  RelaySlot    │────────────────►│ worker       │
//! │ (tokio)      │           │ └ RelayBuffer │                 │ thread       │
//! │              │◄──────────┤               │                 │              │
//! └──────────────┘  chunks   └───────────────┘  write          └──────────────┘
//!        ▲                                         │
//!        └──────── ChunkSink ◄── CoalescingWriter ◄┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `buffer` | `RelayBuffer` and its `Read`/`BufRead` adapter |
//! | `slot` | Per-socket holder of the current relay buffer |
//! | `writer` | Coalescing outbound writer |

// ============================================================================
// Submodules
// ============================================================================

/// Relay buffer and reader.
pub mod buffer;

/// Current-buffer slot.
pub mod slot;

/// Coalescing chunk writer.
pub mod writer;

// ============================================================================
// Re-exports
// ============================================================================

pub use buffer::{RelayBuffer, RelayReader};
pub use slot::RelaySlot;
pub use writer::{ChunkSink, CoalescingWriter, FLUSH_THRESHOLD};
