//! Wire protocol.
//!
//! A socket's first byte selects its sub-protocol for its whole life.
//!
//! # Protocol Overview
//!
//! | Mode | Request | Reply |
//! |------|---------|-------|
//! | `C` (0x43) | unframed RPC byte stream | unframed RPC byte stream |
//! | `U` (0x55) | `gz(i64 length, bytes)` + sentinel | `gz(utf key)` + sentinel |
//! | `D` `L` (0x44 0x4C) | `gz(utf key)` + sentinel | `gz(i64 length)` + sentinel |
//! | `D` `D` (0x44 0x44) | `gz(utf key)` + sentinel | `gz(bytes)` + sentinel |
//!
//! `gz(..)` is one gzip member; the sentinel `A0 19 AA FF EE AA` sits
//! outside it so a reader can find the end of a frame by a literal scan.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `mode` | Mode and sub-operation bytes, sentinel constant |
//! | `sentinel` | Reader bounded by the next sentinel |
//! | `codec` | Frame and primitive encode/decode |

// ============================================================================
// Submodules
// ============================================================================

/// Frame encode/decode.
pub mod codec;

/// Mode bytes.
pub mod mode;

/// Sentinel-bounded reader.
pub mod sentinel;

// ============================================================================
// Re-exports
// ============================================================================

pub use codec::{
    encode_frame, read_frame, read_i64, read_utf, write_frame, write_i64, write_utf,
};
pub use mode::{DownloadOp, SENTINEL, StreamMode};
pub use sentinel::SentinelReader;
