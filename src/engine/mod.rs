//! RPC engine contract.
//!
//! The engine is an external, strictly blocking component: it reads a call
//! from a request stream and writes the result to a response stream. This
//! crate only moves bytes; it never interprets them.
//!
//! # Contract
//!
//! | Trait | Role |
//! |-------|------|
//! | [`RpcEngine`] | `process(request, response)`, one call per invocation |
//! | [`RpcRequest`] | Blocking input stream plus `close` |
//! | [`RpcResponse`] | Output stream, properties, `close` |
//! | [`FileHandle`] | File-like payload with name and length |
//! | [`FileStore`] | Server-held payloads keyed by [`CacheKey`](crate::CacheKey) |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `echo` | Line echo engine |
//! | `file` | File handle and store traits |
//! | `store` | In-memory and temp-file stores |

// ============================================================================
// Imports
// ============================================================================

use std::error::Error as StdError;
use std::io::{self, Read, Write};

// ============================================================================
// Submodules
// ============================================================================

/// Line echo engine.
pub mod echo;

/// File handle and store traits.
pub mod file;

/// Store implementations.
pub mod store;

// ============================================================================
// Re-exports
// ============================================================================

pub use echo::EchoEngine;
pub use file::{FileHandle, FileStore};
pub use store::{MemoryFile, MemoryFileStore, TempFileStore};

// ============================================================================
// Types
// ============================================================================

/// Error returned by an engine call.
pub type EngineError = Box<dyn StdError + Send + Sync>;

// ============================================================================
// Traits
// ============================================================================

/// Input side of one engine call.
pub trait RpcRequest {
    /// Blocking stream of the call's bytes.
    fn input_stream(&mut self) -> &mut dyn Read;

    /// Ends this request. Bytes not yet read stay available to the next
    /// request on the same connection.
    fn close(&mut self);

    /// Returns `true` once [`close`](Self::close) was called.
    fn is_closed(&self) -> bool;
}

/// Output side of one engine call.
pub trait RpcResponse {
    /// Stream for the call's result bytes.
    fn output_stream(&mut self) -> &mut dyn Write;

    /// Records a transport property (an HTTP header, for example).
    fn set_property(&mut self, name: &str, value: &str);

    /// Flushes and ends the response.
    ///
    /// # Errors
    ///
    /// Returns the I/O error of the final flush.
    fn close(&mut self) -> io::Result<()>;

    /// Returns `true` once [`close`](Self::close) was called.
    fn is_closed(&self) -> bool;
}

/// Synchronous remote-procedure-call engine.
///
/// Called on a dedicated worker thread; may block for as long as it needs.
pub trait RpcEngine: Send + Sync + 'static {
    /// Processes one call.
    ///
    /// # Errors
    ///
    /// Any error ends the connection the call arrived on.
    fn process(
        &self,
        request: &mut dyn RpcRequest,
        response: &mut dyn RpcResponse,
    ) -> Result<(), EngineError>;
}
