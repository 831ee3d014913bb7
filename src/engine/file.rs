//! File handle and store traits.

// ============================================================================
// Imports
// ============================================================================

use std::io::{self, Read};
use std::sync::Arc;

use crate::identifiers::CacheKey;

// ============================================================================
// FileHandle
// ============================================================================

/// A file-like payload.
pub trait FileHandle: Send + Sync {
    /// Display name, if known.
    fn file_name(&self) -> Option<&str>;

    /// Payload length in bytes.
    ///
    /// # Errors
    ///
    /// I/O error from the backing storage.
    fn length(&self) -> io::Result<u64>;

    /// Opens a fresh reader positioned at the start of the payload.
    ///
    /// # Errors
    ///
    /// I/O error from the backing storage.
    fn open(&self) -> io::Result<Box<dyn Read + Send>>;
}

// ============================================================================
// FileStore
// ============================================================================

/// Server-side object cache for uploaded payloads.
pub trait FileStore: Send + Sync + 'static {
    /// Stores everything `content` yields.
    ///
    /// Uses `key` if given, otherwise generates a fresh one. An existing
    /// entry under the same key is replaced.
    ///
    /// # Errors
    ///
    /// I/O error from `content` or the backing storage.
    fn put(
        &self,
        key: Option<CacheKey>,
        file_name: Option<&str>,
        content: &mut dyn Read,
    ) -> io::Result<CacheKey>;

    /// Looks up a payload.
    fn get(&self, key: &CacheKey) -> Option<Arc<dyn FileHandle>>;

    /// Drops a payload. Returns `true` if it existed.
    fn remove(&self, key: &CacheKey) -> bool;
}
