//! Remote file handles and the transfer façades.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::engine::FileHandle;
use crate::error::Result;
use crate::identifiers::CacheKey;

// ============================================================================
// RemoteFileHandle
// ============================================================================

/// Reference to a payload held by the server.
///
/// Returned by uploads; pass it back to download the payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteFileHandle {
    file_name: Option<String>,
    key: CacheKey,
}

impl RemoteFileHandle {
    /// Creates a handle.
    #[must_use]
    pub fn new(file_name: Option<String>, key: CacheKey) -> Self {
        Self { file_name, key }
    }

    /// Original file name, if the uploaded handle had one.
    #[inline]
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// Server-side cache key.
    #[inline]
    #[must_use]
    pub fn key(&self) -> &CacheKey {
        &self.key
    }
}

impl fmt::Display for RemoteFileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file_name {
            Some(name) => write!(f, "{name} ({})", self.key),
            None => write!(f, "{}", self.key),
        }
    }
}

// ============================================================================
// Executors
// ============================================================================

/// Reads server-held payloads.
pub trait DownloadExecutor {
    /// Opens the payload behind `handle`.
    ///
    /// # Errors
    ///
    /// [`Error::Transfer`](crate::Error::Transfer) if the transfer socket
    /// cannot be established.
    fn read_content(&self, handle: &RemoteFileHandle) -> Result<Box<dyn Read + Send>>;

    /// Returns the payload length behind `handle`.
    ///
    /// # Errors
    ///
    /// [`Error::Transfer`](crate::Error::Transfer) if the transfer socket
    /// cannot be established.
    fn content_length(&self, handle: &RemoteFileHandle) -> Result<u64>;
}

/// Sends local payloads to the server.
pub trait UploadExecutor {
    /// Uploads `file` and returns the handle the server stored it under.
    ///
    /// # Errors
    ///
    /// [`Error::Transfer`](crate::Error::Transfer) if the transfer fails.
    fn write_content(&self, file: &dyn FileHandle) -> Result<RemoteFileHandle>;
}

// ============================================================================
// Tests
// ============================================================================
