//! [`FileStore`] implementations.
//!
//! | Store | Backing |
//! |-------|---------|
//! | [`MemoryFileStore`] | `Bytes` in a hash map |
//! | [`TempFileStore`] | One temp file per payload, removed on drop |

// ============================================================================
// Imports
// ============================================================================

use std::fs::File;
use std::io::{self, Cursor, Read, Write};
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tempfile::{NamedTempFile, TempDir};
use tracing::debug;

use crate::identifiers::CacheKey;

use super::file::{FileHandle, FileStore};

// ============================================================================
// MemoryFile
// ============================================================================

/// In-memory payload.
#[derive(Debug, Clone)]
pub struct MemoryFile {
    name: Option<String>,
    data: Bytes,
}

impl MemoryFile {
    /// Creates a payload.
    #[must_use]
    pub fn new(name: Option<&str>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.map(str::to_owned),
            data: data.into(),
        }
    }

    /// Returns the payload bytes.
    #[inline]
    #[must_use]
    pub fn data(&self) -> &Bytes {
        &self.data
    }
}

impl FileHandle for MemoryFile {
    fn file_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn length(&self) -> io::Result<u64> {
        Ok(self.data.len() as u64)
    }

    fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(Cursor::new(self.data.clone())))
    }
}

// ============================================================================
// MemoryFileStore
// ============================================================================

/// Thread-safe in-memory store.
#[derive(Debug, Default)]
pub struct MemoryFileStore {
    entries: RwLock<FxHashMap<CacheKey, Arc<MemoryFile>>>,
}

impl MemoryFileStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored payloads.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl FileStore for MemoryFileStore {
    fn put(
        &self,
        key: Option<CacheKey>,
        file_name: Option<&str>,
        content: &mut dyn Read,
    ) -> io::Result<CacheKey> {
        let mut data = Vec::new();
        content.read_to_end(&mut data)?;

        let key = key.unwrap_or_else(CacheKey::generate);
        debug!(key = %key, bytes = data.len(), "Stored payload in memory");

        let file = Arc::new(MemoryFile::new(file_name, data));
        self.entries.write().insert(key.clone(), file);
        Ok(key)
    }

    fn get(&self, key: &CacheKey) -> Option<Arc<dyn FileHandle>> {
        let file = self.entries.read().get(key).cloned()?;
        Some(file)
    }

    fn remove(&self, key: &CacheKey) -> bool {
        self.entries.write().remove(key).is_some()
    }
}

// ============================================================================
// TempFileStore
// ============================================================================

#[derive(Debug)]
struct TempFile {
    name: Option<String>,
    file: NamedTempFile,
}

impl FileHandle for TempFile {
    fn file_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn length(&self) -> io::Result<u64> {
        Ok(self.file.as_file().metadata()?.len())
    }

    fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(File::open(self.file.path())?))
    }
}

/// Store writing each payload to its own temp file.
///
/// Files live in a private temp directory removed with the store.
#[derive(Debug)]
pub struct TempFileStore {
    dir: TempDir,
    entries: RwLock<FxHashMap<CacheKey, Arc<TempFile>>>,
}

impl TempFileStore {
    /// Creates a store under the system temp directory.
    ///
    /// # Errors
    ///
    /// I/O error if the directory cannot be created.
    pub fn new() -> io::Result<Self> {
        Self::with_dir(tempfile::Builder::new().prefix("netsocket-").tempdir()?)
    }

    /// Creates a store under `parent`.
    ///
    /// # Errors
    ///
    /// I/O error if the directory cannot be created.
    pub fn in_dir(parent: &Path) -> io::Result<Self> {
        Self::with_dir(
            tempfile::Builder::new()
                .prefix("netsocket-")
                .tempdir_in(parent)?,
        )
    }

    fn with_dir(dir: TempDir) -> io::Result<Self> {
        debug!(path = %dir.path().display(), "Temp file store created");
        Ok(Self {
            dir,
            entries: RwLock::new(FxHashMap::default()),
        })
    }

    /// Directory holding the payload files.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

impl FileStore for TempFileStore {
    fn put(
        &self,
        key: Option<CacheKey>,
        file_name: Option<&str>,
        content: &mut dyn Read,
    ) -> io::Result<CacheKey> {
        let mut file = NamedTempFile::new_in(self.dir.path())?;
        let written = io::copy(content, &mut file)?;
        file.flush()?;

        let key = key.unwrap_or_else(CacheKey::generate);
        debug!(key = %key, bytes = written, "Stored payload in temp file");

        let entry = Arc::new(TempFile {
            name: file_name.map(str::to_owned),
            file,
        });
        self.entries.write().insert(key.clone(), entry);
        Ok(key)
    }

    fn get(&self, key: &CacheKey) -> Option<Arc<dyn FileHandle>> {
        let file = self.entries.read().get(key).cloned()?;
        Some(file)
    }

    fn remove(&self, key: &CacheKey) -> bool {
        self.entries.write().remove(key).is_some()
    }
}

// ============================================================================
// Tests
// ============================================================================
