//! One-shot upload and download handlers.
//!
//! Both run on the connection's worker thread, read the request from the
//! relay and write exactly one reply frame.

// ============================================================================
// Imports
// ============================================================================

use std::io::{self, BufRead, Read, Write};

use tracing::{debug, info, warn};

use crate::engine::FileStore;
use crate::error::{Error, Result};
use crate::identifiers::CacheKey;
use crate::protocol::{DownloadOp, read_frame, read_i64, read_utf, write_frame, write_i64, write_utf};

// ============================================================================
// Upload
// ============================================================================

/// Stores one upload frame and replies with the new cache key.
///
/// # Errors
///
/// - [`Error::Protocol`] for a negative length or a payload shorter than
///   its declared length (nothing stays stored)
/// - [`Error::Io`] for a malformed frame or a store failure
pub fn handle_upload(
    input: &mut dyn BufRead,
    output: &mut dyn Write,
    store: &dyn FileStore,
) -> Result<CacheKey> {
    let (key, declared, missing) = read_frame(input, |r| {
        let declared = read_i64(r)?;
        let length = u64::try_from(declared).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidData, format!("negative length {declared}"))
        })?;

        let mut limited = r.take(length);
        let key = store.put(None, None, &mut limited)?;
        Ok((key, length, limited.limit()))
    })?;

    if missing > 0 {
        store.remove(&key);
        warn!(key = %key, declared, missing, "Truncated upload rejected");
        return Err(Error::protocol(format!(
            "upload declared {declared} bytes, {missing} missing"
        )));
    }

    write_frame(output, |w| write_utf(w, key.as_str()))?;
    info!(key = %key, bytes = declared, "Upload stored");
    Ok(key)
}

// ============================================================================
// Download
// ============================================================================

/// Answers one length or data query.
///
/// Unknown keys are answered with length 0 or an empty body.
///
/// # Errors
///
/// - [`Error::Protocol`] for an unknown query byte
/// - [`Error::Io`] for a malformed frame or a store failure
pub fn handle_download(
    input: &mut dyn BufRead,
    output: &mut dyn Write,
    store: &dyn FileStore,
) -> Result<DownloadOp> {
    let mut op = [0u8; 1];
    input.read_exact(&mut op)?;
    let op = DownloadOp::try_from(op[0])?;

    let key = CacheKey::from(read_frame(input, |r| read_utf(r))?);
    let file = store.get(&key);
    if file.is_none() {
        warn!(key = %key, ?op, "Download of unknown key");
    }

    match op {
        DownloadOp::Length => {
            let length = match &file {
                Some(file) => file.length()?,
                None => 0,
            };
            let length = i64::try_from(length)
                .map_err(|_| Error::protocol(format!("length {length} exceeds i64")))?;
            write_frame(output, |w| write_i64(w, length))?;
            debug!(key = %key, length, "Length query answered");
        }

        DownloadOp::Data => {
            let sent = write_frame(output, |w| match &file {
                Some(file) => io::copy(&mut file.open()?, w),
                None => Ok(0),
            })?;
            debug!(key = %key, bytes = sent, "Data query answered");
        }
    }

    Ok(op)
}

// ============================================================================
// Tests
// ============================================================================
