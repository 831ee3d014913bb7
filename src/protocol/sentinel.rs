//! Sentinel-delimited reader.
//!
//! Exposes the bytes preceding the next [`SENTINEL`] as a finite stream.
//! The underlying reader is never advanced past the sentinel, so whatever
//! follows it stays available for the next frame.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::io::{self, BufRead, ErrorKind, Read};

use super::mode::SENTINEL;

// ============================================================================
// SentinelReader
// ============================================================================

/// Reads up to (and swallows) the next sentinel of an inner [`BufRead`].
///
/// End-of-input before the sentinel is reported as
/// [`ErrorKind::UnexpectedEof`].
#[derive(Debug)]
pub struct SentinelReader<R> {
    inner: R,
    /// Longest suffix of what was scanned that is a prefix of the sentinel.
    held: Vec<u8>,
    /// Scanned bytes known to belong to the body.
    ready: VecDeque<u8>,
    terminated: bool,
}

impl<R: BufRead> SentinelReader<R> {
    /// Wraps `inner`.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            held: Vec::with_capacity(SENTINEL.len()),
            ready: VecDeque::new(),
            terminated: false,
        }
    }

    /// Returns `true` once the sentinel has been consumed.
    #[inline]
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Discards remaining body bytes and consumes the sentinel.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::UnexpectedEof`] if the input ends first.
    pub fn skip_to_sentinel(&mut self) -> io::Result<()> {
        loop {
            self.ready.clear();
            if self.terminated {
                return Ok(());
            }
            self.pump()?;
        }
    }

    /// Returns the wrapped reader.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Scans one buffer's worth of input.
    fn pump(&mut self) -> io::Result<()> {
        let chunk = self.inner.fill_buf()?;
        if chunk.is_empty() {
            return Err(io::Error::new(
                ErrorKind::UnexpectedEof,
                "input ended before frame sentinel",
            ));
        }

        let mut used = 0;
        for &byte in chunk {
            used += 1;
            self.held.push(byte);

            if self.held == SENTINEL {
                self.held.clear();
                self.terminated = true;
                break;
            }
            while !SENTINEL.starts_with(&self.held) {
                let front = self.held.remove(0);
                self.ready.push_back(front);
            }
        }

        self.inner.consume(used);
        Ok(())
    }
}

impl<R: BufRead> Read for SentinelReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        while self.ready.is_empty() && !self.terminated {
            self.pump()?;
        }

        let count = buf.len().min(self.ready.len());
        for (slot, byte) in buf.iter_mut().zip(self.ready.drain(..count)) {
            *slot = byte;
        }
        Ok(count)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::{BufReader, Cursor};

    fn framed(body: &[u8], trailer: &[u8]) -> Vec<u8> {
        let mut bytes = body.to_vec();
        bytes.extend_from_slice(&SENTINEL);
        bytes.extend_from_slice(trailer);
        bytes
    }

    #[test]
    fn test_reads_body_and_stops_at_sentinel() {
        let mut input = Cursor::new(framed(b"payload", b"next"));
        let mut reader = SentinelReader::new(&mut input);

        let mut body = Vec::new();
        reader.read_to_end(&mut body).expect("read body");
        assert_eq!(body, b"payload");
        assert!(reader.is_terminated());

        let mut rest = Vec::new();
        input.read_to_end(&mut rest).expect("read rest");
        assert_eq!(rest, b"next");
    }

    #[test]
    fn test_partial_sentinel_prefix_is_body() {
        // First two sentinel bytes appear, then diverge.
        let body = [1, 0xA0, 0x19, 2, 0xA0, 0xA0, 0x19, 0xAA, 3];
        let mut input = Cursor::new(framed(&body, b""));
        let mut reader = SentinelReader::new(&mut input);

        let mut out = Vec::new();
        reader.read_to_end(&mut out).expect("read body");
        assert_eq!(out, body);
    }

    #[test]
    fn test_missing_sentinel_is_unexpected_eof() {
        let mut reader = SentinelReader::new(Cursor::new(b"no marker".to_vec()));
        let mut out = Vec::new();
        let err = reader.read_to_end(&mut out).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_skip_to_sentinel_discards_body() {
        let mut input = Cursor::new(framed(b"ignored", b"after"));
        {
            let mut reader = SentinelReader::new(&mut input);
            reader.skip_to_sentinel().expect("skip");
            reader.skip_to_sentinel().expect("idempotent");
        }
        let mut rest = String::new();
        input.read_to_string(&mut rest).expect("read rest");
        assert_eq!(rest, "after");
    }

    #[test]
    fn test_sentinel_split_across_buffers() {
        let bytes = framed(b"abcdefgh", b"tail");
        // Capacity 3 forces the sentinel to straddle fill_buf calls.
        let mut input = BufReader::with_capacity(3, Cursor::new(bytes));
        let mut reader = SentinelReader::new(&mut input);

        let mut body = Vec::new();
        reader.read_to_end(&mut body).expect("read body");
        assert_eq!(body, b"abcdefgh");

        let mut rest = Vec::new();
        input.read_to_end(&mut rest).expect("read rest");
        assert_eq!(rest, b"tail");
    }

    #[test]
    fn test_empty_body() {
        let mut reader = SentinelReader::new(Cursor::new(framed(b"", b"")));
        let mut out = Vec::new();
        assert_eq!(reader.read_to_end(&mut out).expect("read"), 0);
        assert!(reader.is_terminated());
    }
}
