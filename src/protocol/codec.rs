//! Frame encoding and decoding.
//!
//! A frame body is one gzip member followed by [`SENTINEL`]. The helpers
//! here take a closure that writes or reads the plain body, so callers can
//! stream payloads of any size through the compressor.
//!
//! Primitive fields use big-endian layout:
//!
//! | Field | Layout |
//! |-------|--------|
//! | length | 8-byte signed integer |
//! | string | 2-byte unsigned length, then UTF-8 bytes |

// ============================================================================
// Imports
// ============================================================================

use std::io::{self, BufRead, ErrorKind, Read, Write};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use super::mode::SENTINEL;
use super::sentinel::SentinelReader;

// ============================================================================
// Frames
// ============================================================================

/// Writes one frame: `body` output compressed, then the sentinel.
///
/// Flushes `out` afterwards.
pub fn write_frame<W, T, F>(out: &mut W, body: F) -> io::Result<T>
where
    W: Write + ?Sized,
    F: FnOnce(&mut dyn Write) -> io::Result<T>,
{
    let mut encoder = GzEncoder::new(&mut *out, Compression::default());
    let value = body(&mut encoder)?;
    encoder.finish()?;

    out.write_all(&SENTINEL)?;
    out.flush()?;
    Ok(value)
}

/// Reads one frame, handing the decompressed body to `body`.
///
/// Whatever `body` leaves unread is decompressed and dropped so the gzip
/// trailer is checked, then the sentinel is consumed. Bytes after the
/// sentinel stay in `input`.
///
/// # Errors
///
/// Truncated or corrupt input surfaces as [`ErrorKind::UnexpectedEof`] or
/// [`ErrorKind::InvalidInput`]/[`ErrorKind::InvalidData`].
pub fn read_frame<R, T, F>(input: &mut R, body: F) -> io::Result<T>
where
    R: BufRead + ?Sized,
    F: FnOnce(&mut dyn Read) -> io::Result<T>,
{
    let mut framed = SentinelReader::new(&mut *input);
    let value = {
        let mut decoder = GzDecoder::new(&mut framed);
        let value = body(&mut decoder)?;
        io::copy(&mut decoder, &mut io::sink())?;
        value
    };
    framed.skip_to_sentinel()?;
    Ok(value)
}

/// Encodes a frame into a new buffer.
pub fn encode_frame<F>(body: F) -> io::Result<Vec<u8>>
where
    F: FnOnce(&mut dyn Write) -> io::Result<()>,
{
    let mut out = Vec::new();
    write_frame(&mut out, body)?;
    Ok(out)
}

// ============================================================================
// Primitives
// ============================================================================

/// Writes a big-endian `i64`.
#[inline]
pub fn write_i64(out: &mut dyn Write, value: i64) -> io::Result<()> {
    out.write_all(&value.to_be_bytes())
}

/// Reads a big-endian `i64`.
#[inline]
pub fn read_i64(input: &mut dyn Read) -> io::Result<i64> {
    let mut bytes = [0u8; 8];
    input.read_exact(&mut bytes)?;
    Ok(i64::from_be_bytes(bytes))
}

/// Writes a length-prefixed UTF-8 string.
///
/// # Errors
///
/// [`ErrorKind::InvalidInput`] if the string exceeds 65535 bytes.
pub fn write_utf(out: &mut dyn Write, value: &str) -> io::Result<()> {
    let len = u16::try_from(value.len()).map_err(|_| {
        io::Error::new(
            ErrorKind::InvalidInput,
            format!("string of {} bytes exceeds 65535", value.len()),
        )
    })?;
    out.write_all(&len.to_be_bytes())?;
    out.write_all(value.as_bytes())
}

/// Reads a length-prefixed UTF-8 string.
pub fn read_utf(input: &mut dyn Read) -> io::Result<String> {
    let mut len = [0u8; 2];
    input.read_exact(&mut len)?;

    let mut bytes = vec![0u8; usize::from(u16::from_be_bytes(len))];
    input.read_exact(&mut bytes)?;
    String::from_utf8(bytes).map_err(|e| io::Error::new(ErrorKind::InvalidData, e))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Cursor;

    use proptest::prelude::*;

    fn payload_frame(payload: &[u8]) -> Vec<u8> {
        encode_frame(|w| w.write_all(payload)).expect("encode")
    }

    fn read_all(r: &mut dyn Read) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        r.read_to_end(&mut out)?;
        Ok(out)
    }

    #[test]
    fn test_frame_ends_with_sentinel() {
        let frame = payload_frame(b"abc");
        assert!(frame.ends_with(&SENTINEL));
        // gzip magic
        assert_eq!(&frame[..2], &[0x1F, 0x8B]);
    }

    #[test]
    fn test_zero_length_round_trip() {
        let frame = payload_frame(b"");
        let mut input = Cursor::new(frame);
        let body = read_frame(&mut input, read_all).expect("decode");
        assert!(body.is_empty());
    }

    #[test]
    fn test_bytes_after_sentinel_left_unread() {
        let mut wire = payload_frame(b"first");
        wire.extend_from_slice(&payload_frame(b"second"));
        let mut input = Cursor::new(wire);
        assert_eq!(read_frame(&mut input, read_all).expect("first"), b"first");
        assert_eq!(read_frame(&mut input, read_all).expect("second"), b"second");
    }

    #[test]
    fn test_partial_body_read_still_consumes_frame() {
        let mut wire = encode_frame(|w| {
            write_i64(w, 42)?;
            w.write_all(b"ignored tail")
        })
        .expect("encode");
        wire.push(b'X');
        let mut input = Cursor::new(wire);

        let value = read_frame(&mut input, |r| read_i64(r)).expect("decode");
        assert_eq!(value, 42);

        let mut rest = Vec::new();
        input.read_to_end(&mut rest).expect("rest");
        assert_eq!(rest, b"X");
    }

    #[test]
    fn test_truncated_frame_is_error() {
        let frame = payload_frame(&[9u8; 1000]);
        let mut input = Cursor::new(frame[..frame.len() / 2].to_vec());
        let err = read_frame(&mut input, read_all).unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::UnexpectedEof | ErrorKind::InvalidInput | ErrorKind::InvalidData
        ));
    }

    #[test]
    fn test_utf_round_trip() {
        let mut buf = Vec::new();
        write_utf(&mut buf, "schlüssel").expect("write");
        assert_eq!(&buf[..2], &[0, 10]);
        assert_eq!(read_utf(&mut Cursor::new(buf)).expect("read"), "schlüssel");
    }

    #[test]
    fn test_utf_rejects_oversized_string() {
        let long = "x".repeat(70_000);
        let err = write_utf(&mut Vec::new(), &long).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_i64_is_big_endian() {
        let mut buf = Vec::new();
        write_i64(&mut buf, 10_000).expect("write");
        assert_eq!(buf, [0, 0, 0, 0, 0, 0, 0x27, 0x10]);
    }

    proptest! {
        #[test]
        fn prop_frame_round_trip(payload in proptest::collection::vec(any::<u8>(), 0..4096)) {
            let mut input = Cursor::new(payload_frame(&payload));
            let decoded = read_frame(&mut input, read_all).expect("decode");
            prop_assert_eq!(decoded, payload);
        }
    }
}
