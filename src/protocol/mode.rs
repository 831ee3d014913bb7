//! Mode and sub-operation bytes.
//!
//! The first byte a client writes on a fresh socket selects the
//! sub-protocol for the socket's whole life. Download requests carry one
//! more byte selecting what is queried.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use crate::error::Error;

// ============================================================================
// Constants
// ============================================================================

/// Marker following every compressed block on the transfer sub-protocols.
pub const SENTINEL: [u8; 6] = [0xA0, 0x19, 0xAA, 0xFF, 0xEE, 0xAA];

// ============================================================================
// StreamMode
// ============================================================================

/// Sub-protocol selected by the leading byte of a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StreamMode {
    /// `C`: unframed duplex RPC stream.
    Communication = 0x43,
    /// `U`: one upload request and its key reply.
    Upload = 0x55,
    /// `D`: one download request and its reply.
    Download = 0x44,
}

impl StreamMode {
    /// Returns the wire byte.
    #[inline]
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for StreamMode {
    type Error = Error;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0x43 => Ok(Self::Communication),
            0x55 => Ok(Self::Upload),
            0x44 => Ok(Self::Download),
            other => Err(Error::unknown_mode(other)),
        }
    }
}

impl fmt::Display for StreamMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Communication => "communication",
            Self::Upload => "upload",
            Self::Download => "download",
        };
        f.write_str(name)
    }
}

// ============================================================================
// DownloadOp
// ============================================================================

/// What a download request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DownloadOp {
    /// `D`: the payload bytes.
    Data = 0x44,
    /// `L`: the payload length as a big-endian `i64`.
    Length = 0x4C,
}

impl DownloadOp {
    /// Returns the wire byte.
    #[inline]
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for DownloadOp {
    type Error = Error;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0x44 => Ok(Self::Data),
            0x4C => Ok(Self::Length),
            other => Err(Error::protocol(format!(
                "unknown download operation: 0x{other:02X}"
            ))),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
