//! Error types for the RPC socket transport.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use netsocket_rpc::{NetSocketConnection, Result, SessionId};
//!
//! fn example(connection: &NetSocketConnection) -> Result<()> {
//!     connection.open(SessionId::generate())?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Connect | [`Error::Connection`], [`Error::ConnectionTimeout`], [`Error::ConnectionClosed`] |
//! | Lifecycle | [`Error::InvalidState`], [`Error::NotConnected`] |
//! | Transfer | [`Error::Transfer`] |
//! | Protocol | [`Error::Protocol`], [`Error::UnknownMode`] |
//! | Engine | [`Error::Handler`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::Http`], [`Error::ChannelClosed`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::{Error as IoError, ErrorKind};
use std::result::Result as StdResult;

use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when options or command-line properties are invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Connect failed.
    ///
    /// Returned when the dialer reports a failure for the primary socket.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// No usable socket within the bounded open wait.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Socket closed while an operation still needed it.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Operation requires an open primary socket.
    #[error("Not connected")]
    NotConnected,

    /// Operation not allowed in the current lifecycle state.
    #[error("Cannot {operation} while {state}")]
    InvalidState {
        /// Operation that was attempted.
        operation: &'static str,
        /// State the connection was in.
        state: String,
    },

    // ========================================================================
    // Transfer Errors
    // ========================================================================
    /// Transfer socket could not be established or the exchange failed.
    ///
    /// The transfer socket is always torn down before this is returned.
    #[error("Transfer failed: {message}")]
    Transfer {
        /// Description of the transfer failure.
        message: String,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Malformed frame or unexpected wire content.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// Leading mode byte does not select a known sub-protocol.
    #[error("Unknown stream mode: 0x{byte:02X}")]
    UnknownMode {
        /// The byte that was received.
        byte: u8,
    },

    // ========================================================================
    // Engine Errors
    // ========================================================================
    /// The RPC engine failed while processing a call.
    #[error("Handler fault: {message}")]
    Handler {
        /// Error reported by the engine.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON (configuration file) error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP connection error.
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    /// Channel receive error.
    #[error("Channel closed")]
    ChannelClosed(#[from] RecvError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates an invalid state error.
    #[inline]
    pub fn invalid_state(operation: &'static str, state: impl ToString) -> Self {
        Self::InvalidState {
            operation,
            state: state.to_string(),
        }
    }

    /// Creates a transfer error.
    #[inline]
    pub fn transfer(message: impl Into<String>) -> Self {
        Self::Transfer {
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates an unknown mode error.
    #[inline]
    pub fn unknown_mode(byte: u8) -> Self {
        Self::UnknownMode { byte }
    }

    /// Creates a handler fault.
    #[inline]
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ConnectionTimeout { .. })
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionTimeout { .. }
                | Self::ConnectionClosed
                | Self::NotConnected
        )
    }

    /// Returns `true` if this error came from malformed wire data.
    ///
    /// Truncated or corrupt compressed bodies surface as I/O errors and are
    /// included here.
    #[inline]
    #[must_use]
    pub fn is_protocol_error(&self) -> bool {
        match self {
            Self::Protocol { .. } | Self::UnknownMode { .. } => true,
            Self::Io(err) => matches!(
                err.kind(),
                ErrorKind::UnexpectedEof | ErrorKind::InvalidData | ErrorKind::InvalidInput
            ),
            _ => false,
        }
    }
}

// ============================================================================
// Conversions
// ============================================================================

impl From<Error> for IoError {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(io) => io,
            Error::ConnectionClosed | Error::NotConnected => {
                IoError::new(ErrorKind::NotConnected, err.to_string())
            }
            Error::ConnectionTimeout { .. } => IoError::new(ErrorKind::TimedOut, err.to_string()),
            other => IoError::other(other.to_string()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
