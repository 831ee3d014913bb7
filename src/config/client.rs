//! Client connection options.
//!
//! # Example
//!
//! ```ignore
//! use netsocket_rpc::ClientOptions;
//!
//! let options = ClientOptions::new("localhost", 8888)
//!     .with_open_timeout_ms(5_000)
//!     .with_reconnect_attempts(0);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::transport::ReconnectPolicy;

// ============================================================================
// Constants
// ============================================================================

/// Default server port.
pub const DEFAULT_PORT: u16 = 8888;

/// Default single connect attempt limit.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5000;

/// Default extra connect attempts.
pub const DEFAULT_RECONNECT_ATTEMPTS: u32 = 3;

/// Default pause between connect attempts.
pub const DEFAULT_RECONNECT_INTERVAL_MS: u64 = 1000;

/// Default bound on `open`.
pub const DEFAULT_OPEN_TIMEOUT_MS: u64 = 15000;

// ============================================================================
// ClientOptions
// ============================================================================

/// Options for a [`NetSocketConnection`](crate::client::NetSocketConnection).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    /// Server host name or address.
    pub host: String,

    /// Server port.
    pub port: u16,

    /// Limit for a single connect attempt.
    pub connect_timeout_ms: u64,

    /// Extra connect attempts made by the dialer after a failure.
    pub reconnect_attempts: u32,

    /// Pause between connect attempts.
    pub reconnect_interval_ms: u64,

    /// Upper bound on how long `open` waits for a usable socket.
    pub open_timeout_ms: u64,

    /// Check the sentinel after a download's data reply.
    ///
    /// Off by default: the transfer socket is discarded right after the
    /// data has been read.
    pub verify_download_sentinel: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            reconnect_attempts: DEFAULT_RECONNECT_ATTEMPTS,
            reconnect_interval_ms: DEFAULT_RECONNECT_INTERVAL_MS,
            open_timeout_ms: DEFAULT_OPEN_TIMEOUT_MS,
            verify_download_sentinel: false,
        }
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl ClientOptions {
    /// Creates options for `host:port` with default timeouts.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ClientOptions {
    /// Sets the single connect attempt limit.
    #[inline]
    #[must_use]
    pub fn with_connect_timeout_ms(mut self, millis: u64) -> Self {
        self.connect_timeout_ms = millis;
        self
    }

    /// Sets the number of extra connect attempts.
    #[inline]
    #[must_use]
    pub fn with_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.reconnect_attempts = attempts;
        self
    }

    /// Sets the pause between connect attempts.
    #[inline]
    #[must_use]
    pub fn with_reconnect_interval_ms(mut self, millis: u64) -> Self {
        self.reconnect_interval_ms = millis;
        self
    }

    /// Sets the bound on `open`.
    #[inline]
    #[must_use]
    pub fn with_open_timeout_ms(mut self, millis: u64) -> Self {
        self.open_timeout_ms = millis;
        self
    }

    /// Enables sentinel verification on download data replies.
    #[inline]
    #[must_use]
    pub fn with_verified_downloads(mut self) -> Self {
        self.verify_download_sentinel = true;
        self
    }
}

// ============================================================================
// Conversion Methods
// ============================================================================

impl ClientOptions {
    /// Returns the dialer policy described by these options.
    #[must_use]
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            attempts: self.reconnect_attempts,
            interval: Duration::from_millis(self.reconnect_interval_ms),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
        }
    }

    /// Returns the bound on `open`.
    #[inline]
    #[must_use]
    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }

    /// Validates the options.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] for an empty host, port 0 or a zero open timeout.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::config("host must not be empty"));
        }
        if self.port == 0 {
            return Err(Error::config("port must be greater than zero"));
        }
        if self.open_timeout_ms == 0 {
            return Err(Error::config("open timeout must be greater than zero"));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
