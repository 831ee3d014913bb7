//! Server listener options.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default socket server port.
pub const DEFAULT_SOCKET_PORT: u16 = 8888;

/// Default HTTP server port.
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Default interface for both servers.
pub const DEFAULT_INTERFACE: &str = "localhost";

// ============================================================================
// ServerOptions
// ============================================================================

/// Options for [`NetSocketServer`](crate::server::NetSocketServer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerOptions {
    /// Interface to bind.
    pub interface: String,

    /// Port to bind; 0 picks a free port.
    pub port: u16,

    /// Set `TCP_NODELAY` on accepted sockets.
    pub tcp_nodelay: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            interface: DEFAULT_INTERFACE.to_string(),
            port: DEFAULT_SOCKET_PORT,
            tcp_nodelay: true,
        }
    }
}

impl ServerOptions {
    /// Sets the interface.
    #[inline]
    #[must_use]
    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = interface.into();
        self
    }

    /// Sets the port.
    #[inline]
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Validates the options.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] for an empty interface.
    pub fn validate(&self) -> Result<()> {
        if self.interface.trim().is_empty() {
            return Err(Error::config("interface must not be empty"));
        }
        Ok(())
    }
}

// ============================================================================
// HttpOptions
// ============================================================================

/// Options for [`HttpServer`](crate::server::HttpServer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpOptions {
    /// Interface to bind.
    pub interface: String,

    /// Port to bind; 0 picks a free port.
    pub port: u16,

    /// Path of the RPC service endpoint.
    pub service_path: String,

    /// Path of the upload endpoint.
    pub upload_path: String,

    /// Path of the download endpoint.
    pub download_path: String,

    /// Stream every RPC response with chunked encoding.
    ///
    /// When off, the engine opts in per response by setting
    /// `Transfer-Encoding: chunked`.
    pub chunked_responses: bool,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            interface: DEFAULT_INTERFACE.to_string(),
            port: DEFAULT_HTTP_PORT,
            service_path: "/services/Server".to_string(),
            upload_path: "/services/Upload".to_string(),
            download_path: "/services/Download".to_string(),
            chunked_responses: false,
        }
    }
}

impl HttpOptions {
    /// Sets the interface.
    #[inline]
    #[must_use]
    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = interface.into();
        self
    }

    /// Sets the port.
    #[inline]
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Streams every RPC response with chunked encoding.
    #[inline]
    #[must_use]
    pub fn with_chunked_responses(mut self) -> Self {
        self.chunked_responses = true;
        self
    }

    /// Validates the options.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] for an empty interface, a path without a leading
    /// `/` or two endpoints sharing a path.
    pub fn validate(&self) -> Result<()> {
        if self.interface.trim().is_empty() {
            return Err(Error::config("interface must not be empty"));
        }

        let paths = [&self.service_path, &self.upload_path, &self.download_path];
        if let Some(bad) = paths.iter().find(|p| !p.starts_with('/')) {
            return Err(Error::config(format!("path must start with '/': {bad}")));
        }
        if paths[0] == paths[1] || paths[0] == paths[2] || paths[1] == paths[2] {
            return Err(Error::config("endpoint paths must be distinct"));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_defaults() {
        let options = ServerOptions::default();
        assert_eq!(options.interface, "localhost");
        assert_eq!(options.port, 8888);
        assert!(options.tcp_nodelay);
    }

    #[test]
    fn test_http_defaults() {
        let options = HttpOptions::default();
        assert_eq!(options.port, 8080);
        assert_eq!(options.service_path, "/services/Server");
        assert_eq!(options.upload_path, "/services/Upload");
        assert_eq!(options.download_path, "/services/Download");
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_http_validate_rejects_bad_paths() {
        let mut options = HttpOptions::default();
        options.upload_path = "upload".to_string();
        assert!(options.validate().is_err());

        let mut options = HttpOptions::default();
        options.download_path = options.service_path.clone();
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_builders() {
        let options = ServerOptions::default()
            .with_interface("0.0.0.0")
            .with_port(0);
        assert_eq!(options.interface, "0.0.0.0");
        assert_eq!(options.port, 0);

        let http = HttpOptions::default().with_port(0).with_chunked_responses();
        assert!(http.chunked_responses);
    }
}
