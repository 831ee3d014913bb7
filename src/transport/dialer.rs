//! Outbound connect strategy.
//!
//! The client never retries on its own; reconnect attempts are the
//! dialer's business. [`TcpDialer`] implements the bounded policy in
//! [`ReconnectPolicy`]; tests substitute their own [`Dialer`].

// ============================================================================
// Imports
// ============================================================================

use std::io::{self, ErrorKind};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

// ============================================================================
// Stream Types
// ============================================================================

/// Byte stream a dialer can produce.
pub trait AsyncStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> AsyncStream for T {}

/// Type-erased dialed stream.
pub type BoxedStream = Box<dyn AsyncStream>;

// ============================================================================
// Dialer
// ============================================================================

/// Opens byte streams to a remote endpoint.
#[async_trait]
pub trait Dialer: Send + Sync + 'static {
    /// Connects to `host:port`, applying whatever retry policy the dialer
    /// implements.
    async fn dial(&self, host: &str, port: u16) -> io::Result<BoxedStream>;
}

// ============================================================================
// ReconnectPolicy
// ============================================================================

/// Bounded reconnect policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Extra attempts after the first one fails.
    pub attempts: u32,
    /// Pause between attempts.
    pub interval: Duration,
    /// Limit for a single connect attempt.
    pub connect_timeout: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            interval: Duration::from_millis(1000),
            connect_timeout: Duration::from_millis(5000),
        }
    }
}

// ============================================================================
// TcpDialer
// ============================================================================

/// Plain TCP dialer with `TCP_NODELAY` set on every stream.
#[derive(Debug, Clone, Default)]
pub struct TcpDialer {
    policy: ReconnectPolicy,
}

impl TcpDialer {
    /// Creates a dialer using `policy`.
    #[must_use]
    pub const fn new(policy: ReconnectPolicy) -> Self {
        Self { policy }
    }

    /// Returns the reconnect policy.
    #[inline]
    #[must_use]
    pub const fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    async fn connect_once(&self, host: &str, port: u16) -> io::Result<TcpStream> {
        let stream = timeout(self.policy.connect_timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| {
                io::Error::new(
                    ErrorKind::TimedOut,
                    format!(
                        "connect to {host}:{port} timed out after {}ms",
                        self.policy.connect_timeout.as_millis()
                    ),
                )
            })??;

        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

#[async_trait]
impl Dialer for TcpDialer {
    async fn dial(&self, host: &str, port: u16) -> io::Result<BoxedStream> {
        let mut attempt = 0;

        loop {
            match self.connect_once(host, port).await {
                Ok(stream) => {
                    debug!(host, port, attempt, "Connected");
                    return Ok(Box::new(stream));
                }

                Err(e) if attempt < self.policy.attempts => {
                    warn!(host, port, attempt, error = %e, "Connect failed, retrying");
                    attempt += 1;
                    sleep(self.policy.interval).await;
                }

                Err(e) => {
                    warn!(host, port, attempt, error = %e, "Connect failed, giving up");
                    return Err(e);
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Instant;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn test_default_policy() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.attempts, 3);
        assert_eq!(policy.interval, Duration::from_millis(1000));
        assert_eq!(policy.connect_timeout, Duration::from_millis(5000));
    }

    #[tokio::test]
    async fn test_dial_connects() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();

        let accept = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let mut buf = [0u8; 2];
            socket.read_exact(&mut buf).await.expect("read");
            buf
        });

        let mut stream = TcpDialer::default()
            .dial("127.0.0.1", port)
            .await
            .expect("dial");
        stream.write_all(b"hi").await.expect("write");

        assert_eq!(&accept.await.expect("join"), b"hi");
    }

    #[tokio::test]
    async fn test_dial_gives_up_after_attempts() {
        // Bind then drop to get a port nobody listens on.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
            listener.local_addr().expect("addr").port()
        };

        let dialer = TcpDialer::new(ReconnectPolicy {
            attempts: 2,
            interval: Duration::from_millis(20),
            connect_timeout: Duration::from_millis(500),
        });

        let started = Instant::now();
        let result = dialer.dial("127.0.0.1", port).await;
        assert!(result.is_err());
        // Two pauses between three attempts.
        assert!(started.elapsed() >= Duration::from_millis(40));
    }
}
