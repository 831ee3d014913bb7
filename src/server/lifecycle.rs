//! Start/stop bookkeeping shared by both servers.

// ============================================================================
// Imports
// ============================================================================

use std::net::SocketAddr;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::error::{Error, Result};

// ============================================================================
// Lifecycle
// ============================================================================

/// Tracks whether a server was started and whether it was stopped.
///
/// Stopping is terminal; a stopped server cannot be started again.
#[derive(Debug)]
pub(crate) struct Lifecycle {
    bound: Mutex<Option<SocketAddr>>,
    stopped: watch::Sender<bool>,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        let (stopped, _) = watch::channel(false);
        Self {
            bound: Mutex::new(None),
            stopped,
        }
    }

    /// Fails unless the server is neither running nor stopped.
    pub(crate) fn ensure_startable(&self) -> Result<()> {
        if self.is_stopped() {
            return Err(Error::invalid_state("start", "stopped"));
        }
        if self.bound.lock().is_some() {
            return Err(Error::invalid_state("start", "running"));
        }
        Ok(())
    }

    /// Records the bound address.
    pub(crate) fn started(&self, addr: SocketAddr) {
        *self.bound.lock() = Some(addr);
    }

    /// Returns the bound address once started.
    pub(crate) fn local_addr(&self) -> Option<SocketAddr> {
        *self.bound.lock()
    }

    /// Marks the server stopped. Returns `false` if it already was.
    pub(crate) fn stop(&self) -> bool {
        !self.stopped.send_replace(true)
    }

    pub(crate) fn is_stopped(&self) -> bool {
        *self.stopped.borrow()
    }

    /// Receiver for accept loops and connection tasks.
    pub(crate) fn subscribe(&self) -> watch::Receiver<bool> {
        self.stopped.subscribe()
    }

    /// Resolves once [`stop`](Self::stop) was called.
    pub(crate) async fn wait(&self) {
        stopped(&mut self.subscribe()).await;
    }
}

/// Resolves once the watched flag is set.
///
/// The borrow of the watched value ends here, so callers may await further.
pub(crate) async fn stopped(receiver: &mut watch::Receiver<bool>) {
    let _ = receiver.wait_for(|stopped| *stopped).await;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use tokio_test::{assert_pending, assert_ready, task};

    #[test]
    fn test_start_twice_rejected() {
        let lifecycle = Lifecycle::new();
        lifecycle.ensure_startable().expect("fresh");
        lifecycle.started("127.0.0.1:1".parse().expect("addr"));
        assert!(matches!(
            lifecycle.ensure_startable(),
            Err(Error::InvalidState { .. })
        ));
    }

    #[test]
    fn test_stop_is_terminal_and_idempotent() {
        let lifecycle = Lifecycle::new();
        assert!(lifecycle.stop());
        assert!(!lifecycle.stop());
        assert!(lifecycle.is_stopped());
        assert!(lifecycle.ensure_startable().is_err());
    }

    #[test]
    fn test_wait_woken_by_stop() {
        let lifecycle = Lifecycle::new();
        let mut wait = task::spawn(lifecycle.wait());

        assert_pending!(wait.poll());
        lifecycle.stop();
        assert!(wait.is_woken());
        assert_ready!(wait.poll());
    }

    #[tokio::test]
    async fn test_wait_after_stop_resolves_immediately() {
        let lifecycle = Lifecycle::new();
        lifecycle.stop();
        tokio::time::timeout(Duration::from_millis(100), lifecycle.wait())
            .await
            .expect("resolved");
    }
}
