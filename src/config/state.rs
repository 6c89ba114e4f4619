// Application state module
// Shared, read-mostly state handed to every connection

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

use super::types::Config;
use crate::routing::Router;

/// Application state
pub struct AppState {
    pub config: Config,
    /// Route table, immutable once the server starts
    pub router: Arc<Router>,
    /// Open connections
    active_connections: AtomicUsize,
    /// Flips to `true` once when the process should stop serving
    shutdown: watch::Sender<bool>,
}

impl AppState {
    pub fn new(config: Config, router: Router) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            router: Arc::new(router),
            active_connections: AtomicUsize::new(0),
            shutdown,
        }
    }

    pub const fn access_log_enabled(&self) -> bool {
        self.config.logging.access_log
    }

    /// Reserve a connection slot
    ///
    /// Returns `None` (and leaves the count untouched) when the configured
    /// `max_connections` is already reached. The slot is released when the
    /// guard is dropped.
    pub fn try_acquire_connection(self: &Arc<Self>) -> Option<ConnectionGuard> {
        // Increment first, then check the limit, so concurrent accepts cannot overshoot
        let prev = self.active_connections.fetch_add(1, Ordering::SeqCst);
        if let Some(max) = self.config.performance.max_connections {
            if prev >= usize::try_from(max).unwrap_or(usize::MAX) {
                self.active_connections.fetch_sub(1, Ordering::SeqCst);
                return None;
            }
        }
        Some(ConnectionGuard {
            state: Arc::clone(self),
        })
    }

    pub fn connection_count(&self) -> usize {
        self.active_connections.load(Ordering::SeqCst)
    }

    pub fn request_shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    #[cfg(test)]
    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Resolves once shutdown has been requested
    pub fn shutdown_requested(&self) -> impl std::future::Future<Output = ()> + Send + 'static {
        let mut rx = self.shutdown.subscribe();
        async move {
            let _ = rx.wait_for(|stop| *stop).await;
        }
    }
}

/// Holds one slot of the connection counter
pub struct ConnectionGuard {
    state: Arc<AppState>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.state.active_connections.fetch_sub(1, Ordering::SeqCst);
    }
}
