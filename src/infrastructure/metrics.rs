use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Process-wide counters, reported periodically while the server runs.
#[derive(Debug, Default)]
pub struct ServerMetrics {
    pub connections_accepted: AtomicU64,
    pub connections_closed: AtomicU64,
    pub requests_succeeded: AtomicU64,
    pub requests_failed: AtomicU64,
    pub parse_errors: AtomicU64,
}

impl ServerMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_accept(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_close(&self) {
        self.connections_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self) {
        self.requests_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.requests_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_parse_error(&self) {
        self.parse_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Spawns a task that logs a summary line at a fixed interval until
    /// the server shuts down.
    pub fn spawn_reporter(
        self: &Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let metrics = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick fires immediately, skip it
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let accepted = metrics.connections_accepted.load(Ordering::Relaxed);
                        let closed = metrics.connections_closed.load(Ordering::Relaxed);
                        let ok = metrics.requests_succeeded.load(Ordering::Relaxed);
                        let failed = metrics.requests_failed.load(Ordering::Relaxed);
                        let unparsed = metrics.parse_errors.load(Ordering::Relaxed);
                        info!(
                            "Server metrics - connections: {} accepted / {} closed, requests: {} ok / {} failed, parse errors: {}",
                            accepted, closed, ok, failed, unparsed
                        );
                    }
                }
            }
        })
    }
}
