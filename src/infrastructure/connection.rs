//! Per-connection worker.
//!
//! Each accepted socket gets one tokio task running `ConnectionWorker::run`.
//! The loop reads one line, dispatches it, writes one response, and keeps
//! strict request/response alternation. Reads wait with a bounded timeout
//! so the worker notices server shutdown promptly even on an idle socket.

use crate::application::Dispatcher;
use crate::domain::AccountId;
use crate::infrastructure::metrics::ServerMetrics;
use crate::infrastructure::protocol::{Request, Response};
use dashmap::DashMap;
use futures::StreamExt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

/// Upper bound on one protocol line; anything longer is a fault, not a
/// request.
const MAX_LINE_LENGTH: usize = 8 * 1024;

/// Removes the connection from the server's live set on drop, so
/// deregistration happens exactly once on every exit path, panics
/// included.
pub struct ConnectionGuard {
    id: Uuid,
    registry: Arc<DashMap<Uuid, SocketAddr>>,
    metrics: Arc<ServerMetrics>,
}

impl ConnectionGuard {
    pub fn register(
        id: Uuid,
        peer: SocketAddr,
        registry: Arc<DashMap<Uuid, SocketAddr>>,
        metrics: Arc<ServerMetrics>,
    ) -> Self {
        registry.insert(id, peer);
        metrics.record_accept();
        Self {
            id,
            registry,
            metrics,
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.registry.remove(&self.id);
        self.metrics.record_close();
    }
}

pub struct ConnectionWorker {
    id: Uuid,
    peer: SocketAddr,
    dispatcher: Arc<Dispatcher>,
    shutdown: CancellationToken,
    idle_poll_interval: Duration,
    session: Option<AccountId>,
}

impl ConnectionWorker {
    pub fn new(
        id: Uuid,
        peer: SocketAddr,
        dispatcher: Arc<Dispatcher>,
        shutdown: CancellationToken,
        idle_poll_interval: Duration,
    ) -> Self {
        Self {
            id,
            peer,
            dispatcher,
            shutdown,
            idle_poll_interval,
            session: None,
        }
    }

    /// Runs the connection to completion. Returns when the peer closes,
    /// on a socket error, or on server shutdown; the guard held by the
    /// caller's task handles deregistration.
    pub async fn run(mut self, stream: TcpStream) {
        info!("Novo cliente conectado: {} ({})", self.peer, self.id);

        let (read_half, mut write_half) = stream.into_split();
        // A framed reader keeps partial lines buffered across timeouts,
        // so the idle poll never drops bytes of a split frame.
        let mut frames = FramedRead::new(
            read_half,
            LinesCodec::new_with_max_length(MAX_LINE_LENGTH),
        );

        loop {
            let next = tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Encerrando conexão {} por desligamento do servidor", self.id);
                    break;
                }
                next = timeout(self.idle_poll_interval, frames.next()) => next,
            };

            match next {
                // Idle poll elapsed with no data: not an error, go back
                // to waiting while the server is still available.
                Err(_elapsed) => continue,
                Ok(None) => {
                    info!("Cliente desconectado: {} ({})", self.peer, self.id);
                    break;
                }
                Ok(Some(Ok(message))) => {
                    let response = self.dispatcher.dispatch_line(&message);
                    self.track_login(&message, &response);

                    let mut frame = response.encode();
                    frame.push('\n');
                    if let Err(err) = write_half.write_all(frame.as_bytes()).await {
                        warn!("Falha de escrita na conexão {}: {}", self.id, err);
                        break;
                    }
                }
                Ok(Some(Err(err))) => {
                    warn!("Falha de leitura na conexão {}: {}", self.id, err);
                    break;
                }
            }
        }
    }

    // Session id is log context only; every operation re-checks account
    // existence on its own.
    fn track_login(&mut self, message: &str, response: &Response) {
        if self.session.is_some() || !matches!(response, Response::Success(_)) {
            return;
        }
        if let Ok(Request::Login { id }) = Request::decode(message) {
            info!("Cliente {} autenticado na conexão {}", id, self.id);
            self.session = Some(id);
        }
    }
}
