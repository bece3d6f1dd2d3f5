//! TCP server: bind, accept, spawn workers, shut down.

use crate::application::Dispatcher;
use crate::config::AppConfig;
use crate::infrastructure::connection::{ConnectionGuard, ConnectionWorker};
use crate::infrastructure::metrics::ServerMetrics;
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

/// Cloneable control surface for a running server.
#[derive(Clone)]
pub struct ServerHandle {
    shutdown: CancellationToken,
    connections: Arc<DashMap<Uuid, SocketAddr>>,
}

impl ServerHandle {
    /// Marks the server unavailable and closes every live connection.
    /// Safe to call more than once; only the first call has any effect.
    pub fn shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            info!("Encerrando servidor");
            self.shutdown.cancel();
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("port {0} is already in use")]
    PortInUse(u16),
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct Server {
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
    metrics: Arc<ServerMetrics>,
    connections: Arc<DashMap<Uuid, SocketAddr>>,
    shutdown: CancellationToken,
    idle_poll_interval: Duration,
}

impl Server {
    /// Binds the listening socket. A port already in use is fatal here;
    /// the caller is expected to exit.
    pub async fn bind(
        config: &AppConfig,
        dispatcher: Arc<Dispatcher>,
        metrics: Arc<ServerMetrics>,
    ) -> Result<Self, ServerError> {
        let addr = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind(&addr).await.map_err(|err| {
            if err.kind() == std::io::ErrorKind::AddrInUse {
                ServerError::PortInUse(config.port)
            } else {
                ServerError::Io(err)
            }
        })?;
        info!("Servidor iniciado em {}", listener.local_addr()?);

        Ok(Self {
            listener,
            dispatcher,
            metrics,
            connections: Arc::new(DashMap::new()),
            shutdown: CancellationToken::new(),
            idle_poll_interval: config.idle_poll_interval,
        })
    }

    /// The bound address; useful when the configured port is 0.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Token observed by the accept loop and every worker.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Control surface that stays valid after `run` consumes the server.
    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            shutdown: self.shutdown.clone(),
            connections: Arc::clone(&self.connections),
        }
    }

    /// Accepts connections until shutdown, then waits for the workers to
    /// drain before releasing the listening socket.
    pub async fn run(self) -> Result<(), ServerError> {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => self.spawn_worker(stream, peer),
                        Err(err) => {
                            // Transient accept failures (e.g. EMFILE) must
                            // not kill the server.
                            error!("Falha ao aceitar conexão: {}", err);
                        }
                    }
                }
            }
        }

        self.drain_connections().await;
        info!("Servidor encerrado");
        Ok(())
    }

    fn spawn_worker(&self, stream: tokio::net::TcpStream, peer: SocketAddr) {
        let id = Uuid::new_v4();
        let guard = ConnectionGuard::register(
            id,
            peer,
            Arc::clone(&self.connections),
            Arc::clone(&self.metrics),
        );
        let worker = ConnectionWorker::new(
            id,
            peer,
            Arc::clone(&self.dispatcher),
            self.shutdown.clone(),
            self.idle_poll_interval,
        );
        tokio::spawn(async move {
            let _guard = guard;
            worker.run(stream).await;
        });
    }

    /// Workers notice the cancelled token within one idle-poll interval;
    /// give them that long plus a margin, then stop waiting.
    async fn drain_connections(&self) {
        let deadline = tokio::time::Instant::now() + self.idle_poll_interval + Duration::from_secs(1);
        while !self.connections.is_empty() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        let remaining = self.connections.len();
        if remaining > 0 {
            error!("{} conexões não encerraram dentro do prazo", remaining);
        }
    }
}
