//! `NightfallServer` builder and accept loop.
//!
//! This is the entry point for running a Nightfall server. It ties the
//! layers together: WebSocket → protocol frames → [`MafiaService`] →
//! lobby and game sessions.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use nightfall_game::{GameConfig, LogResultSink, ResultSink};
use tokio::net::TcpListener;

use crate::handler::handle_connection;
use crate::{MafiaService, NightfallError};

/// Counter for connection ids in logs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Settings collected by [`NightfallServerBuilder`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on, e.g. `0.0.0.0:50051`.
    pub bind_addr: String,
    /// Applied to every game session.
    pub game: GameConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:50051".to_string(),
            game: GameConfig::default(),
        }
    }
}

/// Builder for configuring and starting a Nightfall server.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use nightfall::prelude::*;
///
/// # async fn run() -> Result<(), NightfallError> {
/// let server = NightfallServer::builder()
///     .bind("0.0.0.0:50051")
///     .game_config(GameConfig::with_round_timeout(Duration::from_secs(120)))
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct NightfallServerBuilder {
    config: ServerConfig,
    results: Arc<dyn ResultSink>,
}

impl NightfallServerBuilder {
    /// Creates a builder with default settings and a logging result sink.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            results: Arc::new(LogResultSink),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets the configuration for every game session.
    pub fn game_config(mut self, config: GameConfig) -> Self {
        self.config.game = config;
        self
    }

    /// Sets where finished games are reported.
    pub fn result_sink(mut self, sink: impl ResultSink) -> Self {
        self.results = Arc::new(sink);
        self
    }

    /// Binds the listener and builds the server.
    pub async fn build(self) -> Result<NightfallServer, NightfallError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "listening");

        let service = Arc::new(MafiaService::new(self.config.game.clone(), self.results));

        Ok(NightfallServer {
            listener,
            config: self.config,
            service,
        })
    }
}

impl Default for NightfallServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Nightfall server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct NightfallServer {
    listener: TcpListener,
    config: ServerConfig,
    service: Arc<MafiaService>,
}

impl NightfallServer {
    /// Creates a new builder.
    pub fn builder() -> NightfallServerBuilder {
        NightfallServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The shared service, for inspecting lobby and registry state.
    pub fn service(&self) -> Arc<MafiaService> {
        Arc::clone(&self.service)
    }

    /// Runs the accept loop until the process is terminated.
    ///
    /// Each accepted socket gets its own task for the WebSocket handshake
    /// and the connection's lifetime.
    pub async fn run(self) -> Result<(), NightfallError> {
        tracing::info!("Nightfall server running");

        loop {
            let (stream, addr) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                    continue;
                }
            };

            let conn_id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
            let service = Arc::clone(&self.service);

            tokio::spawn(async move {
                let ws = match tokio_tungstenite::accept_async(stream).await {
                    Ok(ws) => ws,
                    Err(e) => {
                        tracing::debug!(conn_id, %addr, error = %e, "websocket handshake failed");
                        return;
                    }
                };
                tracing::debug!(conn_id, %addr, "accepted connection");

                if let Err(e) = handle_connection(ws, service, conn_id).await {
                    tracing::debug!(conn_id, error = %e, "connection ended with error");
                }
            });
        }
    }
}
