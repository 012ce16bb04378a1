//! Server lifecycle management
//!
//! Manages the startup and shutdown of the server components:
//! - gRPC transfer server
//! - HTTP/WebSocket server

use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use clipstream_core::messaging::ConnectionRegistry;
use clipstream_core::storage::MediaStore;
use clipstream_core::Config;

/// Container for shared services
#[derive(Clone)]
pub struct Services {
    pub store: MediaStore,
    pub registry: ConnectionRegistry,
}

/// Clipstream server, manages all server components
pub struct ClipstreamServer {
    config: Config,
    services: Services,
}

impl ClipstreamServer {
    /// Create a new server instance
    pub const fn new(config: Config, services: Services) -> Self {
        Self { config, services }
    }

    /// Start all servers and wait for a shutdown signal
    pub async fn start(self) -> anyhow::Result<()> {
        info!("Starting Clipstream server...");

        // Create shutdown signal channel
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let grpc_handle = self.start_grpc_server(shutdown_rx.clone());
        let http_handle = self.start_http_server(shutdown_rx);

        info!("All servers started successfully");

        tokio::select! {
            _ = grpc_handle => {
                error!("gRPC server stopped unexpectedly");
            }
            _ = http_handle => {
                error!("HTTP server stopped unexpectedly");
            }
            () = shutdown_signal() => {
                info!("Shutdown signal received, starting graceful shutdown...");
            }
        }

        // Signal all components to shut down
        let _ = shutdown_tx.send(true);

        // Run graceful shutdown
        self.shutdown().await;

        Ok(())
    }

    /// Gracefully shut down, waiting for live connections to drain
    async fn shutdown(&self) {
        info!("Shutting down Clipstream server...");

        let drain_timeout = Duration::from_secs(30);
        let drain_poll_interval = Duration::from_millis(500);
        let active = self.services.registry.connection_count();
        if active > 0 {
            info!(
                "Waiting up to {}s for {} active connection(s) to drain...",
                drain_timeout.as_secs(),
                active
            );
            let deadline = tokio::time::Instant::now() + drain_timeout;
            loop {
                let remaining = self.services.registry.connection_count();
                if remaining == 0 {
                    info!("All connections drained");
                    break;
                }
                if tokio::time::Instant::now() >= deadline {
                    warn!(
                        "Drain timeout reached with {} connection(s) still active, proceeding with shutdown",
                        remaining
                    );
                    break;
                }
                tokio::time::sleep(drain_poll_interval).await;
            }
        }

        info!("Clipstream server shut down complete");
    }

    /// Start the gRPC server in a background task
    fn start_grpc_server(&self, shutdown_rx: watch::Receiver<bool>) -> JoinHandle<()> {
        let config = self.config.clone();
        let store = self.services.store.clone();

        tokio::spawn(async move {
            info!("Starting gRPC server on {}...", config.grpc_address());
            if let Err(e) = clipstream_api::grpc::serve(&config, store, shutdown_rx).await {
                error!("gRPC server error: {}", e);
            }
        })
    }

    /// Start the HTTP server with graceful shutdown support
    fn start_http_server(&self, shutdown_rx: watch::Receiver<bool>) -> JoinHandle<()> {
        let http_address = self.config.http_address();
        let http_router =
            clipstream_api::http::create_router(&self.config, self.services.registry.clone());

        tokio::spawn(async move {
            let http_addr: std::net::SocketAddr = match http_address.parse() {
                Ok(addr) => addr,
                Err(e) => {
                    error!("Invalid HTTP address '{}': {}", http_address, e);
                    return;
                }
            };

            let listener = match tokio::net::TcpListener::bind(http_addr).await {
                Ok(listener) => listener,
                Err(e) => {
                    error!("Failed to bind HTTP address {}: {}", http_addr, e);
                    return;
                }
            };

            info!("HTTP server listening on {}", http_addr);

            let mut rx = shutdown_rx;
            let graceful = async move {
                let _ = rx.changed().await;
            };

            if let Err(e) = axum::serve(listener, http_router)
                .with_graceful_shutdown(graceful)
                .await
            {
                error!("HTTP server error: {}", e);
            }

            info!("HTTP server shut down gracefully");
        })
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT/Ctrl+C)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("Received Ctrl+C"); }
        () = terminate => { info!("Received SIGTERM"); }
    }
}
