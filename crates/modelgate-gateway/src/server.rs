//! HTTP server wiring.

use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Build the router with every endpoint wired to shared state
#[must_use]
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/generate", post(handlers::generate))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Server error type
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to address
    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        /// The address that could not be bound
        addr: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },
    /// Server error during operation
    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),
    /// The configured host/port is not a valid socket address
    #[error("Invalid listen address '{addr}'")]
    InvalidAddr {
        /// The address string that failed to parse
        addr: String,
    },
}

/// HTTP server for the gateway
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a new server over prepared state
    #[must_use]
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Run until Ctrl+C or SIGTERM
    ///
    /// # Errors
    /// Returns error if the server fails to bind or serve
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(shutdown_signal()).await
    }

    /// Run with a custom shutdown signal
    ///
    /// # Errors
    /// Returns error if the server fails to bind or serve
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let server_config = self.state.config.load().server.clone();
        let addr: SocketAddr =
            server_config
                .socket_addr()
                .parse()
                .map_err(|_| ServerError::InvalidAddr {
                    addr: server_config.socket_addr(),
                })?;
        let router = create_router(self.state);

        let listener = TcpListener::bind(addr).await.map_err(|source| ServerError::Bind {
            addr: addr.to_string(),
            source,
        })?;

        info!(address = %addr, "Server listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Server shutdown complete");

        Ok(())
    }
}

/// Shutdown signal handler
///
/// # Panics
/// Panics if signal handlers cannot be installed (should not happen on supported platforms)
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        () = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
