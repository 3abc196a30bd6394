//! Liveness HTTP server
//!
//! Lets hosting platforms check that the process is up. It exposes no
//! monitoring data.
//!
//! ## Endpoints
//!
//! - `GET /` - Text banner with the current time
//! - `GET /health` - Plain `OK`

use std::net::SocketAddr;

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::DEFAULT_PORT;

pub mod routes;

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Bind address (e.g., "0.0.0.0:8080")
    pub bind_addr: SocketAddr,
}

impl ApiConfig {
    /// Listen on all interfaces at `port`
    pub fn with_port(port: u16) -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], port)),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self::with_port(DEFAULT_PORT)
    }
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(routes::health::banner))
        .route("/health", get(routes::health::health_check))
        .layer(TraceLayer::new_for_http())
}

/// Spawn the liveness server
///
/// Binds before returning so the caller learns about port conflicts at
/// startup. Returns the bound address.
pub async fn spawn_api_server(config: ApiConfig) -> anyhow::Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let addr = listener.local_addr()?;

    info!("liveness server listening on {}", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router()).await {
            error!("liveness server error: {}", e);
        }
    });

    Ok(addr)
}
