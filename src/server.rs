//! HTTP server for the status poll path.
//!
//! This module provides an HTTP server that:
//! - Reports the latest published beat class via GET /status, with an alert
//!   whenever the class differs from the previous poll
//! - Installs a time-boxed forced value via POST /force
//!
//! # Architecture
//!
//! ```text
//! writer loop ──→ status file ──→ AlertStateMachine ──→ GET /status ──→ dashboard
//!                                        ↑
//!                                  POST /force
//! ```

use crate::alert::{AlertStateMachine, ForcedOverride, StatusReport};
use axum::{
    extract::State,
    http::{HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub host: String,
    /// Port to bind to (0 for random)
    pub port: u16,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl From<&crate::config::ServerSettings> for ServerConfig {
    fn from(settings: &crate::config::ServerSettings) -> Self {
        Self::new(settings.host.clone(), settings.port)
    }
}

/// Body of POST /force
#[derive(Debug, Clone, Deserialize)]
pub struct ForceRequest {
    pub value: i64,
    pub rows: u32,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /status
async fn status(State(machine): State<Arc<AlertStateMachine>>) -> Json<StatusReport> {
    Json(machine.poll())
}

/// POST /force
async fn force(
    State(machine): State<Arc<AlertStateMachine>>,
    Json(request): Json<ForceRequest>,
) -> (StatusCode, Json<ForcedOverride>) {
    (StatusCode::OK, Json(machine.force(request.value, request.rows)))
}

/// Build the router around a shared state machine.
pub fn router(machine: Arc<AlertStateMachine>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/force", post(force))
        .layer(
            CorsLayer::new()
                .allow_origin([
                    HeaderValue::from_static("http://localhost"),
                    HeaderValue::from_static("http://127.0.0.1"),
                    HeaderValue::from_static("http://localhost:3000"),
                    HeaderValue::from_static("http://127.0.0.1:3000"),
                ])
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(machine)
}

/// Run the HTTP server
pub async fn run(
    config: ServerConfig,
    machine: Arc<AlertStateMachine>,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    let app = router(machine);

    let host: IpAddr = config.host.parse()?;
    let addr = SocketAddr::new(host, config.port);
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("Status server listening on http://{}", actual_addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Server shutdown signal received");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok((actual_addr, shutdown_tx))
}
