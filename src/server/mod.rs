//! HTTP prediction server
//!
//! A thin axum surface over [`PredictionService`](crate::inference::PredictionService):
//! request parsing, boundary validation responses, health, and reload.

mod api;
mod error;
mod handlers;
mod state;

pub use api::create_router;
pub use error::ServerError;
pub use handlers::{BatchRequest, BatchResponse, PredictionResponse};
pub use state::AppState;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub models_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8000),
            models_dir: std::env::var("MODELS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./models")),
        }
    }
}

impl ServerConfig {
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_models_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.models_dir = dir.into();
        self
    }
}

async fn shutdown_signal(started_at: chrono::DateTime<chrono::Utc>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to install ctrl+c handler, shutting down");
    }
    let stop_time = chrono::Utc::now();
    info!(
        stopped_at = %stop_time.to_rfc3339(),
        uptime_secs = stop_time.signed_duration_since(started_at).num_seconds(),
        "Shutdown signal received, stopping server gracefully"
    );
}

/// Start the server with the given configuration
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let state = Arc::new(AppState::new(config.clone()));
    let started_at = state.started_at;
    let app = create_router(Arc::clone(&state));

    info!(
        address = %addr,
        models_dir = %config.models_dir.display(),
        model_loaded = state.service().is_some(),
        started_at = %started_at.to_rfc3339(),
        "Vehicle price server starting"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, pid = std::process::id(), "Server listening and ready to accept connections");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(started_at))
        .await?;

    info!("Server shut down cleanly");
    Ok(())
}
