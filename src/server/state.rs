//! Application state management

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{info, warn};

use crate::export::ArtifactStore;
use crate::inference::PredictionService;

use super::ServerConfig;

/// Application state shared across handlers
pub struct AppState {
    pub config: ServerConfig,
    pub store: ArtifactStore,
    /// `None` until an artifact has been loaded successfully
    service: RwLock<Option<Arc<PredictionService>>>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Load whatever is published under `config.models_dir`; a missing or
    /// broken artifact leaves the server up but unhealthy
    pub fn new(config: ServerConfig) -> Self {
        let store = ArtifactStore::new(&config.models_dir);
        let service = match PredictionService::load(store.clone()) {
            Ok(service) => Some(Arc::new(service)),
            Err(e) => {
                warn!(error = %e, dir = %store.base_dir().display(), "No model loaded at startup");
                None
            }
        };
        Self {
            config,
            store,
            service: RwLock::new(service),
            started_at: Utc::now(),
        }
    }

    /// State around an already loaded service
    pub fn with_service(config: ServerConfig, service: PredictionService) -> Self {
        Self {
            store: service.store().clone(),
            config,
            service: RwLock::new(Some(Arc::new(service))),
            started_at: Utc::now(),
        }
    }

    pub fn service(&self) -> Option<Arc<PredictionService>> {
        self.service.read().clone()
    }

    /// Reload the active service, or load one if none is active yet
    pub fn reload(&self) -> crate::error::Result<uuid::Uuid> {
        if let Some(service) = self.service() {
            return service.reload();
        }
        let service = PredictionService::load(self.store.clone())?;
        let id = service.artifact_id();
        *self.service.write() = Some(Arc::new(service));
        info!(artifact_id = %id, "Prediction service loaded on reload");
        Ok(id)
    }

    pub fn uptime_secs(&self) -> i64 {
        Utc::now().signed_duration_since(self.started_at).num_seconds()
    }
}
