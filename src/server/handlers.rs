//! HTTP request handlers

use axum::{extract::rejection::JsonRejection, extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::inference::{ConfidenceTier, Prediction, PredictionService};
use crate::preprocessing::CarRecord;

use super::error::{Result, ServerError};
use super::state::AppState;

/// Wire form of one prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub predicted_price: f64,
    pub confidence: ConfidenceTier,
    pub input_features: CarRecord,
    pub timestamp: DateTime<Utc>,
    pub artifact_id: Uuid,
}

impl From<Prediction> for PredictionResponse {
    fn from(p: Prediction) -> Self {
        Self {
            predicted_price: p.price,
            confidence: p.confidence,
            input_features: p.input,
            timestamp: p.timestamp,
            artifact_id: p.artifact_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRequest {
    pub cars: Vec<CarRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResponse {
    pub predictions: Vec<PredictionResponse>,
    pub total_cars: usize,
}

fn require_service(state: &AppState) -> Result<Arc<PredictionService>> {
    state
        .service()
        .ok_or_else(|| ServerError::Unavailable("model not loaded".to_string()))
}

/// Service banner
pub async fn root(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "message": "Vehicle Price Prediction API",
        "version": env!("CARGO_PKG_VERSION"),
        "model_loaded": state.service().is_some(),
        "endpoints": [
            "GET /health",
            "POST /predict",
            "POST /predict/batch",
            "GET /model/info",
            "POST /model/reload",
            "GET /example",
        ],
    }))
}

/// 200 with a loaded model, 503 otherwise
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.service() {
        Some(service) => {
            let artifact = service.current();
            (
                StatusCode::OK,
                Json(json!({
                    "status": "healthy",
                    "model_loaded": true,
                    "artifact_id": artifact.artifact_id,
                    "model_kind": artifact.model.kind(),
                    "uptime_secs": state.uptime_secs(),
                    "timestamp": Utc::now().to_rfc3339(),
                })),
            )
        }
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "model_loaded": false,
                "uptime_secs": state.uptime_secs(),
                "timestamp": Utc::now().to_rfc3339(),
            })),
        ),
    }
}

/// Price one car
pub async fn predict(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<CarRecord>, JsonRejection>,
) -> Result<Json<PredictionResponse>> {
    let Json(car) = payload?;
    let service = require_service(&state)?;
    let prediction = service.predict_one(&car)?;
    Ok(Json(prediction.into()))
}

/// Price a batch; one invalid car fails the whole request
pub async fn predict_batch(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<BatchRequest>, JsonRejection>,
) -> Result<Json<BatchResponse>> {
    let Json(request) = payload?;
    let service = require_service(&state)?;
    let predictions = tokio::task::spawn_blocking(move || service.predict_many(&request.cars)).await??;

    Ok(Json(BatchResponse {
        total_cars: predictions.len(),
        predictions: predictions.into_iter().map(PredictionResponse::from).collect(),
    }))
}

/// Metadata of the active artifact
pub async fn model_info(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>> {
    let service = require_service(&state)?;
    let artifact = service.current();
    let report = artifact.manifest.as_ref().map(|m| &m.report);

    Ok(Json(json!({
        "artifact_id": artifact.artifact_id,
        "model_kind": artifact.model.kind(),
        "n_features": artifact.model.n_features(),
        "feature_names": artifact.encoder.feature_names(),
        "params": artifact.model.config().params(),
        "metrics": report.map(|r| r.metrics),
        "trained_at": report.map(|r| r.trained_at),
        "n_train": report.map(|r| r.n_train),
        "feature_importances": artifact.model.feature_importances(),
        "loaded_at": artifact.loaded_at,
        "stats": service.stats(),
        "models_dir": state.store.base_dir(),
    })))
}

/// Swap in the artifact currently on disk
pub async fn reload_model(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>> {
    let previous = state.service().map(|s| s.artifact_id());
    let worker = Arc::clone(&state);
    let artifact_id = tokio::task::spawn_blocking(move || worker.reload()).await??;
    info!(artifact_id = %artifact_id, "Reload requested over HTTP");

    Ok(Json(json!({
        "status": "reloaded",
        "artifact_id": artifact_id,
        "previous_artifact_id": previous,
    })))
}

/// A valid request body
pub async fn example() -> Json<serde_json::Value> {
    Json(json!({
        "example_input": CarRecord::example(),
        "usage": "POST this JSON to /predict",
    }))
}
