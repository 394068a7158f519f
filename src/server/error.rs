//! Error types for the server

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::error::PricingError;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Validation failed: {0}")]
    Unprocessable(String),

    #[error("Batch validation failed at index {index}: {reason}")]
    BatchValidation { index: usize, reason: String },

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<PricingError> for ServerError {
    fn from(err: PricingError) -> Self {
        match err {
            PricingError::Validation { index, reason } => ServerError::BatchValidation { index, reason },
            PricingError::InvalidInput(msg) => ServerError::Unprocessable(msg),
            e @ (PricingError::NotFitted(_)
            | PricingError::ArtifactMissing { .. }
            | PricingError::ArtifactCorrupt { .. }
            | PricingError::DimensionMismatch { .. }) => ServerError::Unavailable(e.to_string()),
            other => ServerError::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonDataError(e) => ServerError::Unprocessable(e.body_text()),
            other => ServerError::BadRequest(other.body_text()),
        }
    }
}

impl From<tokio::task::JoinError> for ServerError {
    fn from(err: tokio::task::JoinError) -> Self {
        ServerError::Internal(format!("worker task failed: {}", err))
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message, index) = match &self {
            ServerError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            ServerError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone(), None),
            ServerError::BatchValidation { index, reason } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("record {} is invalid: {}", index, reason),
                Some(*index),
            ),
            ServerError::Unavailable(msg) => {
                tracing::warn!(detail = %msg, "Prediction service unavailable");
                (StatusCode::SERVICE_UNAVAILABLE, msg.clone(), None)
            }
            ServerError::Internal(msg) => {
                tracing::error!(detail = %msg, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "An internal error occurred".to_string(), None)
            }
        };

        let mut body = json!({
            "error": true,
            "message": message,
        });
        if let Some(index) = index {
            body["index"] = json!(index);
        }

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_pricing_error_mapping() {
        let status = |e: PricingError| ServerError::from(e).into_response().status();
        assert_eq!(
            status(PricingError::Validation { index: 3, reason: "seats".into() }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(status(PricingError::InvalidInput("year".into())), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            status(PricingError::ArtifactMissing { path: PathBuf::from("model.bin") }),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(status(PricingError::ComputationError("x".into())), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
