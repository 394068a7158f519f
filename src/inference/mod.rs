//! Serving-side inference
//!
//! [`PredictionService`] loads a published (encoder, model) pair, prices
//! validated car records, and hot-swaps the pair on `reload`.

mod confidence;
mod engine;

pub use confidence::ConfidenceTier;
pub use engine::{Prediction, PredictionService, ServiceStats, ServingArtifact};
