//! vehicle-price: car price regression from encoding to serving
//!
//! Raw car attributes are encoded into a fixed-order feature vector by a
//! [`FeatureEncoder`](preprocessing::FeatureEncoder) fitted once on the
//! training split. The same persisted encoder is reused at inference, so the
//! transformation seen by the regressor never drifts between training and
//! serving.
//!
//! # Modules
//!
//! ## Core
//! - [`preprocessing`] - Record schema, vocabularies, standardization
//! - [`training`] - Regressors, metrics, split, training pipeline
//! - [`export`] - Versioned artifact envelopes and the artifact store
//! - [`inference`] - Prediction service with atomic reload
//!
//! ## Around the core
//! - [`synthetic`] - Seeded fixture dataset
//! - [`utils`] - CSV loading and cleaning
//! - [`tracking`] - Experiment runs
//! - [`retrain`] - Compare-and-promote retraining
//!
//! ## Services
//! - [`server`] - HTTP API
//! - [`cli`] - Command-line interface

pub mod error;

pub mod preprocessing;
pub mod training;
pub mod export;
pub mod inference;

pub mod synthetic;
pub mod utils;
pub mod tracking;
pub mod retrain;

pub mod server;
pub mod cli;

pub use error::{PricingError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{PricingError, Result};
    pub use crate::export::ArtifactStore;
    pub use crate::inference::{ConfidenceTier, Prediction, PredictionService};
    pub use crate::preprocessing::{CarRecord, FeatureEncoder, FeatureSchema, TrainingExample};
    pub use crate::retrain::{RetrainConfig, RetrainDecision, RetrainWorkflow};
    pub use crate::training::{Metrics, ModelConfig, ModelKind, Regressor, TrainingConfig, TrainingPipeline};
}
