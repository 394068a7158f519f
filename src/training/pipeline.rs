//! Training orchestration: split, encode, fit, evaluate, report

use chrono::{DateTime, Utc};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use super::config::{ModelConfig, ModelKind, TrainingConfig};
use super::metrics::Metrics;
use super::models::Regressor;
use super::split::HoldoutSplit;
use crate::error::{PricingError, Result};
use crate::export::ArtifactStore;
use crate::preprocessing::{CarRecord, FeatureEncoder, TrainingExample};
use crate::tracking::{ExperimentTracker, RunStatus};

/// Summary of one training run, written next to the published artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    /// Tracker run id, when a tracker recorded the run
    pub run_id: Option<String>,
    pub model_kind: ModelKind,
    pub params: serde_json::Map<String, serde_json::Value>,
    pub metrics: Metrics,
    pub n_train: usize,
    pub n_test: usize,
    pub feature_names: Vec<String>,
    pub trained_at: DateTime<Utc>,
    pub training_time_secs: f64,
    pub split_seed: u64,
    pub test_ratio: f64,
}

/// Everything a run produces; nothing is persisted until it is published
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub encoder: FeatureEncoder,
    pub model: Regressor,
    pub report: TrainingReport,
}

impl TrainingOutcome {
    pub fn metrics(&self) -> &Metrics {
        &self.report.metrics
    }
}

/// One row of a model comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonEntry {
    pub name: String,
    pub model_kind: ModelKind,
    pub params: serde_json::Map<String, serde_json::Value>,
    pub metrics: Metrics,
    pub training_time_secs: f64,
}

/// The candidate set compared by default
pub fn default_candidates() -> Vec<(String, ModelConfig)> {
    vec![
        ("random_forest_50".to_string(), ModelConfig::random_forest(50, Some(10))),
        ("random_forest_100".to_string(), ModelConfig::random_forest(100, Some(15))),
        ("gradient_boosting".to_string(), ModelConfig::gradient_boosting(100, 0.1, 3)),
        ("ridge".to_string(), ModelConfig::ridge(1.0)),
    ]
}

/// Drives encoder fit, regressor fit and evaluation for one configuration
#[derive(Debug, Clone)]
pub struct TrainingPipeline {
    config: TrainingConfig,
    tracker: Option<ExperimentTracker>,
}

impl TrainingPipeline {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config, tracker: None }
    }

    /// Record every run to `tracker`
    pub fn with_tracker(mut self, tracker: ExperimentTracker) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Split, fit the encoder on the training side only, fit and evaluate the regressor
    pub fn run(&self, examples: &[TrainingExample]) -> Result<TrainingOutcome> {
        self.config.validate()?;
        let split = HoldoutSplit::new(examples.len(), self.config.test_ratio, self.config.split_seed)?;
        let (train, test) = split.apply(examples);
        self.run_split(&train, &test, &self.config.model)
    }

    /// Train and publish to `store`, returning the new artifact id
    pub fn run_and_publish(&self, examples: &[TrainingExample], store: &ArtifactStore) -> Result<(TrainingOutcome, Uuid)> {
        let outcome = self.run(examples)?;
        let artifact_id = Self::publish(&outcome, store)?;
        Ok((outcome, artifact_id))
    }

    /// Persist encoder, model and report as one unit
    pub fn publish(outcome: &TrainingOutcome, store: &ArtifactStore) -> Result<Uuid> {
        store.publish(&outcome.encoder, &outcome.model, &outcome.report)
    }

    /// Train every candidate on the same split, best RMSE first
    pub fn compare(&self, examples: &[TrainingExample], candidates: &[(String, ModelConfig)]) -> Result<Vec<ComparisonEntry>> {
        if candidates.is_empty() {
            return Err(PricingError::ConfigError("no candidate models to compare".to_string()));
        }
        self.config.validate()?;
        let split = HoldoutSplit::new(examples.len(), self.config.test_ratio, self.config.split_seed)?;
        let (train, test) = split.apply(examples);

        let mut entries = Vec::with_capacity(candidates.len());
        for (name, model_config) in candidates {
            let outcome = self.run_split(&train, &test, model_config)?;
            info!(candidate = %name, mae = outcome.report.metrics.mae, rmse = outcome.report.metrics.rmse, "Candidate evaluated");
            entries.push(ComparisonEntry {
                name: name.clone(),
                model_kind: model_config.kind,
                params: outcome.report.params,
                metrics: outcome.report.metrics,
                training_time_secs: outcome.report.training_time_secs,
            });
        }

        entries.sort_by(|a, b| a.metrics.rmse.total_cmp(&b.metrics.rmse));
        Ok(entries)
    }

    fn run_split(&self, train: &[TrainingExample], test: &[TrainingExample], model_config: &ModelConfig) -> Result<TrainingOutcome> {
        let start = Instant::now();
        let mut run = self
            .tracker
            .as_ref()
            .map(|t| t.start_run(format!("{}_experiment", model_config.kind)));

        let result = self.fit_and_evaluate(train, test, model_config);

        let run_id = match (run.take(), &self.tracker) {
            (Some(mut run), Some(tracker)) => {
                for (key, value) in model_config.params() {
                    run.log_param(key, value);
                }
                let status = match &result {
                    Ok((_, _, metrics)) => {
                        run.log_metric("mae", metrics.mae)
                            .log_metric("rmse", metrics.rmse)
                            .log_metric("r2", metrics.r2);
                        RunStatus::Finished
                    }
                    Err(_) => RunStatus::Failed,
                };
                let run_id = run.run_id.clone();
                match tracker.end_run(run, status) {
                    Ok(_) => Some(run_id),
                    Err(e) => {
                        warn!(error = %e, "Failed to record training run");
                        None
                    }
                }
            }
            _ => None,
        };

        let (encoder, model, metrics) = result?;
        let training_time_secs = start.elapsed().as_secs_f64();

        info!(
            model_kind = %model_config.kind,
            n_train = train.len(),
            n_test = test.len(),
            mae = metrics.mae,
            rmse = metrics.rmse,
            r2 = metrics.r2,
            training_time_secs,
            "Training run complete"
        );

        let report = TrainingReport {
            run_id,
            model_kind: model_config.kind,
            params: model_config.params(),
            metrics,
            n_train: train.len(),
            n_test: test.len(),
            feature_names: encoder.feature_names(),
            trained_at: Utc::now(),
            training_time_secs,
            split_seed: self.config.split_seed,
            test_ratio: self.config.test_ratio,
        };
        Ok(TrainingOutcome { encoder, model, report })
    }

    fn fit_and_evaluate(
        &self,
        train: &[TrainingExample],
        test: &[TrainingExample],
        model_config: &ModelConfig,
    ) -> Result<(FeatureEncoder, Regressor, Metrics)> {
        let train_records: Vec<CarRecord> = train.iter().map(|e| e.record.clone()).collect();
        let test_records: Vec<CarRecord> = test.iter().map(|e| e.record.clone()).collect();

        let mut encoder = FeatureEncoder::default();
        let x_train = encoder.fit_transform(&train_records)?;
        let x_test = encoder.transform(&test_records)?;
        let y_train = targets(train)?;
        let y_test = targets(test)?;

        let model = Regressor::fit(&x_train, &y_train, model_config)?;
        let metrics = model.evaluate(&x_test, &y_test)?;
        Ok((encoder, model, metrics))
    }
}

fn targets(examples: &[TrainingExample]) -> Result<Array1<f64>> {
    if let Some(pos) = examples.iter().position(|e| !e.price.is_finite()) {
        return Err(PricingError::InvalidInput(format!(
            "price of example {} is not finite: {}",
            pos, examples[pos].price
        )));
    }
    Ok(examples.iter().map(|e| e.price).collect())
}
