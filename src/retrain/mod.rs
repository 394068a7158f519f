//! Retrain and redeploy
//!
//! Trains on fresh data into a staging store, compares held-out MAE with the
//! deployed artifact, and promotes only a strict improvement. The first run
//! with nothing deployed always promotes. A serving process can be told to
//! pick up the new pair through its reload endpoint.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{PricingError, Result};
use crate::export::ArtifactStore;
use crate::tracking::ExperimentTracker;
use crate::training::{TrainingConfig, TrainingPipeline};
use crate::utils::load_examples;

/// Where data comes from and where artifacts go
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrainConfig {
    pub data_path: PathBuf,
    pub staging_dir: PathBuf,
    pub deployed_dir: PathBuf,
    #[serde(default)]
    pub training: TrainingConfig,
    /// Serving reload endpoint, e.g. `http://localhost:8000/model/reload`
    #[serde(default)]
    pub reload_url: Option<String>,
    /// Directory for experiment runs; `None` disables tracking
    #[serde(default)]
    pub tracking_dir: Option<PathBuf>,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

impl RetrainConfig {
    pub fn new(data_path: impl Into<PathBuf>, deployed_dir: impl Into<PathBuf>) -> Self {
        let deployed_dir = deployed_dir.into();
        Self {
            data_path: data_path.into(),
            staging_dir: deployed_dir.join("staging"),
            deployed_dir,
            training: TrainingConfig::default(),
            reload_url: None,
            tracking_dir: None,
            request_timeout_secs: default_timeout_secs(),
        }
    }

    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = dir.into();
        self
    }

    pub fn with_training(mut self, training: TrainingConfig) -> Self {
        self.training = training;
        self
    }

    pub fn with_reload_url(mut self, url: impl Into<String>) -> Self {
        self.reload_url = Some(url.into());
        self
    }

    pub fn with_tracking_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.tracking_dir = Some(dir.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.staging_dir == self.deployed_dir {
            return Err(PricingError::ConfigError(
                "staging and deployed directories must differ".to_string(),
            ));
        }
        self.training.validate()
    }
}

/// What a retrain run did with its candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum RetrainDecision {
    /// Nothing was deployed; the candidate went out unconditionally
    DeployedFirst { artifact_id: Uuid, new_mae: f64 },
    /// The candidate beat the deployed MAE
    Promoted { artifact_id: Uuid, new_mae: f64, old_mae: f64 },
    /// The candidate was no better and was deleted
    Discarded { new_mae: f64, old_mae: f64 },
}

impl RetrainDecision {
    pub fn is_deployed(&self) -> bool {
        !matches!(self, RetrainDecision::Discarded { .. })
    }

    pub fn artifact_id(&self) -> Option<Uuid> {
        match self {
            RetrainDecision::DeployedFirst { artifact_id, .. } | RetrainDecision::Promoted { artifact_id, .. } => {
                Some(*artifact_id)
            }
            RetrainDecision::Discarded { .. } => None,
        }
    }
}

/// One configured retrain job
#[derive(Debug, Clone)]
pub struct RetrainWorkflow {
    config: RetrainConfig,
}

impl RetrainWorkflow {
    pub fn new(config: RetrainConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetrainConfig {
        &self.config
    }

    /// Train, compare and promote or discard.
    ///
    /// A failure anywhere before promotion leaves the deployed artifact untouched.
    pub fn run(&self) -> Result<RetrainDecision> {
        self.config.validate()?;
        let staging = ArtifactStore::new(&self.config.staging_dir);
        let deployed = ArtifactStore::new(&self.config.deployed_dir);

        let examples = load_examples(&self.config.data_path)?;
        info!(rows = examples.len(), path = %self.config.data_path.display(), "Retraining");

        let mut pipeline = TrainingPipeline::new(self.config.training.clone());
        if let Some(dir) = &self.config.tracking_dir {
            pipeline = pipeline.with_tracker(ExperimentTracker::local(&self.config.training.experiment_name, dir));
        }
        let (outcome, _) = pipeline.run_and_publish(&examples, &staging)?;
        let new_mae = outcome.metrics().mae;

        let old_mae = match deployed.read_manifest()? {
            Some(manifest) if deployed.exists() => Some(manifest.report.metrics.mae),
            _ => None,
        };

        let decision = match old_mae {
            None => {
                let artifact_id = staging.promote_to(&deployed)?;
                RetrainDecision::DeployedFirst { artifact_id, new_mae }
            }
            Some(old_mae) if new_mae < old_mae => {
                let artifact_id = staging.promote_to(&deployed)?;
                RetrainDecision::Promoted { artifact_id, new_mae, old_mae }
            }
            Some(old_mae) => RetrainDecision::Discarded { new_mae, old_mae },
        };
        staging.remove_all()?;

        match &decision {
            RetrainDecision::Discarded { new_mae, old_mae } => {
                info!(new_mae, old_mae, "Candidate not better than deployed model, discarded")
            }
            other => info!(decision = ?other, "Candidate deployed"),
        }
        Ok(decision)
    }

    /// Ask the serving process to reload; `Ok(false)` when no URL is configured
    pub async fn signal_reload(&self) -> Result<bool> {
        let Some(url) = &self.config.reload_url else {
            return Ok(false);
        };
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.config.request_timeout_secs))
            .build()?;
        let response = client.post(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, url = %url, "Reload request rejected");
            return Err(PricingError::ReloadSignal(format!("{} returned {}: {}", url, status, body)));
        }
        info!(url = %url, "Serving process reloaded");
        Ok(true)
    }

    /// [`run`](Self::run) on a blocking thread, then signal a reload if deployed
    pub async fn run_and_signal(self) -> Result<RetrainDecision> {
        let workflow = self.clone();
        let decision = tokio::task::spawn_blocking(move || workflow.run())
            .await
            .map_err(|e| PricingError::ComputationError(format!("retrain task failed: {}", e)))??;
        if decision.is_deployed() {
            self.signal_reload().await?;
        }
        Ok(decision)
    }
}
