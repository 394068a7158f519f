//! Experiment tracker: named runs with params, metrics and status

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use super::storage::{LocalStorage, StorageBackend};
use crate::error::Result;

/// Status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Finished,
    Failed,
}

/// A single run within an experiment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub run_id: String,
    pub run_name: String,
    pub experiment: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub params: BTreeMap<String, serde_json::Value>,
    pub metrics: BTreeMap<String, f64>,
    pub tags: BTreeMap<String, String>,
    pub status: RunStatus,
}

impl Run {
    fn new(experiment: &str, run_name: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4().simple().to_string(),
            run_name: run_name.into(),
            experiment: experiment.to_string(),
            start_time: Utc::now(),
            end_time: None,
            params: BTreeMap::new(),
            metrics: BTreeMap::new(),
            tags: BTreeMap::new(),
            status: RunStatus::Running,
        }
    }

    pub fn log_param(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> &mut Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn log_metric(&mut self, key: impl Into<String>, value: f64) -> &mut Self {
        self.metrics.insert(key.into(), value);
        self
    }

    pub fn set_tag(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Run duration in seconds, up to now for a running run
    pub fn duration_secs(&self) -> f64 {
        let end = self.end_time.unwrap_or_else(Utc::now);
        (end - self.start_time).num_milliseconds() as f64 / 1000.0
    }
}

/// Records runs of one experiment to a storage backend
#[derive(Clone)]
pub struct ExperimentTracker {
    experiment_name: String,
    storage: Arc<dyn StorageBackend + Send + Sync>,
}

impl std::fmt::Debug for ExperimentTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExperimentTracker")
            .field("experiment_name", &self.experiment_name)
            .finish_non_exhaustive()
    }
}

impl ExperimentTracker {
    pub fn new(experiment_name: impl Into<String>, storage: Arc<dyn StorageBackend + Send + Sync>) -> Self {
        Self { experiment_name: experiment_name.into(), storage }
    }

    /// Tracker writing JSON runs below `dir`
    pub fn local(experiment_name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self::new(experiment_name, Arc::new(LocalStorage::new(dir.into())))
    }

    pub fn experiment_name(&self) -> &str {
        &self.experiment_name
    }

    /// Open a new run; nothing is stored until it ends
    pub fn start_run(&self, run_name: impl Into<String>) -> Run {
        Run::new(&self.experiment_name, run_name)
    }

    /// Close `run` with `status` and persist it
    pub fn end_run(&self, mut run: Run, status: RunStatus) -> Result<Run> {
        run.status = status;
        run.end_time = Some(Utc::now());
        self.storage.save_run(&run)?;
        debug!(run_id = %run.run_id, run_name = %run.run_name, status = ?status, "Run recorded");
        Ok(run)
    }

    /// All stored runs of this experiment, oldest first
    pub fn runs(&self) -> Result<Vec<Run>> {
        self.storage.load_runs(&self.experiment_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = ExperimentTracker::local("car_price_prediction", dir.path());

        let mut run = tracker.start_run("ensemble_trees_experiment");
        run.log_param("n_estimators", 100).log_metric("mae", 1234.5).set_tag("source", "test");
        assert_eq!(run.status, RunStatus::Running);

        let stored = tracker.end_run(run, RunStatus::Finished).unwrap();
        assert!(stored.end_time.is_some());

        let runs = tracker.runs().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0], stored);
        assert_eq!(runs[0].metrics["mae"], 1234.5);
        assert_eq!(runs[0].params["n_estimators"], serde_json::json!(100));
    }
}
