//! Storage backends for experiment runs

use std::fs;
use std::path::PathBuf;

use super::tracker::Run;
use crate::error::Result;
use crate::export::write_atomic;

/// Storage backend trait
pub trait StorageBackend {
    /// Persist one finished run
    fn save_run(&self, run: &Run) -> Result<()>;

    /// Load every run of an experiment, oldest first
    fn load_runs(&self, experiment: &str) -> Result<Vec<Run>>;
}

/// Local file system storage: `<base_dir>/<experiment>/<run_id>.json`
pub struct LocalStorage {
    base_dir: PathBuf,
}

impl LocalStorage {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    fn experiment_dir(&self, experiment: &str) -> PathBuf {
        let safe: String = experiment
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.base_dir.join(safe)
    }
}

impl StorageBackend for LocalStorage {
    fn save_run(&self, run: &Run) -> Result<()> {
        let path = self.experiment_dir(&run.experiment).join(format!("{}.json", run.run_id));
        let json = serde_json::to_vec_pretty(run)?;
        write_atomic(&path, &json)
    }

    fn load_runs(&self, experiment: &str) -> Result<Vec<Run>> {
        let dir = self.experiment_dir(experiment);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut runs = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let run: Run = serde_json::from_slice(&fs::read(&path)?)?;
            runs.push(run);
        }
        runs.sort_by_key(|r| r.start_time);
        Ok(runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::{ExperimentTracker, RunStatus};
    use std::sync::Arc;

    #[test]
    fn test_missing_experiment_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().to_path_buf());
        assert!(storage.load_runs("nothing").unwrap().is_empty());
    }

    #[test]
    fn test_experiment_name_is_sanitised() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = ExperimentTracker::new("../escape me", Arc::new(LocalStorage::new(dir.path().to_path_buf())));
        tracker.end_run(tracker.start_run("r"), RunStatus::Failed).unwrap();
        assert!(dir.path().join("___escape_me").is_dir());
        assert_eq!(tracker.runs().unwrap()[0].status, RunStatus::Failed);
    }
}
