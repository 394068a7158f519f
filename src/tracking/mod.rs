//! Experiment tracking
//!
//! Training runs report their parameters and held-out metrics here. The
//! pipeline only writes to the tracker; nothing in the serving path reads it.

mod storage;
mod tracker;

pub use storage::{LocalStorage, StorageBackend};
pub use tracker::{ExperimentTracker, Run, RunStatus};
