//! Prediction service
//!
//! Holds the active (encoder, model) pair behind one swappable `Arc`.
//! Readers take a snapshot under a momentary read lock and then predict
//! without holding any lock; `reload` builds the replacement pair first and
//! takes the write lock only to swap the pointer.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::confidence::ConfidenceTier;
use crate::error::{PricingError, Result};
use crate::export::{ArtifactManifest, ArtifactStore};
use crate::preprocessing::{CarRecord, FeatureEncoder};
use crate::training::Regressor;

/// Immutable deployable unit; replaced as a whole, never mutated
#[derive(Debug)]
pub struct ServingArtifact {
    pub artifact_id: Uuid,
    pub encoder: FeatureEncoder,
    pub model: Regressor,
    /// Training report published with the pair, when readable
    pub manifest: Option<ArtifactManifest>,
    pub loaded_at: DateTime<Utc>,
}

impl ServingArtifact {
    fn from_store(store: &ArtifactStore) -> Result<Self> {
        let loaded = store.load()?;
        let manifest = match store.read_manifest() {
            Ok(Some(m)) if m.artifact_id == loaded.artifact_id => Some(m),
            Ok(Some(m)) => {
                warn!(manifest_id = %m.artifact_id, artifact_id = %loaded.artifact_id, "Manifest does not match artifact, ignoring it");
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Unreadable manifest, ignoring it");
                None
            }
        };
        Ok(Self {
            artifact_id: loaded.artifact_id,
            encoder: loaded.encoder,
            model: loaded.model,
            manifest,
            loaded_at: Utc::now(),
        })
    }

    /// Unrounded price for one record
    pub fn predict_price(&self, record: &CarRecord) -> Result<f64> {
        let features = self.encoder.transform_one(record)?;
        self.model.predict_one(&features)
    }

    fn prediction(&self, record: &CarRecord) -> Result<Prediction> {
        let raw = self.predict_price(record)?;
        Ok(Prediction {
            price: round_cents(raw),
            confidence: ConfidenceTier::from_price(raw),
            input: record.clone(),
            timestamp: Utc::now(),
            artifact_id: self.artifact_id,
        })
    }
}

/// One priced record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Predicted price rounded to 2 decimals
    pub price: f64,
    /// Tier of the unrounded price
    pub confidence: ConfidenceTier,
    pub input: CarRecord,
    pub timestamp: DateTime<Utc>,
    /// Artifact that produced the price
    pub artifact_id: Uuid,
}

/// Counters since the service started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStats {
    pub total_predictions: u64,
    pub failed_requests: u64,
    pub reloads: u64,
    pub failed_reloads: u64,
}

#[derive(Debug, Default)]
struct Counters {
    predictions: AtomicU64,
    failures: AtomicU64,
    reloads: AtomicU64,
    failed_reloads: AtomicU64,
}

/// Serves predictions from the artifact published in one store
#[derive(Debug)]
pub struct PredictionService {
    store: ArtifactStore,
    active: RwLock<Arc<ServingArtifact>>,
    counters: Counters,
}

impl PredictionService {
    /// Load the pair published in `store`
    pub fn load(store: ArtifactStore) -> Result<Self> {
        let artifact = ServingArtifact::from_store(&store)?;
        info!(
            artifact_id = %artifact.artifact_id,
            model_kind = %artifact.model.kind(),
            dir = %store.base_dir().display(),
            "Prediction service loaded"
        );
        Ok(Self {
            store,
            active: RwLock::new(Arc::new(artifact)),
            counters: Counters::default(),
        })
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Snapshot of the active pair; stays valid across later reloads
    pub fn current(&self) -> Arc<ServingArtifact> {
        self.active.read().clone()
    }

    pub fn artifact_id(&self) -> Uuid {
        self.active.read().artifact_id
    }

    /// Price one record
    pub fn predict_one(&self, record: &CarRecord) -> Result<Prediction> {
        let result = record
            .validate()
            .map_err(PricingError::InvalidInput)
            .and_then(|_| self.current().prediction(record));
        self.count(&result, 1);
        result
    }

    /// Price every record against one snapshot.
    ///
    /// All records are validated before any is priced; the first invalid one
    /// fails the whole batch with its index.
    pub fn predict_many(&self, records: &[CarRecord]) -> Result<Vec<Prediction>> {
        let start = Instant::now();
        let result = Self::validate_batch(records).and_then(|_| {
            let artifact = self.current();
            records
                .par_iter()
                .map(|record| artifact.prediction(record))
                .collect::<Result<Vec<_>>>()
        });
        self.count(&result, records.len() as u64);
        debug!(
            batch_size = records.len(),
            ok = result.is_ok(),
            latency_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Batch prediction"
        );
        result
    }

    /// Re-read the store and swap in the new pair.
    ///
    /// On failure the previous pair stays active and the error is returned.
    pub fn reload(&self) -> Result<Uuid> {
        let fresh = match ServingArtifact::from_store(&self.store) {
            Ok(artifact) => Arc::new(artifact),
            Err(e) => {
                self.counters.failed_reloads.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, active = %self.artifact_id(), "Reload failed, keeping active artifact");
                return Err(e);
            }
        };
        let new_id = fresh.artifact_id;
        let previous = std::mem::replace(&mut *self.active.write(), fresh);
        self.counters.reloads.fetch_add(1, Ordering::Relaxed);
        info!(previous = %previous.artifact_id, current = %new_id, "Artifact reloaded");
        Ok(new_id)
    }

    pub fn stats(&self) -> ServiceStats {
        ServiceStats {
            total_predictions: self.counters.predictions.load(Ordering::Relaxed),
            failed_requests: self.counters.failures.load(Ordering::Relaxed),
            reloads: self.counters.reloads.load(Ordering::Relaxed),
            failed_reloads: self.counters.failed_reloads.load(Ordering::Relaxed),
        }
    }

    fn validate_batch(records: &[CarRecord]) -> Result<()> {
        for (index, record) in records.iter().enumerate() {
            record.validate().map_err(|reason| PricingError::Validation { index, reason })?;
        }
        Ok(())
    }

    fn count<T>(&self, result: &Result<T>, n: u64) {
        match result {
            Ok(_) => self.counters.predictions.fetch_add(n, Ordering::Relaxed),
            Err(_) => self.counters.failures.fetch_add(1, Ordering::Relaxed),
        };
    }
}

fn round_cents(price: f64) -> f64 {
    (price * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::TrainingExample;
    use crate::training::{ModelConfig, TrainingConfig, TrainingPipeline};

    fn publish(store: &ArtifactStore, alpha: f64) -> Uuid {
        let fuels = ["Petrol", "Diesel"];
        let examples: Vec<TrainingExample> = (0..50)
            .map(|i| {
                let record = CarRecord {
                    year: 2010 + i % 14,
                    km_driven: 20_000 + i * 1_000,
                    fuel: fuels[(i % 2) as usize].to_string(),
                    transmission: "Manual".to_string(),
                    owner: "First".to_string(),
                    engine_cc: 1500,
                    seats: 5,
                };
                let price = 12_000.0 + (record.year - 2010) as f64 * 900.0;
                TrainingExample::new(record, price)
            })
            .collect();
        let outcome = TrainingPipeline::new(TrainingConfig::new(ModelConfig::ridge(alpha)))
            .run(&examples)
            .unwrap();
        TrainingPipeline::publish(&outcome, store).unwrap()
    }

    #[test]
    fn test_round_cents() {
        assert_eq!(round_cents(12_345.678), 12_345.68);
        assert_eq!(round_cents(-0.004), -0.0);
    }

    #[test]
    fn test_predict_one_carries_artifact_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let id = publish(&store, 1.0);

        let service = PredictionService::load(store).unwrap();
        let prediction = service.predict_one(&CarRecord::example()).unwrap();
        assert_eq!(prediction.artifact_id, id);
        assert_eq!(prediction.input, CarRecord::example());
        assert_eq!(prediction.price, round_cents(prediction.price));
        assert_eq!(service.stats().total_predictions, 1);
        assert!(service.current().manifest.is_some());
    }

    #[test]
    fn test_predict_one_rejects_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        publish(&store, 1.0);
        let service = PredictionService::load(store).unwrap();

        let mut car = CarRecord::example();
        car.seats = 12;
        assert!(matches!(service.predict_one(&car), Err(PricingError::InvalidInput(_))));
        assert_eq!(service.stats().failed_requests, 1);
    }

    #[test]
    fn test_failed_reload_keeps_active_pair() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let id = publish(&store, 1.0);
        let service = PredictionService::load(store.clone()).unwrap();

        std::fs::write(store.encoder_path(), b"garbage").unwrap();
        assert!(matches!(service.reload(), Err(PricingError::ArtifactCorrupt { .. })));
        assert_eq!(service.artifact_id(), id);
        assert!(service.predict_one(&CarRecord::example()).is_ok());
        assert_eq!(service.stats().failed_reloads, 1);

        let new_id = publish(&store, 5.0);
        assert_eq!(service.reload().unwrap(), new_id);
        assert_eq!(service.artifact_id(), new_id);
    }

    #[test]
    fn test_load_from_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let err = PredictionService::load(ArtifactStore::new(dir.path())).unwrap_err();
        assert!(matches!(err, PricingError::ArtifactMissing { .. }));
    }
}
