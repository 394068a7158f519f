//! Artifact store: the deployable (encoder, model, metrics) unit on disk
//!
//! Layout under the base directory:
//!
//! ```text
//! <base>/encoder.bin   FeatureEncoder envelope
//! <base>/model.bin     Regressor envelope
//! <base>/metrics.json  ArtifactManifest (artifact id + training report)
//! ```
//!
//! Both binary envelopes carry the same artifact id. A pair whose ids differ
//! was torn by an interrupted publish and is rejected as corrupt.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

use super::serializer::{encode_artifact, load_artifact, temp_path, ArtifactKind, FORMAT_VERSION};
use crate::error::{PricingError, Result};
use crate::preprocessing::FeatureEncoder;
use crate::training::{Regressor, TrainingReport};

pub const ENCODER_FILE: &str = "encoder.bin";
pub const MODEL_FILE: &str = "model.bin";
pub const METRICS_FILE: &str = "metrics.json";

/// Human-readable side file describing the published pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub artifact_id: Uuid,
    pub format_version: u32,
    pub report: TrainingReport,
}

/// A decoded encoder/model pair with matching ids
#[derive(Debug, Clone)]
pub struct LoadedArtifact {
    pub artifact_id: Uuid,
    pub encoder: FeatureEncoder,
    pub model: Regressor,
}

/// Directory holding one published artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactStore {
    base_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into() }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn encoder_path(&self) -> PathBuf {
        self.base_dir.join(ENCODER_FILE)
    }

    pub fn model_path(&self) -> PathBuf {
        self.base_dir.join(MODEL_FILE)
    }

    pub fn metrics_path(&self) -> PathBuf {
        self.base_dir.join(METRICS_FILE)
    }

    /// True when both binary blobs are present
    pub fn exists(&self) -> bool {
        self.encoder_path().is_file() && self.model_path().is_file()
    }

    /// Publish a fitted pair under a fresh artifact id.
    ///
    /// All three files are fully written to temp siblings before any of them is
    /// renamed into place, so a failed encode or write leaves the previous
    /// artifact untouched.
    pub fn publish(&self, encoder: &FeatureEncoder, model: &Regressor, report: &TrainingReport) -> Result<Uuid> {
        if !encoder.is_fitted() {
            return Err(PricingError::NotFitted("cannot publish an unfitted encoder".to_string()));
        }
        if encoder.n_features() != model.n_features() {
            return Err(PricingError::DimensionMismatch {
                expected: encoder.n_features(),
                actual: model.n_features(),
            });
        }

        let artifact_id = Uuid::new_v4();
        let manifest = ArtifactManifest {
            artifact_id,
            format_version: FORMAT_VERSION,
            report: report.clone(),
        };

        let staged = [
            (self.encoder_path(), encode_artifact(ArtifactKind::Encoder, artifact_id, encoder)?),
            (self.model_path(), encode_artifact(ArtifactKind::Model, artifact_id, model)?),
            (self.metrics_path(), serde_json::to_vec_pretty(&manifest)?),
        ];

        fs::create_dir_all(&self.base_dir)?;
        for (path, bytes) in &staged {
            if let Err(e) = write_temp(path, bytes) {
                discard_temps(staged.iter().map(|(p, _)| p));
                return Err(e);
            }
        }
        for (path, _) in &staged {
            fs::rename(temp_path(path), path)?;
        }

        info!(
            artifact_id = %artifact_id,
            dir = %self.base_dir.display(),
            model_kind = %model.kind(),
            "Artifact published"
        );
        Ok(artifact_id)
    }

    /// Load the encoder and model as one unit
    pub fn load(&self) -> Result<LoadedArtifact> {
        let encoder_path = self.encoder_path();
        let model_path = self.model_path();
        for path in [&encoder_path, &model_path] {
            if !path.is_file() {
                return Err(PricingError::ArtifactMissing { path: path.clone() });
            }
        }

        let (encoder_header, encoder): (_, FeatureEncoder) = load_artifact(&encoder_path, ArtifactKind::Encoder)?;
        let (model_header, model): (_, Regressor) = load_artifact(&model_path, ArtifactKind::Model)?;

        if encoder_header.artifact_id != model_header.artifact_id {
            return Err(PricingError::ArtifactCorrupt {
                path: model_path,
                reason: format!(
                    "model belongs to artifact {} but encoder to {}",
                    model_header.artifact_id, encoder_header.artifact_id
                ),
            });
        }
        if !encoder.is_fitted() || encoder.n_features() != model.n_features() {
            return Err(PricingError::ArtifactCorrupt {
                path: encoder_path,
                reason: format!(
                    "encoder yields {} features but model expects {}",
                    encoder.n_features(),
                    model.n_features()
                ),
            });
        }

        debug!(artifact_id = %encoder_header.artifact_id, dir = %self.base_dir.display(), "Artifact loaded");
        Ok(LoadedArtifact { artifact_id: encoder_header.artifact_id, encoder, model })
    }

    /// The manifest, or `None` when nothing has been published yet
    pub fn read_manifest(&self) -> Result<Option<ArtifactManifest>> {
        let path = self.metrics_path();
        match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map(Some).map_err(|e| PricingError::ArtifactCorrupt {
                path,
                reason: e.to_string(),
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Copy this artifact into `target`, replacing what it holds
    pub fn promote_to(&self, target: &ArtifactStore) -> Result<Uuid> {
        let manifest = self.read_manifest()?.ok_or_else(|| PricingError::ArtifactMissing {
            path: self.metrics_path(),
        })?;
        // refuse to copy a torn pair
        self.load()?;

        fs::create_dir_all(&target.base_dir)?;
        let pairs = [
            (self.encoder_path(), target.encoder_path()),
            (self.model_path(), target.model_path()),
            (self.metrics_path(), target.metrics_path()),
        ];
        for (from, to) in &pairs {
            if let Err(e) = fs::copy(from, temp_path(to)) {
                discard_temps(pairs.iter().map(|(_, t)| t));
                return Err(e.into());
            }
        }
        for (_, to) in &pairs {
            fs::rename(temp_path(to), to)?;
        }

        info!(
            artifact_id = %manifest.artifact_id,
            from = %self.base_dir.display(),
            to = %target.base_dir.display(),
            "Artifact promoted"
        );
        Ok(manifest.artifact_id)
    }

    /// Delete the three artifact files; absent files are ignored
    pub fn remove_all(&self) -> Result<()> {
        for path in [self.encoder_path(), self.model_path(), self.metrics_path()] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

fn write_temp(path: &Path, bytes: &[u8]) -> Result<()> {
    use std::io::Write;
    let mut file = fs::File::create(temp_path(path))?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

fn discard_temps<'a>(paths: impl Iterator<Item = &'a PathBuf>) {
    for path in paths {
        let _ = fs::remove_file(temp_path(path));
    }
}
