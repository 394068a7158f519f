//! The fitted regression function and its persisted form

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tracing::info;
use uuid::Uuid;

use super::config::{ModelConfig, ModelKind};
use super::gradient_boosting::{GradientBoostingConfig, GradientBoostingRegressor};
use super::linear_models::RidgeRegression;
use super::metrics::Metrics;
use super::random_forest::RandomForest;
use crate::error::{PricingError, Result};
use crate::export::{load_artifact, save_artifact, ArtifactKind};

/// Concrete estimator behind a [`Regressor`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Estimator {
    Forest(RandomForest),
    Boosting(GradientBoostingRegressor),
    Ridge(RidgeRegression),
}

/// A fitted regressor over encoded feature vectors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Regressor {
    config: ModelConfig,
    n_features: usize,
    estimator: Estimator,
    training_time_secs: f64,
}

impl Regressor {
    /// Train the estimator selected by `config.kind`
    pub fn fit(x: &Array2<f64>, y: &Array1<f64>, config: &ModelConfig) -> Result<Self> {
        config.validate()?;
        if x.nrows() == 0 {
            return Err(PricingError::InvalidInput("cannot fit on an empty feature matrix".to_string()));
        }
        if x.nrows() != y.len() {
            return Err(PricingError::InvalidInput(format!(
                "feature matrix has {} rows but {} targets",
                x.nrows(),
                y.len()
            )));
        }

        let start = Instant::now();
        let estimator = match config.kind {
            ModelKind::EnsembleTrees => {
                let mut rf = RandomForest::new(config.n_estimators)
                    .with_max_depth(config.max_depth)
                    .with_min_samples_split(config.min_samples_split)
                    .with_min_samples_leaf(config.min_samples_leaf)
                    .with_random_state(config.seed);
                rf.fit(x, y)?;
                Estimator::Forest(rf)
            }
            ModelKind::GradientBoostedTrees => {
                let mut gbr = GradientBoostingRegressor::new(GradientBoostingConfig {
                    n_estimators: config.n_estimators,
                    learning_rate: config.learning_rate,
                    max_depth: config.max_depth.unwrap_or(3),
                    min_samples_split: config.min_samples_split,
                    min_samples_leaf: config.min_samples_leaf,
                    subsample: config.subsample,
                    colsample_bytree: 1.0,
                    random_state: Some(config.seed),
                });
                gbr.fit(x, y)?;
                Estimator::Boosting(gbr)
            }
            ModelKind::LinearRidge => {
                let mut ridge = RidgeRegression::new(config.alpha);
                ridge.fit(x, y)?;
                Estimator::Ridge(ridge)
            }
        };
        let training_time_secs = start.elapsed().as_secs_f64();

        info!(
            model_kind = %config.kind,
            n_samples = x.nrows(),
            n_features = x.ncols(),
            training_time_secs,
            "Regressor fitted"
        );

        Ok(Self {
            config: config.clone(),
            n_features: x.ncols(),
            estimator,
            training_time_secs,
        })
    }

    /// Predict one feature vector; its length must equal the fitted dimensionality
    pub fn predict_one(&self, features: &[f64]) -> Result<f64> {
        if features.len() != self.n_features {
            return Err(PricingError::DimensionMismatch {
                expected: self.n_features,
                actual: features.len(),
            });
        }
        let row = ArrayView1::from(features);
        match &self.estimator {
            Estimator::Forest(m) => m.predict_row(row),
            Estimator::Boosting(m) => m.predict_row(row),
            Estimator::Ridge(m) => m.predict_row(row),
        }
    }

    /// Predict every row of `x`
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if x.ncols() != self.n_features {
            return Err(PricingError::DimensionMismatch {
                expected: self.n_features,
                actual: x.ncols(),
            });
        }
        match &self.estimator {
            Estimator::Forest(m) => m.predict(x),
            Estimator::Boosting(m) => m.predict(x),
            Estimator::Ridge(m) => m.predict(x),
        }
    }

    /// MAE, RMSE and R² on a held-out set
    pub fn evaluate(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<Metrics> {
        let predictions = self.predict(x)?;
        Metrics::compute(y, &predictions)
    }

    pub fn kind(&self) -> ModelKind {
        self.config.kind
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn estimator(&self) -> &Estimator {
        &self.estimator
    }

    pub fn training_time_secs(&self) -> f64 {
        self.training_time_secs
    }

    /// Normalised importances for tree models, |w| shares for ridge
    pub fn feature_importances(&self) -> Option<Vec<f64>> {
        match &self.estimator {
            Estimator::Forest(m) => m.feature_importances().map(|a| a.to_vec()),
            Estimator::Boosting(m) => Some(m.feature_importances().to_vec()),
            Estimator::Ridge(m) => m.coefficients.as_ref().map(|w| {
                let total: f64 = w.iter().map(|v| v.abs()).sum();
                w.iter().map(|v| if total > 0.0 { v.abs() / total } else { 0.0 }).collect()
            }),
        }
    }

    /// Persist under `artifact_id`, pairing the model with its encoder
    pub fn save_with_id(&self, path: impl AsRef<Path>, artifact_id: Uuid) -> Result<()> {
        save_artifact(path.as_ref(), ArtifactKind::Model, artifact_id, self)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.save_with_id(path, Uuid::new_v4())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let (_, model) = load_artifact::<Self>(path.as_ref(), ArtifactKind::Model)?;
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((80, 3), |(i, j)| ((i * (j + 5) + 3 * j) % 13) as f64 - 6.0);
        let y = x.column(0).mapv(|v| 4.0 * v) + &x.column(1) + 50.0;
        (x, y)
    }

    #[test]
    fn test_every_kind_fits_and_predicts() {
        let (x, y) = data();
        for config in [
            ModelConfig::random_forest(15, Some(8)),
            ModelConfig::gradient_boosting(40, 0.2, 3),
            ModelConfig::ridge(0.1),
        ] {
            let model = Regressor::fit(&x, &y, &config).unwrap();
            assert_eq!(model.kind(), config.kind);
            assert_eq!(model.n_features(), 3);
            let metrics = model.evaluate(&x, &y).unwrap();
            assert!(metrics.r2 > 0.7, "{} r2 = {}", config.kind, metrics.r2);

            let single = model.predict_one(x.row(5).as_slice().unwrap()).unwrap();
            let batch = model.predict(&x).unwrap();
            assert!((single - batch[5]).abs() < 1e-9);
        }
    }

    #[test]
    fn test_dimension_mismatch() {
        let (x, y) = data();
        let model = Regressor::fit(&x, &y, &ModelConfig::ridge(1.0)).unwrap();
        let err = model.predict_one(&[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, PricingError::DimensionMismatch { expected: 3, actual: 2 }));
        assert!(matches!(
            model.predict(&Array2::zeros((2, 4))),
            Err(PricingError::DimensionMismatch { expected: 3, actual: 4 })
        ));
    }

    #[test]
    fn test_fit_is_deterministic() {
        let (x, y) = data();
        let config = ModelConfig::random_forest(10, Some(5)).with_seed(9);
        let a = Regressor::fit(&x, &y, &config).unwrap();
        let b = Regressor::fit(&x, &y, &config).unwrap();
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        let (x, y) = data();
        let model = Regressor::fit(&x, &y, &ModelConfig::gradient_boosting(10, 0.1, 2)).unwrap();
        model.save(&path).unwrap();
        let loaded = Regressor::load(&path).unwrap();
        assert_eq!(loaded.predict(&x).unwrap(), model.predict(&x).unwrap());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let (x, y) = data();
        assert!(Regressor::fit(&x, &y, &ModelConfig::ridge(-2.0)).is_err());
    }
}
