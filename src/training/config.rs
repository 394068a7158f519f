//! Training configuration

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

use crate::error::{PricingError, Result};

/// Regressor family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Bagged regression trees (random forest)
    EnsembleTrees,
    /// Gradient boosted regression trees
    GradientBoostedTrees,
    /// L2-regularized linear regression
    LinearRidge,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::EnsembleTrees => "ensemble_trees",
            ModelKind::GradientBoostedTrees => "gradient_boosted_trees",
            ModelKind::LinearRidge => "linear_ridge",
        }
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = PricingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ensemble_trees" | "random_forest" | "rf" => Ok(ModelKind::EnsembleTrees),
            "gradient_boosted_trees" | "gradient_boosting" | "gbt" => Ok(ModelKind::GradientBoostedTrees),
            "linear_ridge" | "ridge" => Ok(ModelKind::LinearRidge),
            other => Err(PricingError::ConfigError(format!("unknown model kind: {}", other))),
        }
    }
}

/// Model kind plus its hyperparameters.
///
/// Fields a kind does not use are ignored by it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub kind: ModelKind,
    /// Trees in the forest or boosting rounds
    pub n_estimators: usize,
    /// Tree depth limit; `None` grows trees fully
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Boosting shrinkage
    pub learning_rate: f64,
    /// Boosting row subsample ratio
    pub subsample: f64,
    /// Ridge regularization strength
    pub alpha: f64,
    /// Seed for bootstrap, subsampling and feature sampling
    pub seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::random_forest(100, Some(15))
    }
}

impl ModelConfig {
    fn base(kind: ModelKind) -> Self {
        Self {
            kind,
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            learning_rate: 0.1,
            subsample: 1.0,
            alpha: 1.0,
            seed: 42,
        }
    }

    pub fn random_forest(n_estimators: usize, max_depth: Option<usize>) -> Self {
        Self { n_estimators, max_depth, ..Self::base(ModelKind::EnsembleTrees) }
    }

    pub fn gradient_boosting(n_estimators: usize, learning_rate: f64, max_depth: usize) -> Self {
        Self {
            n_estimators,
            learning_rate,
            max_depth: Some(max_depth),
            ..Self::base(ModelKind::GradientBoostedTrees)
        }
    }

    pub fn ridge(alpha: f64) -> Self {
        Self { alpha, ..Self::base(ModelKind::LinearRidge) }
    }

    /// Defaults for `kind`
    pub fn for_kind(kind: ModelKind) -> Self {
        match kind {
            ModelKind::EnsembleTrees => Self::random_forest(100, None),
            ModelKind::GradientBoostedTrees => Self::gradient_boosting(100, 0.1, 3),
            ModelKind::LinearRidge => Self::ridge(1.0),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_min_samples_leaf(mut self, n: usize) -> Self {
        self.min_samples_leaf = n;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_subsample(mut self, subsample: f64) -> Self {
        self.subsample = subsample;
        self
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Reject hyperparameters no regressor can train with
    pub fn validate(&self) -> Result<()> {
        let invalid = |name: &str, value: String, reason: &str| -> Result<()> {
            Err(PricingError::ConfigError(format!("{} = {}: {}", name, value, reason)))
        };
        match self.kind {
            ModelKind::EnsembleTrees | ModelKind::GradientBoostedTrees if self.n_estimators == 0 => {
                invalid("n_estimators", self.n_estimators.to_string(), "must be at least 1")
            }
            ModelKind::GradientBoostedTrees if !(self.learning_rate > 0.0) => {
                invalid("learning_rate", self.learning_rate.to_string(), "must be positive")
            }
            ModelKind::GradientBoostedTrees if !(self.subsample > 0.0 && self.subsample <= 1.0) => {
                invalid("subsample", self.subsample.to_string(), "must be in (0, 1]")
            }
            ModelKind::LinearRidge if !(self.alpha >= 0.0) => {
                invalid("alpha", self.alpha.to_string(), "must be non-negative")
            }
            _ => Ok(()),
        }
    }

    /// Hyperparameters relevant to this kind, for reporting
    pub fn params(&self) -> serde_json::Map<String, serde_json::Value> {
        use serde_json::json;
        let mut params = serde_json::Map::new();
        match self.kind {
            ModelKind::EnsembleTrees => {
                params.insert("n_estimators".into(), json!(self.n_estimators));
                params.insert("max_depth".into(), json!(self.max_depth));
                params.insert("min_samples_split".into(), json!(self.min_samples_split));
                params.insert("min_samples_leaf".into(), json!(self.min_samples_leaf));
            }
            ModelKind::GradientBoostedTrees => {
                params.insert("n_estimators".into(), json!(self.n_estimators));
                params.insert("learning_rate".into(), json!(self.learning_rate));
                params.insert("max_depth".into(), json!(self.max_depth));
                params.insert("subsample".into(), json!(self.subsample));
            }
            ModelKind::LinearRidge => {
                params.insert("alpha".into(), json!(self.alpha));
            }
        }
        params.insert("seed".into(), json!(self.seed));
        params
    }
}

/// Configuration of one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub model: ModelConfig,
    /// Fraction of examples held out for evaluation
    pub test_ratio: f64,
    /// Seed of the train/test shuffle
    pub split_seed: u64,
    /// Experiment name recorded by the tracker
    pub experiment_name: String,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            test_ratio: 0.2,
            split_seed: 42,
            experiment_name: "car_price_prediction".to_string(),
        }
    }
}

impl TrainingConfig {
    pub fn new(model: ModelConfig) -> Self {
        Self { model, ..Default::default() }
    }

    pub fn with_test_ratio(mut self, ratio: f64) -> Self {
        self.test_ratio = ratio;
        self
    }

    pub fn with_split_seed(mut self, seed: u64) -> Self {
        self.split_seed = seed;
        self
    }

    pub fn with_experiment_name(mut self, name: impl Into<String>) -> Self {
        self.experiment_name = name.into();
        self
    }

    /// Load a JSON config; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.test_ratio > 0.0 && self.test_ratio < 1.0) {
            return Err(PricingError::ConfigError(format!(
                "test_ratio must be in (0, 1), got {}",
                self.test_ratio
            )));
        }
        self.model.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TrainingConfig::default();
        assert_eq!(config.model.kind, ModelKind::EnsembleTrees);
        assert_eq!(config.model.n_estimators, 100);
        assert_eq!(config.model.max_depth, Some(15));
        assert_eq!(config.test_ratio, 0.2);
        assert_eq!(config.split_seed, 42);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("random_forest".parse::<ModelKind>().unwrap(), ModelKind::EnsembleTrees);
        assert_eq!("GBT".parse::<ModelKind>().unwrap(), ModelKind::GradientBoostedTrees);
        assert_eq!("ridge".parse::<ModelKind>().unwrap(), ModelKind::LinearRidge);
        assert!("svm".parse::<ModelKind>().is_err());
        assert_eq!(serde_json::to_string(&ModelKind::LinearRidge).unwrap(), "\"linear_ridge\"");
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: TrainingConfig =
            serde_json::from_str(r#"{"model": {"kind": "linear_ridge", "alpha": 0.5}}"#).unwrap();
        assert_eq!(config.model.kind, ModelKind::LinearRidge);
        assert_eq!(config.model.alpha, 0.5);
        assert_eq!(config.test_ratio, 0.2);
    }

    #[test]
    fn test_validation() {
        assert!(ModelConfig::gradient_boosting(10, 0.0, 3).validate().is_err());
        assert!(ModelConfig::ridge(-1.0).validate().is_err());
        assert!(ModelConfig::random_forest(0, None).validate().is_err());
        assert!(TrainingConfig::default().with_test_ratio(1.0).validate().is_err());
    }
}
