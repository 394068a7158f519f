//! Gradient boosted regression trees (squared loss)
//!
//! Each round fits a shallow tree to the current residuals and adds its
//! shrunken output to the running prediction of every training row.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use super::decision_tree::DecisionTree;
use crate::error::{PricingError, Result};

/// Gradient Boosting configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
    /// Row subsample ratio for each tree
    pub subsample: f64,
    /// Column subsample ratio for each tree
    pub colsample_bytree: f64,
    /// Random seed
    pub random_state: Option<u64>,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_split: 2,
            min_samples_leaf: 1,
            subsample: 1.0,
            colsample_bytree: 1.0,
            random_state: Some(42),
        }
    }
}

/// Gradient Boosting Regressor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostingRegressor {
    config: GradientBoostingConfig,
    trees: Vec<DecisionTree>,
    col_indices_per_tree: Vec<Vec<usize>>,
    initial_prediction: f64,
    feature_importances: Vec<f64>,
    train_loss: Vec<f64>,
    n_features: usize,
}

impl GradientBoostingRegressor {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            col_indices_per_tree: Vec::new(),
            initial_prediction: 0.0,
            feature_importances: Vec::new(),
            train_loss: Vec::new(),
            n_features: 0,
        }
    }

    /// Fit the boosted ensemble
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(PricingError::InvalidInput(format!(
                "feature matrix has {} rows but {} targets",
                n_samples,
                y.len()
            )));
        }
        if n_samples == 0 {
            return Err(PricingError::InvalidInput("cannot boost on zero rows".to_string()));
        }
        if !(self.config.learning_rate > 0.0) {
            return Err(PricingError::ConfigError(format!(
                "learning_rate must be positive, got {}",
                self.config.learning_rate
            )));
        }
        if !(self.config.subsample > 0.0 && self.config.subsample <= 1.0) {
            return Err(PricingError::ConfigError(format!(
                "subsample must be in (0, 1], got {}",
                self.config.subsample
            )));
        }

        self.n_features = n_features;
        self.trees.clear();
        self.col_indices_per_tree.clear();
        self.train_loss.clear();
        self.initial_prediction = y.mean().unwrap_or(0.0);

        let mut predictions = Array1::from_elem(n_samples, self.initial_prediction);
        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };
        self.feature_importances = vec![0.0; n_features];

        for _ in 0..self.config.n_estimators {
            let residuals: Array1<f64> = y
                .iter()
                .zip(predictions.iter())
                .map(|(yi, pi)| yi - pi)
                .collect();

            let sample_indices = sample_sorted(n_samples, self.config.subsample, &mut rng);
            let col_indices = sample_sorted(n_features, self.config.colsample_bytree, &mut rng);

            let x_sub = x.select(Axis(0), &sample_indices).select(Axis(1), &col_indices);
            let y_sub: Array1<f64> = sample_indices.iter().map(|&i| residuals[i]).collect();

            let mut tree = DecisionTree::new()
                .with_max_depth(Some(self.config.max_depth))
                .with_min_samples_split(self.config.min_samples_split)
                .with_min_samples_leaf(self.config.min_samples_leaf);
            tree.fit(&x_sub, &y_sub)?;

            // every row moves, not only the sampled ones
            let tree_pred = tree.predict(&x.select(Axis(1), &col_indices))?;
            predictions.scaled_add(self.config.learning_rate, &tree_pred);

            if let Some(tree_importance) = tree.feature_importances() {
                for (j, &col_idx) in col_indices.iter().enumerate() {
                    self.feature_importances[col_idx] += tree_importance[j];
                }
            }

            let mse = y
                .iter()
                .zip(predictions.iter())
                .map(|(yi, pi)| (yi - pi).powi(2))
                .sum::<f64>()
                / n_samples as f64;
            self.train_loss.push(mse);

            self.trees.push(tree);
            self.col_indices_per_tree.push(col_indices);
        }

        let total: f64 = self.feature_importances.iter().sum();
        if total > 0.0 {
            for imp in &mut self.feature_importances {
                *imp /= total;
            }
        }

        Ok(self)
    }

    /// Predict one encoded row
    pub fn predict_row(&self, row: ArrayView1<f64>) -> Result<f64> {
        if self.trees.is_empty() && self.config.n_estimators > 0 {
            return Err(PricingError::NotFitted("gradient boosting".to_string()));
        }
        let mut prediction = self.initial_prediction;
        for (tree, col_indices) in self.trees.iter().zip(&self.col_indices_per_tree) {
            let sub = row.select(Axis(0), col_indices);
            prediction += self.config.learning_rate * tree.predict_row(sub.view())?;
        }
        Ok(prediction)
    }

    /// Make predictions
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() && self.config.n_estimators > 0 {
            return Err(PricingError::NotFitted("gradient boosting".to_string()));
        }
        let mut predictions = Array1::from_elem(x.nrows(), self.initial_prediction);
        for (tree, col_indices) in self.trees.iter().zip(&self.col_indices_per_tree) {
            let tree_pred = tree.predict(&x.select(Axis(1), col_indices))?;
            predictions.scaled_add(self.config.learning_rate, &tree_pred);
        }
        Ok(predictions)
    }

    pub fn config(&self) -> &GradientBoostingConfig {
        &self.config
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Training MSE after each round
    pub fn train_loss(&self) -> &[f64] {
        &self.train_loss
    }

    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }
}

/// Sorted random subset of `0..n` of size `ceil(n * ratio)`
fn sample_sorted(n: usize, ratio: f64, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..n).collect();
    if ratio >= 1.0 {
        return indices;
    }
    let size = ((n as f64) * ratio).ceil().max(1.0) as usize;
    indices.shuffle(rng);
    indices.truncate(size);
    indices.sort_unstable();
    indices
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((200, 2), |(i, j)| ((i * (3 + j)) % 23) as f64);
        let y = x.column(0).mapv(|v| 10.0 * v) - &x.column(1);
        (x, y)
    }

    #[test]
    fn test_loss_decreases() {
        let (x, y) = data();
        let mut gbr = GradientBoostingRegressor::new(GradientBoostingConfig {
            n_estimators: 30,
            ..Default::default()
        });
        gbr.fit(&x, &y).unwrap();
        let loss = gbr.train_loss();
        assert_eq!(loss.len(), 30);
        assert!(loss[29] < loss[0] * 0.5);
    }

    #[test]
    fn test_predict_row_matches_matrix() {
        let (x, y) = data();
        let mut gbr = GradientBoostingRegressor::new(GradientBoostingConfig {
            n_estimators: 10,
            subsample: 0.7,
            colsample_bytree: 0.5,
            ..Default::default()
        });
        gbr.fit(&x, &y).unwrap();
        let batch = gbr.predict(&x).unwrap();
        for i in [0, 17, 199] {
            let single = gbr.predict_row(x.row(i)).unwrap();
            assert!((single - batch[i]).abs() < 1e-9);
        }
    }

    #[test]
    fn test_seeded_fit_is_deterministic() {
        let (x, y) = data();
        let config = GradientBoostingConfig { n_estimators: 15, subsample: 0.8, ..Default::default() };
        let mut a = GradientBoostingRegressor::new(config.clone());
        let mut b = GradientBoostingRegressor::new(config);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn test_rejects_bad_learning_rate() {
        let (x, y) = data();
        let mut gbr = GradientBoostingRegressor::new(GradientBoostingConfig {
            learning_rate: 0.0,
            ..Default::default()
        });
        assert!(matches!(gbr.fit(&x, &y), Err(PricingError::ConfigError(_))));
    }
}
