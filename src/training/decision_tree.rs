//! CART regression tree (variance reduction)

use crate::error::{PricingError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Decision tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf { value: f64, n_samples: usize },
    /// Internal node; rows with `x[feature_idx] <= threshold` go left
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
    },
}

impl TreeNode {
    fn predict(&self, row: ArrayView1<f64>) -> f64 {
        let mut node = self;
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                    node = if row[*feature_idx] <= *threshold { left } else { right };
                }
            }
        }
    }

    fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

/// Best split candidate for one feature
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
}

/// Regression tree minimising squared error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    /// Maximum depth; `None` grows until leaves are pure or too small
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features drawn at random per node; `None` uses all
    pub max_features: Option<usize>,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTree {
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            n_features: 0,
            feature_importances: None,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    /// Set number of features sampled at each node
    pub fn with_max_features(mut self, max_features: Option<usize>) -> Self {
        self.max_features = max_features;
        self
    }

    /// Fit the tree; feature sampling (if any) uses a fixed seed
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        self.fit_with_rng(x, y, &mut rng)
    }

    /// Fit the tree drawing per-node feature subsets from `rng`
    pub fn fit_with_rng<R: Rng>(&mut self, x: &Array2<f64>, y: &Array1<f64>, rng: &mut R) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(PricingError::InvalidInput(format!(
                "feature matrix has {} rows but {} targets",
                n_samples,
                y.len()
            )));
        }
        if n_samples == 0 || n_features == 0 {
            return Err(PricingError::InvalidInput("cannot fit a tree on an empty matrix".to_string()));
        }

        self.n_features = n_features;
        let mut importances = vec![0.0; n_features];
        let indices: Vec<usize> = (0..n_samples).collect();
        self.root = Some(self.build_tree(x, y, &indices, 0, &mut importances, rng));

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));
        Ok(self)
    }

    fn build_tree<R: Rng>(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        depth: usize,
        importances: &mut [f64],
        rng: &mut R,
    ) -> TreeNode {
        let n_samples = indices.len();
        let (sum, sq_sum) = indices.iter().fold((0.0, 0.0), |(s, q), &i| (s + y[i], q + y[i] * y[i]));
        let mean = sum / n_samples as f64;
        let sse = sq_sum - sum * sum / n_samples as f64;

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || sse <= 1e-12 * sq_sum.max(1.0);

        if should_stop {
            return TreeNode::Leaf { value: mean, n_samples };
        }

        let candidates = self.candidate_features(rng);
        let best = match self.find_best_split(x, y, indices, sse, &candidates) {
            Some(best) => best,
            None => return TreeNode::Leaf { value: mean, n_samples },
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, best.feature_idx]] <= best.threshold);

        importances[best.feature_idx] += best.gain;

        let left = Box::new(self.build_tree(x, y, &left_indices, depth + 1, importances, rng));
        let right = Box::new(self.build_tree(x, y, &right_indices, depth + 1, importances, rng));

        TreeNode::Split {
            feature_idx: best.feature_idx,
            threshold: best.threshold,
            left,
            right,
            n_samples,
        }
    }

    fn candidate_features<R: Rng>(&self, rng: &mut R) -> Vec<usize> {
        match self.max_features {
            Some(k) if k > 0 && k < self.n_features => {
                let mut picked = sample(rng, self.n_features, k).into_vec();
                picked.sort_unstable();
                picked
            }
            _ => (0..self.n_features).collect(),
        }
    }

    /// Sort each candidate feature once and scan prefix sums for the SSE-optimal threshold
    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        parent_sse: f64,
        candidates: &[usize],
    ) -> Option<SplitCandidate> {
        let n = indices.len();
        let min_leaf = self.min_samples_leaf;

        let feature_results: Vec<Option<SplitCandidate>> = candidates
            .par_iter()
            .map(|&feature_idx| {
                let mut pairs: Vec<(f64, f64)> = indices.iter().map(|&i| (x[[i, feature_idx]], y[i])).collect();
                pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

                let total_sum: f64 = pairs.iter().map(|p| p.1).sum();
                let total_sq: f64 = pairs.iter().map(|p| p.1 * p.1).sum();

                let mut left_sum = 0.0;
                let mut left_sq = 0.0;
                let mut best: Option<SplitCandidate> = None;

                for i in 0..n - 1 {
                    let (xi, yi) = pairs[i];
                    left_sum += yi;
                    left_sq += yi * yi;

                    let left_count = i + 1;
                    let right_count = n - left_count;
                    if left_count < min_leaf || right_count < min_leaf {
                        continue;
                    }
                    let next = pairs[i + 1].0;
                    if next <= xi {
                        continue;
                    }

                    let right_sum = total_sum - left_sum;
                    let right_sq = total_sq - left_sq;
                    let child_sse = (left_sq - left_sum * left_sum / left_count as f64)
                        + (right_sq - right_sum * right_sum / right_count as f64);
                    let gain = parent_sse - child_sse;

                    if gain > best.as_ref().map_or(0.0, |b| b.gain) {
                        best = Some(SplitCandidate {
                            feature_idx,
                            threshold: (xi + next) / 2.0,
                            gain,
                        });
                    }
                }
                best
            })
            .collect();

        // first feature wins ties so the result does not depend on scheduling
        feature_results.into_iter().flatten().fold(None, |acc: Option<SplitCandidate>, c| match acc {
            Some(a) if a.gain >= c.gain => Some(a),
            _ => Some(c),
        })
    }

    /// Predict a single encoded row
    pub fn predict_row(&self, row: ArrayView1<f64>) -> Result<f64> {
        let root = self.root.as_ref().ok_or_else(|| PricingError::NotFitted("decision tree".to_string()))?;
        Ok(root.predict(row))
    }

    /// Predict every row of `x`
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or_else(|| PricingError::NotFitted("decision tree".to_string()))?;
        Ok(x.outer_iter().map(|row| root.predict(row)).collect())
    }

    pub fn is_fitted(&self) -> bool {
        self.root.is_some()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Depth of the fitted tree
    pub fn depth(&self) -> usize {
        self.root.as_ref().map_or(0, TreeNode::depth)
    }

    /// Normalised variance-reduction importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_step_function() {
        let x = array![[1.0], [2.0], [3.0], [10.0], [11.0], [12.0]];
        let y = array![5.0, 5.0, 5.0, 20.0, 20.0, 20.0];
        let mut tree = DecisionTree::new();
        tree.fit(&x, &y).unwrap();

        let preds = tree.predict(&x).unwrap();
        for (p, t) in preds.iter().zip(y.iter()) {
            assert!((p - t).abs() < 1e-9);
        }
        assert_eq!(tree.depth(), 1);
        assert!((tree.predict_row(array![6.4].view()).unwrap() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_max_depth_limits_tree() {
        let x = Array2::from_shape_fn((32, 1), |(i, _)| i as f64);
        let y = Array1::from_shape_fn(32, |i| (i * i) as f64);
        let mut tree = DecisionTree::new().with_max_depth(Some(2));
        tree.fit(&x, &y).unwrap();
        assert!(tree.depth() <= 2);
    }

    #[test]
    fn test_importance_points_at_informative_feature() {
        let x = Array2::from_shape_fn((40, 3), |(i, j)| if j == 1 { (i % 2) as f64 } else { ((i * 7 + j) % 5) as f64 });
        let y = Array1::from_shape_fn(40, |i| if i % 2 == 0 { 0.0 } else { 100.0 });
        let mut tree = DecisionTree::new();
        tree.fit(&x, &y).unwrap();
        let imp = tree.feature_importances().unwrap();
        assert!(imp[1] > 0.99);
    }

    #[test]
    fn test_unfitted_and_shape_errors() {
        let tree = DecisionTree::new();
        assert!(matches!(tree.predict_row(array![1.0].view()), Err(PricingError::NotFitted(_))));

        let mut tree = DecisionTree::new();
        let err = tree.fit(&array![[1.0], [2.0]], &array![1.0]).unwrap_err();
        assert!(matches!(err, PricingError::InvalidInput(_)));
    }

    #[test]
    fn test_feature_subsampling_is_seeded() {
        let x = Array2::from_shape_fn((50, 4), |(i, j)| ((i * (j + 3)) % 11) as f64);
        let y = Array1::from_shape_fn(50, |i| (i % 7) as f64);
        let fit = |seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let mut tree = DecisionTree::new().with_max_features(Some(2));
            tree.fit_with_rng(&x, &y, &mut rng).unwrap();
            tree
        };
        assert_eq!(fit(7), fit(7));
    }
}
