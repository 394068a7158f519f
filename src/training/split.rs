//! Seeded train/test holdout split

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::error::{PricingError, Result};

/// Row indices of one train/test partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldoutSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
}

impl HoldoutSplit {
    /// Shuffle `0..n_samples` with `seed` and hold out `ceil(n * test_ratio)` rows.
    ///
    /// The same `(n_samples, test_ratio, seed)` always yields the same partition.
    pub fn new(n_samples: usize, test_ratio: f64, seed: u64) -> Result<Self> {
        if !(test_ratio > 0.0 && test_ratio < 1.0) {
            return Err(PricingError::ConfigError(format!(
                "test_ratio must be in (0, 1), got {}",
                test_ratio
            )));
        }
        if n_samples < 2 {
            return Err(PricingError::InvalidInput(format!(
                "need at least 2 examples to split, got {}",
                n_samples
            )));
        }

        let n_test = ((n_samples as f64 * test_ratio).ceil() as usize).clamp(1, n_samples - 1);

        let mut indices: Vec<usize> = (0..n_samples).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        indices.shuffle(&mut rng);

        let train_indices = indices.split_off(n_test);
        Ok(Self { train_indices, test_indices: indices })
    }

    /// Pick the elements of `items` belonging to each side
    pub fn apply<T: Clone>(&self, items: &[T]) -> (Vec<T>, Vec<T>) {
        let pick = |idx: &[usize]| -> Vec<T> { idx.iter().map(|&i| items[i].clone()).collect() };
        (pick(&self.train_indices), pick(&self.test_indices))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_partition_sizes_and_disjointness() {
        let split = HoldoutSplit::new(1000, 0.2, 42).unwrap();
        assert_eq!(split.test_indices.len(), 200);
        assert_eq!(split.train_indices.len(), 800);

        let all: HashSet<usize> = split.train_indices.iter().chain(&split.test_indices).copied().collect();
        assert_eq!(all.len(), 1000);
    }

    #[test]
    fn test_split_is_reproducible() {
        assert_eq!(HoldoutSplit::new(50, 0.2, 42).unwrap(), HoldoutSplit::new(50, 0.2, 42).unwrap());
        assert_ne!(HoldoutSplit::new(50, 0.2, 42).unwrap(), HoldoutSplit::new(50, 0.2, 7).unwrap());
    }

    #[test]
    fn test_split_shuffles() {
        let split = HoldoutSplit::new(100, 0.2, 42).unwrap();
        let tail: Vec<usize> = (80..100).collect();
        assert_ne!(split.test_indices, tail);
    }

    #[test]
    fn test_apply_and_bounds() {
        let split = HoldoutSplit::new(3, 0.5, 1).unwrap();
        let (train, test) = split.apply(&["a", "b", "c"]);
        assert_eq!(train.len() + test.len(), 3);
        assert!(!train.is_empty() && !test.is_empty());

        assert!(HoldoutSplit::new(1, 0.2, 42).is_err());
        assert!(HoldoutSplit::new(10, 0.0, 42).is_err());
    }
}
