//! Regression metrics on held-out data

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::{PricingError, Result};

/// MAE, RMSE and R² of one evaluation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// Mean Absolute Error
    pub mae: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Coefficient of determination
    pub r2: f64,
    /// Number of evaluated samples
    pub n_samples: usize,
}

impl Metrics {
    /// Compute metrics for predictions against ground truth.
    ///
    /// A constant target gives R² = 1 for a perfect fit and 0 otherwise.
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<Self> {
        if y_true.len() != y_pred.len() {
            return Err(PricingError::InvalidInput(format!(
                "{} targets but {} predictions",
                y_true.len(),
                y_pred.len()
            )));
        }
        if y_true.is_empty() {
            return Err(PricingError::InvalidInput("cannot evaluate on zero samples".to_string()));
        }

        let n = y_true.len() as f64;
        let mean = y_true.sum() / n;

        let (abs_sum, sq_sum, ss_tot) = y_true.iter().zip(y_pred.iter()).fold(
            (0.0, 0.0, 0.0),
            |(a, s, t), (yt, yp)| {
                let e = yt - yp;
                (a + e.abs(), s + e * e, t + (yt - mean).powi(2))
            },
        );

        let r2 = if ss_tot == 0.0 {
            if sq_sum == 0.0 { 1.0 } else { 0.0 }
        } else {
            1.0 - sq_sum / ss_tot
        };

        Ok(Self {
            mae: abs_sum / n,
            rmse: (sq_sum / n).sqrt(),
            r2,
            n_samples: y_true.len(),
        })
    }
}

impl std::fmt::Display for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MAE={:.2} RMSE={:.2} R²={:.4}", self.mae, self.rmse, self.r2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_known_values() {
        let y_true = array![3.0, -0.5, 2.0, 7.0];
        let y_pred = array![2.5, 0.0, 2.0, 8.0];
        let m = Metrics::compute(&y_true, &y_pred).unwrap();
        assert!((m.mae - 0.5).abs() < 1e-12);
        assert!((m.rmse - 0.375f64.sqrt()).abs() < 1e-12);
        assert!((m.r2 - 0.948_608_137_044_967_9).abs() < 1e-9);
        assert_eq!(m.n_samples, 4);
    }

    #[test]
    fn test_constant_target() {
        let y = array![5.0, 5.0];
        assert_eq!(Metrics::compute(&y, &y).unwrap().r2, 1.0);
        assert_eq!(Metrics::compute(&y, &array![4.0, 6.0]).unwrap().r2, 0.0);
    }

    #[test]
    fn test_mismatch_and_empty() {
        assert!(Metrics::compute(&array![1.0], &array![1.0, 2.0]).is_err());
        let empty = Array1::<f64>::zeros(0);
        assert!(Metrics::compute(&empty, &empty).is_err());
    }
}
