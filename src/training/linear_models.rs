//! Ridge regression via the regularised normal equations

use crate::error::{PricingError, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

/// Solve `A x = b` for symmetric positive definite `A` using Cholesky decomposition
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return None;
    }

    // A = L * L^T
    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let sum: f64 = (0..j).map(|k| l[[i, k]] * l[[j, k]]).sum();
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    // L * y = b
    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let sum: f64 = (0..i).map(|j| l[[i, j]] * y[j]).sum();
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    // L^T * x = y
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let sum: f64 = ((i + 1)..n).map(|j| l[[j, i]] * x[j]).sum();
        x[i] = (y[i] - sum) / l[[i, i]];
    }

    Some(x)
}

/// Gaussian elimination with partial pivoting, used when Cholesky fails
fn gauss_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    let mut aug = Array2::<f64>::zeros((n, n + 1));
    aug.slice_mut(ndarray::s![.., ..n]).assign(a);
    aug.column_mut(n).assign(b);

    for col in 0..n {
        let pivot_row = (col..n).max_by(|&r1, &r2| {
            aug[[r1, col]].abs().partial_cmp(&aug[[r2, col]].abs()).unwrap_or(std::cmp::Ordering::Equal)
        })?;
        if aug[[pivot_row, col]].abs() < 1e-12 {
            return None;
        }
        if pivot_row != col {
            for j in 0..=n {
                aug.swap([col, j], [pivot_row, j]);
            }
        }
        for row in (col + 1)..n {
            let factor = aug[[row, col]] / aug[[col, col]];
            for j in col..=n {
                aug[[row, j]] -= factor * aug[[col, j]];
            }
        }
    }

    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let sum: f64 = ((i + 1)..n).map(|j| aug[[i, j]] * x[j]).sum();
        x[i] = (aug[[i, n]] - sum) / aug[[i, i]];
    }
    Some(x)
}

/// Ridge Regression (L2-regularized linear regression)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RidgeRegression {
    pub coefficients: Option<Array1<f64>>,
    pub intercept: f64,
    pub fit_intercept: bool,
    /// L2 regularization strength
    pub alpha: f64,
    is_fitted: bool,
}

impl Default for RidgeRegression {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl RidgeRegression {
    pub fn new(alpha: f64) -> Self {
        Self {
            coefficients: None,
            intercept: 0.0,
            fit_intercept: true,
            alpha,
            is_fitted: false,
        }
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_fit_intercept(mut self, fit_intercept: bool) -> Self {
        self.fit_intercept = fit_intercept;
        self
    }

    /// Solve `(XᵀX + αI) w = Xᵀy` on centred data
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
            return Err(PricingError::InvalidInput("cannot fit ridge on zero rows".to_string()));
        }
        if self.alpha < 0.0 {
            return Err(PricingError::ConfigError(format!("alpha must be non-negative, got {}", self.alpha)));
        }

        let (x_mean, y_mean) = if self.fit_intercept {
            let xm = x
                .mean_axis(Axis(0))
                .ok_or_else(|| PricingError::ComputationError("empty feature matrix".to_string()))?;
            (xm, y.mean().unwrap_or(0.0))
        } else {
            (Array1::zeros(n_features), 0.0)
        };
        let x_c = x - &x_mean.view().insert_axis(Axis(0));
        let y_c = y - y_mean;

        // Columns constant after centring carry no signal and keep weight 0,
        // which keeps the system solvable for alpha = 0.
        let active: Vec<usize> = (0..n_features)
            .filter(|&j| x_c.column(j).iter().any(|v| *v != 0.0))
            .collect();
        let x_a = x_c.select(Axis(1), &active);

        let mut xtx = x_a.t().dot(&x_a);
        for i in 0..active.len() {
            xtx[[i, i]] += self.alpha;
        }
        let xty = x_a.t().dot(&y_c);

        let solved = cholesky_solve(&xtx, &xty)
            .or_else(|| gauss_solve(&xtx, &xty))
            .ok_or_else(|| PricingError::ComputationError("singular normal equations".to_string()))?;
        let mut coefficients = Array1::zeros(n_features);
        for (&j, w) in active.iter().zip(solved.iter()) {
            coefficients[j] = *w;
        }

        self.intercept = y_mean - coefficients.dot(&x_mean);
        self.coefficients = Some(coefficients);
        self.is_fitted = true;
        Ok(self)
    }

    fn weights(&self) -> Result<&Array1<f64>> {
        self.coefficients
            .as_ref()
            .filter(|_| self.is_fitted)
            .ok_or_else(|| PricingError::NotFitted("ridge regression".to_string()))
    }

    pub fn predict_row(&self, row: ArrayView1<f64>) -> Result<f64> {
        Ok(row.dot(self.weights()?) + self.intercept)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(x.dot(self.weights()?) + self.intercept)
    }

    pub fn n_features(&self) -> usize {
        self.coefficients.as_ref().map_or(0, |c| c.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_ridge_recovers_linear_relation() {
        let x = array![[1.0, 2.0], [2.0, 1.0], [3.0, 4.0], [4.0, 3.0], [5.0, 5.0]];
        let y = x.column(0).mapv(|v| 2.0 * v) + &x.column(1).mapv(|v| -v) + 3.0;
        let mut ridge = RidgeRegression::new(1e-9);
        ridge.fit(&x, &y).unwrap();

        let w = ridge.coefficients.as_ref().unwrap();
        assert!((w[0] - 2.0).abs() < 1e-5);
        assert!((w[1] + 1.0).abs() < 1e-5);
        assert!((ridge.intercept - 3.0).abs() < 1e-5);
        assert!((ridge.predict_row(array![10.0, 0.0].view()).unwrap() - 23.0).abs() < 1e-4);
    }

    #[test]
    fn test_alpha_shrinks_weights() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![2.0, 4.0, 6.0, 8.0];
        let mut weak = RidgeRegression::new(0.0);
        let mut strong = RidgeRegression::new(100.0);
        weak.fit(&x, &y).unwrap();
        strong.fit(&x, &y).unwrap();
        let w_weak = weak.coefficients.as_ref().unwrap()[0];
        let w_strong = strong.coefficients.as_ref().unwrap()[0];
        assert!(w_strong < w_weak);
    }

    #[test]
    fn test_constant_column_is_solvable() {
        let x = array![[1.0, 7.0], [2.0, 7.0], [3.0, 7.0]];
        let y = array![1.0, 2.0, 3.0];
        let mut ridge = RidgeRegression::new(1.0);
        ridge.fit(&x, &y).unwrap();
        assert!(ridge.predict(&x).unwrap().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_unregularised_with_all_zero_column() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![2.0, 4.0, 6.0, 8.0];
        let mut ridge = RidgeRegression::new(0.0);
        ridge.fit(&x, &y).unwrap();

        let w = ridge.coefficients.as_ref().unwrap();
        assert!((w[0] - 2.0).abs() < 1e-9);
        assert_eq!(w[1], 0.0);
        assert!(ridge.intercept.abs() < 1e-9);
    }

    #[test]
    fn test_gauss_fallback() {
        let a = array![[0.0, 1.0], [1.0, 0.0]];
        let b = array![2.0, 3.0];
        assert!(cholesky_solve(&a, &b).is_none());
        let x = gauss_solve(&a, &b).unwrap();
        assert!((x[0] - 3.0).abs() < 1e-12 && (x[1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_unfitted() {
        let ridge = RidgeRegression::default();
        assert!(matches!(ridge.predict(&Array2::zeros((1, 2))), Err(PricingError::NotFitted(_))));
    }
}
