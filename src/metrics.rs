//! Regression metrics.
//!
//! All metrics take `(y_true, y_pred)` and are lower-is-better.

use ndarray::ArrayView1;

use crate::error::{PipelineError, Result};

/// Namespace for regression metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct Metrics;

impl Metrics {
    /// Mean squared error: `mean((y_true - y_pred)²)`.
    pub fn mse(y_true: ArrayView1<f64>, y_pred: ArrayView1<f64>) -> Result<f64> {
        check(&y_true, &y_pred)?;
        let sum_sq: f64 = y_true
            .iter()
            .zip(y_pred.iter())
            .map(|(t, p)| {
                let diff = t - p;
                diff * diff
            })
            .sum();
        Ok(sum_sq / y_true.len() as f64)
    }

    /// Root mean squared error: `sqrt(mse)`. Always `>= 0`.
    ///
    /// # Errors
    /// - [`PipelineError::ShapeMismatch`] for vectors of different length.
    /// - [`PipelineError::EmptyData`] for empty vectors.
    /// - [`PipelineError::Numerical`] if either vector holds NaN or infinity.
    pub fn rmse(y_true: ArrayView1<f64>, y_pred: ArrayView1<f64>) -> Result<f64> {
        Self::mse(y_true, y_pred).map(f64::sqrt)
    }

    /// Mean absolute error: `mean(|y_true - y_pred|)`.
    pub fn mae(y_true: ArrayView1<f64>, y_pred: ArrayView1<f64>) -> Result<f64> {
        check(&y_true, &y_pred)?;
        let sum_abs: f64 = y_true
            .iter()
            .zip(y_pred.iter())
            .map(|(t, p)| (t - p).abs())
            .sum();
        Ok(sum_abs / y_true.len() as f64)
    }
}

fn check(y_true: &ArrayView1<f64>, y_pred: &ArrayView1<f64>) -> Result<()> {
    if y_true.len() != y_pred.len() {
        return Err(PipelineError::ShapeMismatch {
            context: "metric inputs",
            expected: y_true.len(),
            got: y_pred.len(),
        });
    }
    if y_true.is_empty() {
        return Err(PipelineError::EmptyData(
            "cannot compute a metric on empty vectors".to_string(),
        ));
    }
    if y_true.iter().chain(y_pred.iter()).any(|v| !v.is_finite()) {
        return Err(PipelineError::Numerical(
            "metric inputs contain non-finite values".to_string(),
        ));
    }
    Ok(())
}
