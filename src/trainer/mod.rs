//! Ordinary least squares trainer.
//!
//! Solves `min ||X w + b - y||²` with conjugate gradient on the normal
//! equations (CGLS). With `fit_intercept` the columns of `X` are centred
//! implicitly, so the sparse matrix is never densified:
//!
//! - `A v  = X v - 1 (m · v)`
//! - `Aᵀ u = Xᵀ u - m Σu`
//!
//! where `m` holds the column means. The intercept is then `ȳ - m · w`.
//!
//! CGLS started from zero stays in the row space of `A`, so rank-deficient
//! problems (one-hot blocks always are) converge to the minimum-norm
//! solution. Runs are deterministic for a given input.

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::backend::CsrMatrix;
use crate::error::{PipelineError, Result};
use crate::model::LinearModel;

/// Default relative tolerance on the normal-equation residual `||Aᵀr||`.
pub const DEFAULT_TOL: f64 = 1e-10;

/// Lower bound on the derived iteration limit.
const MIN_ITER: usize = 50;

/// Iterations between debug log lines.
const LOG_EVERY: usize = 100;

/// Solver settings for ordinary least squares.
///
/// Once built via [`LinearRegressionBuilder`] it is immutable and can be
/// reused for any number of fits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearRegression {
    pub fit_intercept: bool,
    pub tol: f64,
    /// `None` derives the limit from the number of features.
    pub max_iter: Option<usize>,
}

impl Default for LinearRegression {
    fn default() -> Self {
        Self {
            fit_intercept: true,
            tol: DEFAULT_TOL,
            max_iter: None,
        }
    }
}

/// Fluent builder for [`LinearRegression`].
///
/// Defaults:
/// - `fit_intercept`: true
/// - `tol`: 1e-10
/// - `max_iter`: `max(2 * n_features, 50)`
#[derive(Clone, Debug, Default)]
pub struct LinearRegressionBuilder {
    inner: LinearRegression,
}

impl LinearRegressionBuilder {
    pub fn fit_intercept(mut self, fit_intercept: bool) -> Self {
        self.inner.fit_intercept = fit_intercept;
        self
    }

    pub fn tol(mut self, tol: f64) -> Self {
        self.inner.tol = tol;
        self
    }

    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.inner.max_iter = Some(max_iter);
        self
    }

    pub fn build(self) -> Result<LinearRegression> {
        self.inner.validate()?;
        Ok(self.inner)
    }
}

/// Convergence details of a single fit.
#[derive(Clone, Debug, PartialEq)]
pub struct SolverReport {
    pub iterations: usize,
    pub converged: bool,
    /// `||Aᵀr|| / ||Aᵀb||` at exit.
    pub relative_residual: f64,
}

/// The regression problem as seen by CGLS.
struct CenteredOperator<'a> {
    x: &'a CsrMatrix,
    means: Option<Array1<f64>>,
}

impl CenteredOperator<'_> {
    fn apply(&self, v: &Array1<f64>) -> Result<Array1<f64>> {
        let mut out = self.x.dot(v)?;
        if let Some(m) = &self.means {
            out -= m.dot(v);
        }
        Ok(out)
    }

    fn apply_t(&self, u: &Array1<f64>) -> Result<Array1<f64>> {
        let mut out = self.x.tdot(u)?;
        if let Some(m) = &self.means {
            out.scaled_add(-u.sum(), m);
        }
        Ok(out)
    }
}

impl LinearRegression {
    /// Starts the builder pattern.
    pub fn builder() -> LinearRegressionBuilder {
        LinearRegressionBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.tol.is_finite() && self.tol >= 0.0) {
            return Err(PipelineError::InvalidParameter(format!(
                "tol must be a non-negative finite number, got {}",
                self.tol
            )));
        }
        if self.max_iter == Some(0) {
            return Err(PipelineError::InvalidParameter(
                "max_iter must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Fit OLS on `x` and `y`.
    ///
    /// The returned model is bound to the feature space `x` is tagged with.
    ///
    /// # Errors
    /// - [`PipelineError::ShapeMismatch`] if `x` and `y` differ in rows.
    /// - [`PipelineError::EmptyData`] for zero rows.
    /// - [`PipelineError::Numerical`] for non-finite targets or features.
    pub fn fit(&self, x: &CsrMatrix, y: &Array1<f64>) -> Result<LinearModel> {
        self.fit_with_report(x, y).map(|(model, _)| model)
    }

    /// Like [`LinearRegression::fit`], also returning solver diagnostics.
    pub fn fit_with_report(
        &self,
        x: &CsrMatrix,
        y: &Array1<f64>,
    ) -> Result<(LinearModel, SolverReport)> {
        self.validate()?;
        let (n_rows, n_cols) = x.shape();
        if n_rows != y.len() {
            return Err(PipelineError::ShapeMismatch {
                context: "training rows",
                expected: n_rows,
                got: y.len(),
            });
        }
        if n_rows == 0 {
            return Err(PipelineError::EmptyData(
                "cannot fit a linear model on zero rows".to_string(),
            ));
        }
        if y.iter().any(|v| !v.is_finite()) {
            return Err(PipelineError::Numerical(
                "training target contains non-finite values".to_string(),
            ));
        }

        let means = x.column_means();
        if means.iter().any(|v| !v.is_finite()) {
            return Err(PipelineError::Numerical(
                "feature matrix contains non-finite values".to_string(),
            ));
        }

        let (y_mean, b) = if self.fit_intercept {
            let y_mean = y.sum() / n_rows as f64;
            (y_mean, y - y_mean)
        } else {
            (0.0, y.clone())
        };
        let op = CenteredOperator {
            x,
            means: self.fit_intercept.then(|| means.clone()),
        };

        let max_iter = self.max_iter.unwrap_or_else(|| (2 * n_cols).max(MIN_ITER));
        let (weights, report) = cgls(&op, &b, n_cols, self.tol, max_iter)?;

        let intercept = if self.fit_intercept {
            y_mean - means.dot(&weights)
        } else {
            0.0
        };

        if report.converged {
            tracing::info!(
                rows = n_rows,
                features = n_cols,
                iterations = report.iterations,
                relative_residual = report.relative_residual,
                "fitted linear regression"
            );
        } else {
            tracing::warn!(
                rows = n_rows,
                features = n_cols,
                iterations = report.iterations,
                relative_residual = report.relative_residual,
                tol = self.tol,
                "linear regression stopped before reaching tolerance"
            );
        }

        let mut model = LinearModel::new(weights, intercept);
        if let Some(id) = x.feature_space() {
            model = model.with_feature_space(id);
        }
        Ok((model, report))
    }
}

fn cgls(
    op: &CenteredOperator<'_>,
    b: &Array1<f64>,
    n_cols: usize,
    tol: f64,
    max_iter: usize,
) -> Result<(Array1<f64>, SolverReport)> {
    let mut w = Array1::zeros(n_cols);
    let mut r = b.clone();
    let mut s = op.apply_t(&r)?;
    let mut p = s.clone();
    let mut gamma = s.dot(&s);
    let s0 = gamma.sqrt();

    let mut report = SolverReport {
        iterations: 0,
        converged: true,
        relative_residual: 0.0,
    };
    if s0 == 0.0 {
        // Target already orthogonal to every column: w = 0 is the answer.
        return Ok((w, report));
    }

    let threshold = tol * s0;
    let mut converged = false;
    for iter in 0..max_iter {
        if gamma.sqrt() <= threshold {
            converged = true;
            break;
        }
        let q = op.apply(&p)?;
        let qq = q.dot(&q);
        if qq <= f64::MIN_POSITIVE {
            // Search direction lies in the null space; nothing left to reduce.
            converged = true;
            break;
        }
        let alpha = gamma / qq;
        w.scaled_add(alpha, &p);
        r.scaled_add(-alpha, &q);
        s = op.apply_t(&r)?;
        let gamma_next = s.dot(&s);
        if !gamma_next.is_finite() {
            return Err(PipelineError::Numerical(format!(
                "solver diverged at iteration {}",
                iter + 1
            )));
        }
        let beta = gamma_next / gamma;
        p = &s + &(beta * &p);
        gamma = gamma_next;
        report.iterations = iter + 1;

        if report.iterations % LOG_EVERY == 0 {
            tracing::debug!(
                iteration = report.iterations,
                relative_residual = gamma.sqrt() / s0,
                "cgls progress"
            );
        }
    }
    if !converged && gamma.sqrt() <= threshold {
        converged = true;
    }

    report.converged = converged;
    report.relative_residual = gamma.sqrt() / s0;
    Ok((w, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::FeatureSpaceId;
    use crate::model::InferenceModel;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn dense_to_csr(rows: &[&[f64]]) -> CsrMatrix {
        let n_cols = rows.first().map_or(0, |r| r.len());
        let entries = rows
            .iter()
            .map(|r| {
                r.iter()
                    .enumerate()
                    .filter(|(_, v)| **v != 0.0)
                    .map(|(i, v)| (i, *v))
                    .collect()
            })
            .collect();
        CsrMatrix::from_rows(n_cols, entries).unwrap()
    }

    // === Builder ===

    #[test]
    fn test_builder_defaults() {
        let lr = LinearRegression::builder().build().unwrap();
        assert_eq!(lr, LinearRegression::default());
        assert!(lr.fit_intercept);
        assert_eq!(lr.tol, DEFAULT_TOL);
    }

    #[test]
    fn test_builder_rejects_bad_params() {
        assert!(LinearRegression::builder().tol(-1.0).build().is_err());
        assert!(LinearRegression::builder().tol(f64::NAN).build().is_err());
        assert!(LinearRegression::builder().max_iter(0).build().is_err());
    }

    // === Fitting ===

    #[test]
    fn test_two_row_one_hot_scenario() {
        // DOLocationID=2, DOLocationID=3, PULocationID=1, passenger_count=1, passenger_count=2
        let x = dense_to_csr(&[&[1.0, 0.0, 1.0, 1.0, 0.0], &[0.0, 1.0, 1.0, 0.0, 1.0]]);
        let y = array![10.0, 5.0];
        let model = LinearRegression::default().fit(&x, &y).unwrap();

        // Minimum-norm solution.
        let expected = [1.25, -1.25, 0.0, 1.25, -1.25];
        for (w, e) in model.weights().iter().zip(expected.iter()) {
            assert_abs_diff_eq!(*w, *e, epsilon = 1e-9);
        }
        assert_abs_diff_eq!(model.intercept(), 7.5, epsilon = 1e-9);

        let preds = model.predict_batch(&x).unwrap();
        assert_abs_diff_eq!(preds[0], 10.0, epsilon = 1e-9);
        assert_abs_diff_eq!(preds[1], 5.0, epsilon = 1e-9);
    }

    #[test]
    fn test_recovers_exact_linear_relation() {
        // y = 2 a - 3 b + 4
        let x = dense_to_csr(&[
            &[1.0, 0.0],
            &[0.0, 1.0],
            &[1.0, 1.0],
            &[2.0, 1.0],
            &[3.0, 5.0],
        ]);
        let y = array![6.0, 1.0, 3.0, 5.0, -5.0];
        let (model, report) = LinearRegression::default().fit_with_report(&x, &y).unwrap();
        assert!(report.converged);
        assert_abs_diff_eq!(model.weights()[0], 2.0, epsilon = 1e-8);
        assert_abs_diff_eq!(model.weights()[1], -3.0, epsilon = 1e-8);
        assert_abs_diff_eq!(model.intercept(), 4.0, epsilon = 1e-8);
    }

    #[test]
    fn test_least_squares_on_noisy_data() {
        // One feature, y not exactly linear: slope = cov / var.
        let x = dense_to_csr(&[&[1.0], &[2.0], &[3.0], &[4.0]]);
        let y = array![1.0, 3.0, 2.0, 5.0];
        let model = LinearRegression::default().fit(&x, &y).unwrap();
        // x̄ = 2.5, ȳ = 2.75, Σdxdy = 5.5, Σdx² = 5
        assert_abs_diff_eq!(model.weights()[0], 1.1, epsilon = 1e-10);
        assert_abs_diff_eq!(model.intercept(), 2.75 - 1.1 * 2.5, epsilon = 1e-10);
    }

    #[test]
    fn test_without_intercept() {
        let x = dense_to_csr(&[&[1.0], &[2.0], &[3.0]]);
        let y = array![2.0, 4.0, 6.0];
        let lr = LinearRegression::builder().fit_intercept(false).build().unwrap();
        let model = lr.fit(&x, &y).unwrap();
        assert_abs_diff_eq!(model.weights()[0], 2.0, epsilon = 1e-10);
        assert_eq!(model.intercept(), 0.0);
    }

    #[test]
    fn test_constant_target() {
        let x = dense_to_csr(&[&[1.0, 0.0], &[0.0, 1.0], &[1.0, 0.0]]);
        let y = array![4.0, 4.0, 4.0];
        let (model, report) = LinearRegression::default().fit_with_report(&x, &y).unwrap();
        assert_eq!(report.iterations, 0);
        assert_eq!(model.weights().to_vec(), vec![0.0, 0.0]);
        assert_eq!(model.intercept(), 4.0);
    }

    #[test]
    fn test_zero_width_matrix_predicts_mean() {
        let x = CsrMatrix::zeros(3, 0);
        let y = array![1.0, 2.0, 6.0];
        let model = LinearRegression::default().fit(&x, &y).unwrap();
        assert_eq!(model.n_features(), 0);
        assert_abs_diff_eq!(model.intercept(), 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_fit_is_deterministic() {
        let x = dense_to_csr(&[&[1.0, 0.0, 1.0], &[0.0, 1.0, 1.0], &[1.0, 1.0, 0.0]]);
        let y = array![3.0, 2.0, 7.0];
        let a = LinearRegression::default().fit(&x, &y).unwrap();
        let b = LinearRegression::default().fit(&x, &y).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_model_inherits_feature_space() {
        let id = FeatureSpaceId::from_feature_names(["a", "b"]);
        let x = dense_to_csr(&[&[1.0, 0.0], &[0.0, 1.0]]).with_feature_space(id);
        let model = LinearRegression::default().fit(&x, &array![1.0, 2.0]).unwrap();
        assert_eq!(model.feature_space(), Some(id));
    }

    #[test]
    fn test_iteration_cap_reports_not_converged() {
        let x = dense_to_csr(&[
            &[1.0, 0.0, 0.0],
            &[0.0, 1.0, 0.0],
            &[0.0, 0.0, 1.0],
            &[1.0, 1.0, 1.0],
            &[2.0, 0.5, 0.0],
        ]);
        let y = array![1.0, 4.0, 2.0, 8.0, 3.0];
        let lr = LinearRegression::builder().max_iter(1).build().unwrap();
        let (_, report) = lr.fit_with_report(&x, &y).unwrap();
        assert_eq!(report.iterations, 1);
        assert!(!report.converged);
    }

    // === Errors ===

    #[test]
    fn test_row_mismatch() {
        let x = dense_to_csr(&[&[1.0], &[2.0]]);
        let result = LinearRegression::default().fit(&x, &array![1.0]);
        assert!(matches!(result, Err(PipelineError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_empty_input() {
        let x = CsrMatrix::zeros(0, 3);
        let result = LinearRegression::default().fit(&x, &Array1::zeros(0));
        assert!(matches!(result, Err(PipelineError::EmptyData(_))));
    }

    #[test]
    fn test_non_finite_target() {
        let x = dense_to_csr(&[&[1.0], &[2.0]]);
        let result = LinearRegression::default().fit(&x, &array![1.0, f64::NAN]);
        assert!(matches!(result, Err(PipelineError::Numerical(_))));
    }
}
