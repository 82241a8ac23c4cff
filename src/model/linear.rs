//! Fitted linear regression model: `y = X @ w + b`.

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::backend::{CsrMatrix, FeatureSpaceId};
use crate::error::{PipelineError, Result};
use crate::model::InferenceModel;

/// Serializable representation of linear model parameters.
///
/// Weights are stored as `f64` so a save/load cycle reproduces predictions
/// bit for bit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinearModelParams {
    pub weights: Vec<f64>,
    pub intercept: f64,
    /// Feature space the weights were trained against.
    pub feature_space: Option<FeatureSpaceId>,
}

/// A fitted linear model.
///
/// Built by [`crate::trainer::LinearRegression::fit`] or loaded from
/// parameters. Predicting on a matrix from another feature space fails
/// instead of silently misaligning weights.
#[derive(Clone, Debug, PartialEq)]
pub struct LinearModel {
    weights: Array1<f64>,
    intercept: f64,
    feature_space: Option<FeatureSpaceId>,
}

impl LinearModel {
    pub fn new(weights: Array1<f64>, intercept: f64) -> Self {
        Self {
            weights,
            intercept,
            feature_space: None,
        }
    }

    /// Bind the model to the feature space its weights index.
    pub fn with_feature_space(mut self, id: FeatureSpaceId) -> Self {
        self.feature_space = Some(id);
        self
    }

    pub fn weights(&self) -> &Array1<f64> {
        &self.weights
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn n_features(&self) -> usize {
        self.weights.len()
    }

    pub fn feature_space(&self) -> Option<FeatureSpaceId> {
        self.feature_space
    }

    fn check_input(&self, x: &CsrMatrix) -> Result<()> {
        if let (Some(expected), Some(got)) = (self.feature_space, x.feature_space()) {
            if expected != got {
                return Err(PipelineError::FeatureSpaceMismatch {
                    expected: expected.to_string(),
                    got: got.to_string(),
                });
            }
        }
        if x.n_cols() != self.weights.len() {
            return Err(PipelineError::FeatureMismatch {
                expected_features: self.weights.len(),
                got_features: x.n_cols(),
            });
        }
        Ok(())
    }
}

impl InferenceModel for LinearModel {
    type ParamsRepr = LinearModelParams;

    fn predict_batch(&self, x: &CsrMatrix) -> Result<Array1<f64>> {
        self.check_input(x)?;
        let mut preds = x.dot(&self.weights)?;
        preds += self.intercept;
        Ok(preds)
    }

    fn extract_params(&self) -> Self::ParamsRepr {
        LinearModelParams {
            weights: self.weights.to_vec(),
            intercept: self.intercept,
            feature_space: self.feature_space,
        }
    }

    fn from_params(params: Self::ParamsRepr) -> Result<Self> {
        if !params.intercept.is_finite() || params.weights.iter().any(|w| !w.is_finite()) {
            return Err(PipelineError::Serialization(
                "linear model parameters contain non-finite values".to_string(),
            ));
        }
        Ok(Self {
            weights: Array1::from(params.weights),
            intercept: params.intercept,
            feature_space: params.feature_space,
        })
    }
}
