//! Inference-side models.
//!
//! A fitted model holds only what prediction needs. Solver settings live on
//! the trainer ([`crate::trainer::LinearRegression`]) and never reach the
//! fitted value.

pub mod linear;

pub use linear::{LinearModel, LinearModelParams};

use std::path::Path;

use crate::backend::CsrMatrix;
use crate::error::Result;
use crate::serialization::SerializableParams;

/// A fitted model that maps a feature matrix to one prediction per row.
pub trait InferenceModel {
    /// Serializable representation of the learned parameters.
    type ParamsRepr: SerializableParams<Error = bincode::Error>;

    /// Predict every row of `x`.
    fn predict_batch(&self, x: &CsrMatrix) -> Result<ndarray::Array1<f64>>;

    fn extract_params(&self) -> Self::ParamsRepr;

    fn from_params(params: Self::ParamsRepr) -> Result<Self>
    where
        Self: Sized;

    /// Save the model parameters to a file.
    fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.extract_params().write_to(path)
    }

    /// Load a model from a file written by [`InferenceModel::save_to_file`].
    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self>
    where
        Self: Sized,
    {
        let params = Self::ParamsRepr::read_from(path)?;
        Self::from_params(params)
    }
}
