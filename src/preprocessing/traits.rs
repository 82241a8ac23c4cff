//! Core traits for fitted feature transformers.
//!
//! - [`Transformer`]: unfitted, holds configuration and learns from training rows.
//! - [`FittedTransformer`]: learned state, read-only, serializable.
//!
//! Fitting never mutates an existing fitted transformer: a refit always
//! produces a new value, and transform takes `&self`.

use std::path::Path;

use crate::dataset::TripRecord;
use crate::error::Result;
use crate::serialization::SerializableParams;

/// Trait for unfitted transformers.
pub trait Transformer: Clone {
    /// Output of a transformation (e.g. a sparse matrix).
    type Output;
    /// Serializable representation of learned parameters.
    type Params: SerializableParams<Error = bincode::Error>;
    /// The fitted transformer type ready for inference.
    type Fitted: FittedTransformer<Params = Self::Params, Output = Self::Output>;

    /// Learn parameters from the training records.
    ///
    /// # Errors
    /// Returns an error if the records are empty or hold values the
    /// transformer cannot learn from.
    fn fit(&self, records: &[TripRecord]) -> Result<Self::Fitted>;

    /// Fit, then transform the same records.
    fn fit_transform(&self, records: &[TripRecord]) -> Result<(Self::Fitted, Self::Output)> {
        let fitted = self.fit(records)?;
        let output = fitted.transform(records)?;
        Ok((fitted, output))
    }
}

/// Trait for fitted transformers ready for inference.
///
/// # Guarantees
/// - `extract_params()` + `from_params()` is a round-trip.
/// - `transform` is deterministic: the same records give the same output.
pub trait FittedTransformer: Clone {
    type Output;
    type Params: SerializableParams<Error = bincode::Error>;

    /// Transform records using learned parameters.
    fn transform(&self, records: &[TripRecord]) -> Result<Self::Output>;

    /// Extract learned parameters as a serializable representation.
    fn extract_params(&self) -> Self::Params;

    /// Reconstruct a fitted transformer from parameters.
    fn from_params(params: Self::Params) -> Result<Self>
    where
        Self: Sized;

    /// Number of output features.
    fn n_features_out(&self) -> usize;

    /// Save the fitted transformer to a file.
    fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.extract_params().write_to(path)
    }

    /// Load a fitted transformer from a file.
    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self>
    where
        Self: Sized,
    {
        let params = Self::Params::read_from(path)?;
        Self::from_params(params)
    }
}
