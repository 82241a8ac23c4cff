//! # Numeric storage
//!
//! The pipeline works with two numeric shapes:
//!
//! - [`CsrMatrix`]: compressed sparse row feature matrix produced by the
//!   dictionary vectorizer. One-hot encoded trip data has a handful of
//!   non-zeros per row and hundreds of columns, so rows are stored sparsely.
//! - `ndarray::Array1<f64>`: dense vectors for targets, weights and
//!   predictions.
//!
//! Every matrix built by a vectorizer is tagged with the [`FeatureSpaceId`] of
//! that vectorizer. Models remember the id they were trained on, which lets
//! prediction reject matrices from a different feature space.

pub mod sparse;

pub use sparse::{CsrMatrix, FeatureSpaceId};
