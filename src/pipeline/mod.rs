//! Workflows composed from the preprocessing, trainer and artifact stages.
//!
//! Each workflow is a plain synchronous function: it reads its own inputs,
//! threads the fitted vectorizer explicitly, and either returns a result or
//! the first error. Scheduling and retries belong to the caller.

mod predict;
mod train;

pub use predict::{
    batch_predict, batch_predict_from_file, batch_predict_from_registry, batch_predict_records,
    predict_single, PredictionOut, TripFeatures,
};
pub use train::{prepare_records, train_and_register, train_on_records, train_workflow, TrainOutcome};
