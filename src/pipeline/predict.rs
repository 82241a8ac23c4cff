//! Batch and single-row prediction.

use std::path::Path;

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::artifact::ArtifactBundle;
use crate::dataset::{read_trips, TripRecord};
use crate::error::{PipelineError, Result};
use crate::registry::{RunRegistry, Stage};

/// Predict durations for records already in memory. No target is needed.
pub fn batch_predict_records(bundle: &ArtifactBundle, records: &[TripRecord]) -> Result<Array1<f64>> {
    let preds = bundle.predict_records(records)?;
    tracing::info!(rows = preds.len(), "batch prediction done");
    Ok(preds)
}

/// Load `input_path` and predict with an in-memory bundle.
pub fn batch_predict(bundle: &ArtifactBundle, input_path: impl AsRef<Path>) -> Result<Array1<f64>> {
    let records = read_trips(input_path)?;
    batch_predict_records(bundle, &records)
}

/// Load the bundle from `bundle_path`, then predict `input_path`.
pub fn batch_predict_from_file(
    bundle_path: impl AsRef<Path>,
    input_path: impl AsRef<Path>,
) -> Result<Array1<f64>> {
    let bundle = ArtifactBundle::load_from_file(bundle_path)?;
    batch_predict(&bundle, input_path)
}

/// Resolve the bundle registered under `stage`, then predict `input_path`.
pub fn batch_predict_from_registry<R: RunRegistry>(
    registry: &R,
    stage: Stage,
    input_path: impl AsRef<Path>,
) -> Result<Array1<f64>> {
    let version = registry.resolve(stage)?;
    tracing::info!(version = version.version, stage = %stage, "resolved model version");
    let bundle = registry.load_bundle(&version)?;
    batch_predict(&bundle, input_path)
}

fn default_location() -> i64 {
    264
}

fn default_passenger_count() -> i64 {
    1
}

/// Request body for a single trip.
///
/// Location 264 is the "unknown" zone in the taxi zone lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripFeatures {
    #[serde(rename = "PULocationID", default = "default_location")]
    pub pu_location_id: i64,
    #[serde(rename = "DOLocationID", default = "default_location")]
    pub do_location_id: i64,
    #[serde(default = "default_passenger_count")]
    pub passenger_count: i64,
}

impl Default for TripFeatures {
    fn default() -> Self {
        Self {
            pu_location_id: default_location(),
            do_location_id: default_location(),
            passenger_count: default_passenger_count(),
        }
    }
}

impl From<TripFeatures> for TripRecord {
    fn from(f: TripFeatures) -> Self {
        TripRecord::new()
            .with("PULocationID", f.pu_location_id)
            .with("DOLocationID", f.do_location_id)
            .with("passenger_count", f.passenger_count)
    }
}

/// Response body for a single trip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionOut {
    pub trip_duration_prediction: f64,
}

/// Predict the duration of one trip.
pub fn predict_single(bundle: &ArtifactBundle, features: TripFeatures) -> Result<PredictionOut> {
    let preds = bundle.predict_records(&[features.into()])?;
    let trip_duration_prediction = preds.first().copied().ok_or_else(|| {
        PipelineError::EmptyData("model returned no prediction".to_string())
    })?;
    Ok(PredictionOut {
        trip_duration_prediction,
    })
}
