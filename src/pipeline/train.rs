//! Train workflow: raw trip files → fitted bundle and metrics.

use std::path::{Path, PathBuf};

use crate::artifact::ArtifactBundle;
use crate::config::PipelineConfig;
use crate::dataset::{read_trips, FieldValue, TripRecord};
use crate::error::{PipelineError, Result};
use crate::metrics::Metrics;
use crate::model::InferenceModel;
use crate::preprocessing::{compute_target, encode_categorical_cols, extract_x_y, filter_outliers};
use crate::registry::{ModelVersion, RunMetrics, RunParams, RunRecord, RunRegistry};

/// Result of a training run.
#[derive(Debug, Clone)]
pub struct TrainOutcome {
    pub train_rmse: f64,
    pub eval_rmse: f64,
    pub bundle: ArtifactBundle,
    /// Set when the bundle was written to disk.
    pub bundle_path: Option<PathBuf>,
}

/// Target computation, optional outlier filtering and categorical encoding.
///
/// Without `filter`, rows whose target could not be computed (a null
/// timestamp) are still dropped, so every returned row has a finite target.
pub fn prepare_records(
    mut records: Vec<TripRecord>,
    config: &PipelineConfig,
    filter: bool,
) -> Result<Vec<TripRecord>> {
    let features = &config.features;
    compute_target(
        &mut records,
        &features.pickup_col,
        &features.dropoff_col,
        &features.target_col,
    )?;
    if filter {
        records = filter_outliers(records, &features.target_col, config.outliers.bounds())?;
    } else {
        let before = records.len();
        records.retain(|r| {
            r.get(&features.target_col)
                .and_then(FieldValue::as_f64)
                .is_some_and(f64::is_finite)
        });
        let dropped = before - records.len();
        if dropped > 0 {
            tracing::warn!(dropped, "dropped rows without a computable duration");
        }
    }
    encode_categorical_cols(&mut records, &features.categorical_cols)?;
    Ok(records)
}

/// In-memory core of [`train_workflow`].
///
/// Fits the vectorizer and model on `train`, then scores both sets. The
/// evaluation set goes through the same fitted vectorizer, transform only.
///
/// # Errors
/// - [`PipelineError::EmptyData`] if either set is empty after preparation.
/// - Any preprocessing, solver or metric error.
pub fn train_on_records(
    train: Vec<TripRecord>,
    eval: Vec<TripRecord>,
    config: &PipelineConfig,
) -> Result<TrainOutcome> {
    config.validate()?;
    let features = &config.features;

    let train = prepare_records(train, config, true)?;
    let eval = prepare_records(eval, config, config.outliers.filter_eval)?;
    if train.is_empty() {
        return Err(PipelineError::EmptyData(
            "no training rows left after outlier filtering".to_string(),
        ));
    }
    if eval.is_empty() {
        return Err(PipelineError::EmptyData(
            "evaluation set is empty".to_string(),
        ));
    }
    tracing::info!(train_rows = train.len(), eval_rows = eval.len(), "prepared records");

    let fitted = extract_x_y(&train, &features.categorical_cols, &features.target_col, None, true)?;
    let y_train = fitted.y.ok_or_else(|| {
        PipelineError::NotFitted("training target was not extracted".to_string())
    })?;
    let vectorizer = fitted.vectorizer.into_owned();
    let model = config.trainer.fit(&fitted.x, &y_train)?;
    let train_rmse = Metrics::rmse(y_train.view(), model.predict_batch(&fitted.x)?.view())?;

    let scored = extract_x_y(
        &eval,
        &features.categorical_cols,
        &features.target_col,
        Some(&vectorizer),
        true,
    )?;
    let y_eval = scored.y.ok_or_else(|| {
        PipelineError::NotFitted("evaluation target was not extracted".to_string())
    })?;
    let eval_rmse = Metrics::rmse(y_eval.view(), model.predict_batch(&scored.x)?.view())?;

    tracing::info!(
        features = model.n_features(),
        train_rmse,
        eval_rmse,
        "trained duration model"
    );

    Ok(TrainOutcome {
        train_rmse,
        eval_rmse,
        bundle: ArtifactBundle::new(vectorizer, model)?,
        bundle_path: None,
    })
}

/// Load both files, train, and optionally persist the bundle to
/// [`PipelineConfig::bundle_path`].
pub fn train_workflow(
    train_path: impl AsRef<Path>,
    eval_path: impl AsRef<Path>,
    config: &PipelineConfig,
    save: bool,
) -> Result<TrainOutcome> {
    let train = read_trips(train_path)?;
    let eval = read_trips(eval_path)?;
    let mut outcome = train_on_records(train, eval, config)?;
    if save {
        let path = config.bundle_path();
        outcome.bundle.save_to_file(&path)?;
        outcome.bundle_path = Some(path);
    }
    Ok(outcome)
}

/// Train, persist, and log the run to `registry`.
pub fn train_and_register<R: RunRegistry>(
    train_path: impl AsRef<Path>,
    eval_path: impl AsRef<Path>,
    config: &PipelineConfig,
    registry: &mut R,
) -> Result<(TrainOutcome, ModelVersion)> {
    let outcome = train_workflow(train_path, eval_path, config, true)?;
    let bundle_path = outcome
        .bundle_path
        .clone()
        .unwrap_or_else(|| config.bundle_path());
    let record = RunRecord {
        params: RunParams {
            categorical_cols: config.features.categorical_cols.clone(),
            min_duration: config.outliers.min,
            max_duration: config.outliers.max,
            model_version: config.artifacts.model_version.clone(),
        },
        metrics: RunMetrics {
            train_rmse: outcome.train_rmse,
            eval_rmse: outcome.eval_rmse,
        },
        bundle_path,
    };
    let version = registry.log_run(record)?;
    Ok((outcome, version))
}
