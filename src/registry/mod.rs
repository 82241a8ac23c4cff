//! Run registry: versioned record of training runs and their bundles.
//!
//! Every training run can be logged with its parameters, metrics and
//! artifact bundle. Logged runs become numbered [`ModelVersion`]s that move
//! through [`Stage`]s; batch prediction resolves a bundle by stage.

mod fs;

pub use fs::FsRegistry;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::artifact::ArtifactBundle;
use crate::error::Result;

/// Lifecycle stage of a model version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Logged but not promoted.
    #[default]
    None,
    Staging,
    Production,
    /// Replaced by a newer version.
    Archived,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::None => "none",
            Stage::Staging => "staging",
            Stage::Production => "production",
            Stage::Archived => "archived",
        };
        f.pad(name)
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Stage::None),
            "staging" => Ok(Stage::Staging),
            "production" => Ok(Stage::Production),
            "archived" => Ok(Stage::Archived),
            other => Err(format!(
                "unknown stage `{}` (expected none, staging, production or archived)",
                other
            )),
        }
    }
}

/// Parameters a run was trained with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunParams {
    pub categorical_cols: Vec<String>,
    pub min_duration: f64,
    pub max_duration: f64,
    pub model_version: String,
}

/// Metrics measured at the end of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub train_rmse: f64,
    pub eval_rmse: f64,
}

/// A training run to log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub params: RunParams,
    pub metrics: RunMetrics,
    /// Bundle written by the run. The registry keeps its own copy.
    pub bundle_path: PathBuf,
}

/// A logged run with its registry-assigned version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelVersion {
    pub version: u32,
    pub stage: Stage,
    pub created_at: DateTime<Utc>,
    pub run: RunRecord,
    /// Registry-owned copy of the bundle, relative to the registry root.
    pub artifact_path: PathBuf,
}

/// Store of training runs and model versions.
pub trait RunRegistry {
    /// Record a run and register its bundle as a new version in [`Stage::None`].
    fn log_run(&mut self, record: RunRecord) -> Result<ModelVersion>;

    /// Move `version` to `stage`.
    ///
    /// With `archive_existing`, versions currently in `stage` move to
    /// [`Stage::Archived`] (only for staging and production).
    fn transition(&mut self, version: u32, stage: Stage, archive_existing: bool)
        -> Result<ModelVersion>;

    /// Latest version in `stage`.
    fn resolve(&self, stage: Stage) -> Result<ModelVersion>;

    fn get(&self, version: u32) -> Result<ModelVersion>;

    /// All versions, oldest first.
    fn list(&self) -> Result<Vec<ModelVersion>>;

    /// Load the registry's copy of `version`'s bundle.
    fn load_bundle(&self, version: &ModelVersion) -> Result<ArtifactBundle>;
}
