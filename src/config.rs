//! Pipeline configuration loaded from TOML.
//!
//! Every section and field is optional; an empty file yields the defaults:
//!
//! ```toml
//! [features]
//! categorical_cols = ["PULocationID", "DOLocationID", "passenger_count"]
//! pickup_col = "tpep_pickup_datetime"
//! dropoff_col = "tpep_dropoff_datetime"
//! target_col = "duration"
//!
//! [outliers]
//! min = 1.0
//! max = 60.0
//! filter_eval = false
//!
//! [trainer]
//! fit_intercept = true
//! tol = 1e-10
//!
//! [artifacts]
//! dir = "models"
//! model_version = "0.0.1"
//!
//! [registry]
//! dir = "mlruns"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::artifact;
use crate::error::{PipelineError, Result};
use crate::preprocessing::DurationBounds;
use crate::trainer::LinearRegression;

/// Categorical columns used when none are configured.
pub fn default_categorical_cols() -> Vec<String> {
    ["PULocationID", "DOLocationID", "passenger_count"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_pickup_col() -> String {
    "tpep_pickup_datetime".to_string()
}

fn default_dropoff_col() -> String {
    "tpep_dropoff_datetime".to_string()
}

fn default_target_col() -> String {
    "duration".to_string()
}

fn default_min_duration() -> f64 {
    1.0
}

fn default_max_duration() -> f64 {
    60.0
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_model_version() -> String {
    "0.0.1".to_string()
}

fn default_registry_dir() -> PathBuf {
    PathBuf::from("mlruns")
}

/// Column names the pipeline reads and writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSettings {
    #[serde(default = "default_categorical_cols")]
    pub categorical_cols: Vec<String>,
    #[serde(default = "default_pickup_col")]
    pub pickup_col: String,
    #[serde(default = "default_dropoff_col")]
    pub dropoff_col: String,
    #[serde(default = "default_target_col")]
    pub target_col: String,
}

impl Default for FeatureSettings {
    fn default() -> Self {
        Self {
            categorical_cols: default_categorical_cols(),
            pickup_col: default_pickup_col(),
            dropoff_col: default_dropoff_col(),
            target_col: default_target_col(),
        }
    }
}

/// Duration bounds and whether they also apply to evaluation data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierSettings {
    #[serde(default = "default_min_duration")]
    pub min: f64,
    #[serde(default = "default_max_duration")]
    pub max: f64,
    /// Also drop out-of-range rows from the evaluation set.
    #[serde(default)]
    pub filter_eval: bool,
}

impl Default for OutlierSettings {
    fn default() -> Self {
        Self {
            min: default_min_duration(),
            max: default_max_duration(),
            filter_eval: false,
        }
    }
}

impl OutlierSettings {
    pub fn bounds(&self) -> DurationBounds {
        DurationBounds {
            min: self.min,
            max: self.max,
        }
    }
}

/// Where bundles are written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactSettings {
    #[serde(default = "default_artifacts_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_model_version")]
    pub model_version: String,
}

impl Default for ArtifactSettings {
    fn default() -> Self {
        Self {
            dir: default_artifacts_dir(),
            model_version: default_model_version(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrySettings {
    #[serde(default = "default_registry_dir")]
    pub dir: PathBuf,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            dir: default_registry_dir(),
        }
    }
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub features: FeatureSettings,
    #[serde(default)]
    pub outliers: OutlierSettings,
    #[serde(default)]
    pub trainer: LinearRegression,
    #[serde(default)]
    pub artifacts: ArtifactSettings,
    #[serde(default)]
    pub registry: RegistrySettings,
}

impl PipelineConfig {
    /// Load and validate a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), "loaded pipeline config");
        Ok(config)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let features = &self.features;
        if features.categorical_cols.is_empty() {
            return Err(PipelineError::Config(
                "features.categorical_cols must not be empty".to_string(),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for col in &features.categorical_cols {
            if !seen.insert(col.as_str()) {
                return Err(PipelineError::Config(format!(
                    "duplicate categorical column `{}`",
                    col
                )));
            }
        }
        if features.categorical_cols.contains(&features.target_col) {
            return Err(PipelineError::Config(format!(
                "target column `{}` cannot also be categorical",
                features.target_col
            )));
        }
        if self.artifacts.model_version.trim().is_empty() {
            return Err(PipelineError::Config(
                "artifacts.model_version must not be empty".to_string(),
            ));
        }
        self.outliers
            .bounds()
            .validate()
            .map_err(|e| PipelineError::Config(e.to_string()))?;
        self.trainer
            .validate()
            .map_err(|e| PipelineError::Config(e.to_string()))?;
        Ok(())
    }

    /// Where the train workflow writes its bundle.
    pub fn bundle_path(&self) -> PathBuf {
        artifact::bundle_path(&self.artifacts.dir, &self.artifacts.model_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(
            config.features.categorical_cols,
            vec!["PULocationID", "DOLocationID", "passenger_count"]
        );
        assert_eq!(config.features.target_col, "duration");
        assert_eq!(config.outliers.bounds(), DurationBounds::default());
        assert!(!config.outliers.filter_eval);
        assert!(config.trainer.fit_intercept);
        assert_eq!(config.bundle_path(), PathBuf::from("models/bundle__v0.0.1.bin"));
    }

    #[test]
    fn test_partial_sections() {
        let config = PipelineConfig::from_toml_str(
            r#"
[outliers]
max = 90.0
filter_eval = true

[trainer]
max_iter = 500

[artifacts]
model_version = "1.2.0"
"#,
        )
        .unwrap();
        assert_eq!(config.outliers.min, 1.0);
        assert_eq!(config.outliers.max, 90.0);
        assert!(config.outliers.filter_eval);
        assert_eq!(config.trainer.max_iter, Some(500));
        assert_eq!(config.trainer.tol, crate::trainer::DEFAULT_TOL);
        assert_eq!(config.artifacts.dir, PathBuf::from("models"));
        assert!(config.bundle_path().ends_with("bundle__v1.2.0.bin"));
    }

    #[test]
    fn test_load_from_file() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("pipeline.toml");
        std::fs::write(
            &path,
            "[features]\ncategorical_cols = [\"PULocationID\"]\n",
        )?;
        let config = PipelineConfig::load(&path)?;
        assert_eq!(config.features.categorical_cols, vec!["PULocationID"]);
        Ok(())
    }

    #[test]
    fn test_invalid_bounds_rejected() {
        let result = PipelineConfig::from_toml_str("[outliers]\nmin = 10.0\nmax = 5.0\n");
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_duplicate_columns_rejected() {
        let result = PipelineConfig::from_toml_str(
            "[features]\ncategorical_cols = [\"a\", \"a\"]\n",
        );
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_target_as_category_rejected() {
        let result = PipelineConfig::from_toml_str(
            "[features]\ncategorical_cols = [\"duration\"]\n",
        );
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_malformed_toml() {
        let result = PipelineConfig::from_toml_str("[outliers\nmin = ");
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = PipelineConfig::load("/nonexistent/pipeline.toml");
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }
}
