//! Artifact bundle: the fitted vectorizer and model persisted together.
//!
//! The two halves are only valid as a pair. A bundle can only be built from a
//! model trained on the vectorizer's feature space, and loading re-checks
//! the pairing, so a mismatched pair is rejected before it can mispredict.

use std::path::{Path, PathBuf};

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::dataset::TripRecord;
use crate::error::{PipelineError, Result};
use crate::model::{InferenceModel, LinearModel, LinearModelParams};
use crate::preprocessing::{
    encode_categorical_cols, extract_x_y, DictVectorizerParams, FittedDictVectorizer,
    FittedTransformer,
};
use crate::serialization::SerializableParams;

/// Bumped whenever the on-disk layout changes.
pub const FORMAT_VERSION: u32 = 1;

/// Bundle file name for a model version, e.g. `bundle__v0.0.1.bin`.
pub fn bundle_file_name(model_version: &str) -> String {
    format!("bundle__v{}.bin", model_version)
}

/// Full bundle path inside `dir`.
pub fn bundle_path(dir: impl AsRef<Path>, model_version: &str) -> PathBuf {
    dir.as_ref().join(bundle_file_name(model_version))
}

#[derive(Serialize, Deserialize)]
struct BundleRepr {
    format_version: u32,
    vectorizer: DictVectorizerParams,
    model: LinearModelParams,
}

/// A fitted vectorizer and the linear model trained on its output.
#[derive(Clone, Debug, PartialEq)]
pub struct ArtifactBundle {
    vectorizer: FittedDictVectorizer,
    model: LinearModel,
}

impl ArtifactBundle {
    /// Pair a vectorizer with a model.
    ///
    /// # Errors
    /// - [`PipelineError::FeatureSpaceMismatch`] if the model was trained on another feature space.
    /// - [`PipelineError::FeatureMismatch`] if the widths disagree.
    pub fn new(vectorizer: FittedDictVectorizer, model: LinearModel) -> Result<Self> {
        if let Some(trained_on) = model.feature_space() {
            if trained_on != vectorizer.feature_space() {
                return Err(PipelineError::FeatureSpaceMismatch {
                    expected: trained_on.to_string(),
                    got: vectorizer.feature_space().to_string(),
                });
            }
        }
        if model.n_features() != vectorizer.n_features_out() {
            return Err(PipelineError::FeatureMismatch {
                expected_features: model.n_features(),
                got_features: vectorizer.n_features_out(),
            });
        }
        Ok(Self { vectorizer, model })
    }

    pub fn vectorizer(&self) -> &FittedDictVectorizer {
        &self.vectorizer
    }

    pub fn model(&self) -> &LinearModel {
        &self.model
    }

    pub fn into_parts(self) -> (FittedDictVectorizer, LinearModel) {
        (self.vectorizer, self.model)
    }

    /// Encode, vectorize and predict raw records.
    ///
    /// Only the vectorizer's columns are read; other fields are ignored.
    /// `records` is left untouched.
    pub fn predict_records(&self, records: &[TripRecord]) -> Result<Array1<f64>> {
        let mut encoded = records.to_vec();
        let cols = self.vectorizer.columns().to_vec();
        encode_categorical_cols(&mut encoded, &cols)?;
        let features = extract_x_y(&encoded, &cols, "", Some(&self.vectorizer), false)?;
        self.model.predict_batch(&features.x)
    }

    /// Serialize to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let repr = BundleRepr {
            format_version: FORMAT_VERSION,
            vectorizer: self.vectorizer.extract_params(),
            model: self.model.extract_params(),
        };
        Ok(repr.to_bytes()?)
    }

    /// Deserialize and re-validate a bundle.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let repr = BundleRepr::from_bytes(bytes)?;
        if repr.format_version != FORMAT_VERSION {
            return Err(PipelineError::Serialization(format!(
                "unsupported bundle format version {} (expected {})",
                repr.format_version, FORMAT_VERSION
            )));
        }
        let vectorizer = FittedDictVectorizer::from_params(repr.vectorizer)?;
        let model = LinearModel::from_params(repr.model)?;
        Self::new(vectorizer, model)
    }

    /// Write the bundle to `path`, creating parent directories.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, self.to_bytes()?)?;
        tracing::info!(
            path = %path.display(),
            features = self.model.n_features(),
            "saved artifact bundle"
        );
        Ok(())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bundle = Self::from_bytes(&std::fs::read(path)?)?;
        tracing::info!(
            path = %path.display(),
            features = bundle.model.n_features(),
            "loaded artifact bundle"
        );
        Ok(bundle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_categorical_cols;
    use crate::preprocessing::{DictVectorizer, Transformer};
    use crate::trainer::LinearRegression;
    use ndarray::array;

    fn trip(pu: i64, dolo: i64, pc: i64) -> TripRecord {
        TripRecord::new()
            .with("PULocationID", pu)
            .with("DOLocationID", dolo)
            .with("passenger_count", pc)
    }

    fn fitted_bundle() -> ArtifactBundle {
        let mut rows = vec![
            trip(1, 2, 1).with("duration", 10.0),
            trip(1, 3, 2).with("duration", 5.0),
            trip(4, 2, 1).with("duration", 12.0),
        ];
        let cols = default_categorical_cols();
        encode_categorical_cols(&mut rows, &cols).unwrap();
        let features = extract_x_y(&rows, &cols, "duration", None, true).unwrap();
        let y = features.y.unwrap();
        let model = LinearRegression::default().fit(&features.x, &y).unwrap();
        ArtifactBundle::new(features.vectorizer.into_owned(), model).unwrap()
    }

    // === Construction ===

    #[test]
    fn test_new_rejects_foreign_model() {
        let bundle = fitted_bundle();
        let other = DictVectorizer::new(vec!["zone".into()])
            .fit(&[
                TripRecord::new().with("zone", "a"),
                TripRecord::new().with("zone", "b"),
                TripRecord::new().with("zone", "c"),
                TripRecord::new().with("zone", "d"),
                TripRecord::new().with("zone", "e"),
                TripRecord::new().with("zone", "f"),
            ])
            .unwrap();
        assert_eq!(other.n_features_out(), bundle.model().n_features());
        let result = ArtifactBundle::new(other, bundle.model().clone());
        assert!(matches!(result, Err(PipelineError::FeatureSpaceMismatch { .. })));
    }

    #[test]
    fn test_new_rejects_width_mismatch() {
        let bundle = fitted_bundle();
        let model = LinearModel::new(array![1.0], 0.0);
        let result = ArtifactBundle::new(bundle.vectorizer().clone(), model);
        assert!(matches!(result, Err(PipelineError::FeatureMismatch { .. })));
    }

    // === Prediction ===

    #[test]
    fn test_predict_records_encodes_raw_values() {
        let bundle = fitted_bundle();
        let raw = vec![trip(1, 2, 1).with("fare_amount", 3.0)];
        let preds = bundle.predict_records(&raw).unwrap();
        assert_eq!(preds.len(), 1);
        assert!((preds[0] - 10.0).abs() < 1e-6);
        // Input left as given.
        assert_eq!(raw[0].get("PULocationID"), Some(&crate::dataset::FieldValue::Int(1)));
    }

    #[test]
    fn test_predict_records_unseen_categories() {
        let bundle = fitted_bundle();
        let preds = bundle.predict_records(&[trip(999, 999, 9)]).unwrap();
        assert_eq!(preds[0].to_bits(), bundle.model().intercept().to_bits());
    }

    // === Persistence ===

    #[test]
    fn test_roundtrip_is_bit_identical() -> Result<()> {
        let bundle = fitted_bundle();
        let tmp = tempfile::tempdir()?;
        let path = bundle_path(tmp.path().join("models"), "0.0.1");
        bundle.save_to_file(&path)?;
        let loaded = ArtifactBundle::load_from_file(&path)?;
        assert_eq!(loaded, bundle);

        let rows = vec![trip(1, 2, 1), trip(4, 3, 2), trip(7, 7, 7)];
        let a = bundle.predict_records(&rows)?;
        let b = loaded.predict_records(&rows)?;
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.to_bits(), y.to_bits());
        }
        Ok(())
    }

    #[test]
    fn test_bundle_file_name() {
        assert_eq!(bundle_file_name("0.0.1"), "bundle__v0.0.1.bin");
    }

    #[test]
    fn test_rejects_unknown_format_version() {
        let bundle = fitted_bundle();
        let repr = BundleRepr {
            format_version: FORMAT_VERSION + 1,
            vectorizer: bundle.vectorizer().extract_params(),
            model: bundle.model().extract_params(),
        };
        let bytes = repr.to_bytes().unwrap();
        assert!(matches!(
            ArtifactBundle::from_bytes(&bytes),
            Err(PipelineError::Serialization(_))
        ));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(ArtifactBundle::from_bytes(b"not a bundle").is_err());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = ArtifactBundle::load_from_file("/nonexistent/bundle__v0.bin");
        assert!(matches!(result, Err(PipelineError::Io(_))));
    }
}
