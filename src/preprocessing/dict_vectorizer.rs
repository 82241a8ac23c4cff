//! Dictionary vectorizer: records → sparse one-hot feature matrix.
//!
//! Each configured column contributes features by value type:
//! - string `s` → indicator feature `"{column}={s}"` set to `1.0`;
//! - number `v` → a single feature `"{column}"` holding `v`;
//! - missing → nothing.
//!
//! Column names may not contain the separator, which keeps every feature
//! name attributable to exactly one column.
//!
//! Feature names are sorted, so the column order of a fitted vectorizer only
//! depends on the set of (column, value) pairs seen during fit. Values unseen
//! at fit time contribute nothing at transform time.

use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap};

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::backend::{CsrMatrix, FeatureSpaceId};
use crate::dataset::{FieldValue, TripRecord};
use crate::error::{PipelineError, Result};
use crate::preprocessing::traits::{FittedTransformer, Transformer};

/// Default separator between column name and category value.
pub const DEFAULT_SEPARATOR: &str = "=";

/// Unfitted dictionary vectorizer.
///
/// # Example
/// ```
/// use trip_duration::dataset::TripRecord;
/// use trip_duration::preprocessing::{DictVectorizer, FittedTransformer, Transformer};
///
/// let rows = vec![
///     TripRecord::new().with("PULocationID", "1"),
///     TripRecord::new().with("PULocationID", "2"),
/// ];
/// let (dv, x) = DictVectorizer::new(vec!["PULocationID".into()])
///     .fit_transform(&rows)
///     .unwrap();
/// assert_eq!(dv.feature_names(), ["PULocationID=1", "PULocationID=2"]);
/// assert_eq!(x.shape(), (2, 2));
/// ```
#[derive(Clone, Debug)]
pub struct DictVectorizer {
    columns: Vec<String>,
    separator: String,
}

impl DictVectorizer {
    /// Vectorizer over the given columns.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            separator: DEFAULT_SEPARATOR.to_string(),
        }
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }
}

/// Serializable parameters for a fitted [`DictVectorizer`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DictVectorizerParams {
    pub columns: Vec<String>,
    pub separator: String,
    /// Feature names in column order.
    pub feature_names: Vec<String>,
}

/// Fitted dictionary vectorizer. Immutable once built.
#[derive(Clone, Debug, PartialEq)]
pub struct FittedDictVectorizer {
    columns: Vec<String>,
    separator: String,
    feature_names: Vec<String>,
    vocabulary: HashMap<String, usize>,
    feature_space: FeatureSpaceId,
}

impl FittedDictVectorizer {
    fn from_parts(columns: Vec<String>, separator: String, feature_names: Vec<String>) -> Self {
        let vocabulary = feature_names
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.clone(), idx))
            .collect();
        let feature_space = FeatureSpaceId::from_feature_names(feature_names.iter().map(String::as_str));
        Self {
            columns,
            separator,
            feature_names,
            vocabulary,
            feature_space,
        }
    }

    /// Feature names in column order.
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Columns read from each record.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Column index of a feature name.
    pub fn feature_index(&self, name: &str) -> Option<usize> {
        self.vocabulary.get(name).copied()
    }

    pub fn feature_space(&self) -> FeatureSpaceId {
        self.feature_space
    }
}

enum Cell<'a> {
    Indicator(&'a str),
    Numeric(f64),
}

fn cell<'a>(column: &str, row: usize, value: &'a FieldValue) -> Result<Option<Cell<'a>>> {
    match value {
        v if v.is_missing() => Ok(None),
        FieldValue::Str(s) => Ok(Some(Cell::Indicator(s))),
        FieldValue::Int(i) => Ok(Some(Cell::Numeric(*i as f64))),
        FieldValue::Float(f) => Ok(Some(Cell::Numeric(*f))),
        other => Err(PipelineError::invalid_value(
            column,
            row,
            format!("cannot vectorize {} value", other.kind()),
        )),
    }
}

fn feature_name(buf: &mut String, column: &str, separator: &str, cell: &Cell<'_>) {
    buf.clear();
    match cell {
        Cell::Indicator(s) => {
            buf.push_str(column);
            buf.push_str(separator);
            buf.push_str(s);
        }
        Cell::Numeric(_) => buf.push_str(column),
    }
}

fn check_columns(columns: &[String], separator: &str) -> Result<()> {
    if separator.is_empty() {
        return Err(PipelineError::InvalidParameter(
            "feature name separator must not be empty".to_string(),
        ));
    }
    match columns.iter().find(|c| c.contains(separator)) {
        Some(column) => Err(PipelineError::InvalidParameter(format!(
            "column `{}` contains the feature name separator `{}`",
            column, separator
        ))),
        None => Ok(()),
    }
}

impl Transformer for DictVectorizer {
    type Output = CsrMatrix;
    type Params = DictVectorizerParams;
    type Fitted = FittedDictVectorizer;

    fn fit(&self, records: &[TripRecord]) -> Result<Self::Fitted> {
        if records.is_empty() {
            return Err(PipelineError::EmptyData(
                "cannot fit DictVectorizer on empty data".to_string(),
            ));
        }
        check_columns(&self.columns, &self.separator)?;

        let mut names = BTreeSet::new();
        let mut buf = String::new();
        for (row, record) in records.iter().enumerate() {
            for column in &self.columns {
                let Some(value) = record.get(column) else {
                    continue;
                };
                if let Some(c) = cell(column, row, value)? {
                    feature_name(&mut buf, column, &self.separator, &c);
                    if !names.contains(buf.as_str()) {
                        names.insert(buf.clone());
                    }
                }
            }
        }

        let fitted = FittedDictVectorizer::from_parts(
            self.columns.clone(),
            self.separator.clone(),
            names.into_iter().collect(),
        );
        tracing::debug!(
            features = fitted.n_features_out(),
            feature_space = %fitted.feature_space,
            "fitted dict vectorizer"
        );
        Ok(fitted)
    }
}

impl FittedTransformer for FittedDictVectorizer {
    type Output = CsrMatrix;
    type Params = DictVectorizerParams;

    fn transform(&self, records: &[TripRecord]) -> Result<Self::Output> {
        let mut rows = Vec::with_capacity(records.len());
        let mut buf = String::new();
        for (row, record) in records.iter().enumerate() {
            let mut entries = Vec::with_capacity(self.columns.len());
            for column in &self.columns {
                let Some(value) = record.get(column) else {
                    continue;
                };
                let Some(c) = cell(column, row, value)? else {
                    continue;
                };
                feature_name(&mut buf, column, &self.separator, &c);
                // Unseen categories have no index and contribute nothing.
                if let Some(&idx) = self.vocabulary.get(buf.as_str()) {
                    let v = match c {
                        Cell::Indicator(_) => 1.0,
                        Cell::Numeric(v) => v,
                    };
                    entries.push((idx, v));
                }
            }
            rows.push(entries);
        }
        Ok(CsrMatrix::from_rows(self.n_features_out(), rows)?.with_feature_space(self.feature_space))
    }

    fn extract_params(&self) -> Self::Params {
        DictVectorizerParams {
            columns: self.columns.clone(),
            separator: self.separator.clone(),
            feature_names: self.feature_names.clone(),
        }
    }

    fn from_params(params: Self::Params) -> Result<Self> {
        let unique: BTreeSet<&str> = params.feature_names.iter().map(String::as_str).collect();
        if unique.len() != params.feature_names.len() {
            return Err(PipelineError::Serialization(
                "duplicate feature names in vectorizer parameters".to_string(),
            ));
        }
        check_columns(&params.columns, &params.separator)?;
        Ok(Self::from_parts(
            params.columns,
            params.separator,
            params.feature_names,
        ))
    }

    fn n_features_out(&self) -> usize {
        self.feature_names.len()
    }
}

/// Feature matrix, optional target and the vectorizer that produced them.
#[derive(Debug)]
pub struct Features<'a> {
    pub x: CsrMatrix,
    pub y: Option<Array1<f64>>,
    /// Borrowed when an existing vectorizer was reused, owned when freshly fitted.
    pub vectorizer: Cow<'a, FittedDictVectorizer>,
}

/// Vectorize the categorical columns of `records` and optionally pull out the target.
///
/// - `dv = None`: fit a new vectorizer on `records` (training path).
/// - `dv = Some(..)`: reuse it transform-only; it is never refitted.
/// - `with_target = false` requires a vectorizer and returns `y = None`.
///
/// # Errors
/// - [`PipelineError::NotFitted`] for `with_target = false` without `dv`.
/// - [`PipelineError::InvalidParameter`] if `dv` was fitted on other columns.
/// - [`PipelineError::MissingColumn`] / [`PipelineError::InvalidValue`] for a bad target.
pub fn extract_x_y<'a>(
    records: &[TripRecord],
    categorical_cols: &[String],
    target_col: &str,
    dv: Option<&'a FittedDictVectorizer>,
    with_target: bool,
) -> Result<Features<'a>> {
    let (x, vectorizer) = match dv {
        Some(dv) => {
            if dv.columns() != categorical_cols {
                return Err(PipelineError::InvalidParameter(format!(
                    "vectorizer was fitted on columns {:?}, pipeline uses {:?}",
                    dv.columns(),
                    categorical_cols
                )));
            }
            (dv.transform(records)?, Cow::Borrowed(dv))
        }
        None if with_target => {
            let (fitted, x) = DictVectorizer::new(categorical_cols.to_vec()).fit_transform(records)?;
            (x, Cow::Owned(fitted))
        }
        None => {
            return Err(PipelineError::NotFitted(
                "a fitted vectorizer is required when no target is available".to_string(),
            ))
        }
    };

    let y = if with_target {
        Some(target_vector(records, target_col)?)
    } else {
        None
    };

    Ok(Features { x, y, vectorizer })
}

/// Numeric target column as a dense vector.
pub fn target_vector(records: &[TripRecord], target_col: &str) -> Result<Array1<f64>> {
    records
        .iter()
        .enumerate()
        .map(|(row, record)| match record.get(target_col) {
            None => Err(PipelineError::missing_column(target_col)),
            Some(value) => match value.as_f64() {
                Some(v) if v.is_finite() => Ok(v),
                Some(v) => Err(PipelineError::invalid_value(
                    target_col,
                    row,
                    format!("target must be finite, got {}", v),
                )),
                None => Err(PipelineError::invalid_value(
                    target_col,
                    row,
                    format!("expected number, got {}", value.kind()),
                )),
            },
        })
        .collect::<Result<Vec<f64>>>()
        .map(Array1::from)
}
