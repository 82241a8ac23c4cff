//! Categorical column encoding.
//!
//! The dictionary vectorizer one-hot encodes string values only, so every
//! categorical column is normalised to strings before vectorizing. Training
//! and inference must stringify codes identically, otherwise the same zone id
//! lands on different features.

use crate::dataset::{FieldValue, TripRecord};
use crate::error::{PipelineError, Result};

/// Value substituted for missing categorical entries.
pub const MISSING_SENTINEL: i64 = -1;

/// Canonical string form of a categorical cell.
///
/// Missing and NaN become `"-1"`; numbers are truncated to integers
/// (`1.0` → `"1"`); strings are kept as-is. Timestamps are rejected.
pub fn canonical_category(value: &FieldValue) -> Option<String> {
    match value {
        v if v.is_missing() => Some(MISSING_SENTINEL.to_string()),
        FieldValue::Int(i) => Some(i.to_string()),
        FieldValue::Float(f) => Some((f.trunc() as i64).to_string()),
        FieldValue::Str(s) => Some(s.clone()),
        _ => None,
    }
}

/// Rewrite `categorical_cols` of every record as strings, in place.
///
/// # Errors
/// - [`PipelineError::MissingColumn`] if a record lacks a configured column.
/// - [`PipelineError::InvalidValue`] for timestamp values.
pub fn encode_categorical_cols(records: &mut [TripRecord], categorical_cols: &[String]) -> Result<()> {
    for (row, record) in records.iter_mut().enumerate() {
        for col in categorical_cols {
            let value = record
                .get_mut(col)
                .ok_or_else(|| PipelineError::missing_column(col.as_str()))?;
            let encoded = canonical_category(value).ok_or_else(|| {
                PipelineError::invalid_value(
                    col,
                    row,
                    format!("cannot use {} as a category", value.kind()),
                )
            })?;
            *value = FieldValue::Str(encoded);
        }
    }
    Ok(())
}
