//! Outlier filter on the regression target.

use serde::{Deserialize, Serialize};

use crate::dataset::{FieldValue, TripRecord};
use crate::error::{PipelineError, Result};

/// Closed interval `[min, max]` of accepted durations, in minutes.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DurationBounds {
    pub min: f64,
    pub max: f64,
}

impl Default for DurationBounds {
    fn default() -> Self {
        Self { min: 1.0, max: 60.0 }
    }
}

impl DurationBounds {
    /// Checked constructor.
    pub fn new(min: f64, max: f64) -> Result<Self> {
        let bounds = Self { min, max };
        bounds.validate()?;
        Ok(bounds)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.min.is_finite() || !self.max.is_finite() {
            return Err(PipelineError::InvalidParameter(format!(
                "duration bounds must be finite, got [{}, {}]",
                self.min, self.max
            )));
        }
        if self.min > self.max {
            return Err(PipelineError::InvalidParameter(format!(
                "duration lower bound {} exceeds upper bound {}",
                self.min, self.max
            )));
        }
        Ok(())
    }

    /// Inclusive on both ends; `NaN` is never contained.
    pub fn contains(&self, duration: f64) -> bool {
        self.min <= duration && duration <= self.max
    }
}

/// Keep the records whose `target_col` lies within `bounds`, preserving order.
///
/// Out-of-range rows are dropped, never clamped.
pub fn filter_outliers(
    mut records: Vec<TripRecord>,
    target_col: &str,
    bounds: DurationBounds,
) -> Result<Vec<TripRecord>> {
    bounds.validate()?;
    for (row, record) in records.iter().enumerate() {
        match record.get(target_col) {
            None => return Err(PipelineError::missing_column(target_col)),
            Some(FieldValue::Int(_)) | Some(FieldValue::Float(_)) => {}
            Some(other) => {
                return Err(PipelineError::invalid_value(
                    target_col,
                    row,
                    format!("expected number, got {}", other.kind()),
                ))
            }
        }
    }

    let before = records.len();
    records.retain(|record| {
        record
            .get(target_col)
            .and_then(FieldValue::as_f64)
            .is_some_and(|d| bounds.contains(d))
    });
    tracing::debug!(
        kept = records.len(),
        dropped = before - records.len(),
        min = bounds.min,
        max = bounds.max,
        "filtered duration outliers"
    );
    Ok(records)
}
