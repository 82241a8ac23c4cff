//! Regression target: trip duration in minutes.

use chrono::NaiveDateTime;

use crate::dataset::{FieldValue, TripRecord};
use crate::error::{PipelineError, Result};

/// `dropoff - pickup` in (fractional) minutes. Negative when dropoff precedes pickup.
pub fn duration_minutes(pickup: NaiveDateTime, dropoff: NaiveDateTime) -> f64 {
    let delta = dropoff - pickup;
    match delta.num_microseconds() {
        Some(us) => us as f64 / 60_000_000.0,
        None => delta.num_seconds() as f64 / 60.0,
    }
}

/// Add a float `target_col` holding the trip duration to every record.
///
/// Zero and negative durations are kept; a null timestamp yields `NaN`.
///
/// # Errors
/// - [`PipelineError::MissingColumn`] if a record lacks either timestamp column.
/// - [`PipelineError::InvalidValue`] if a timestamp column holds a non-timestamp.
pub fn compute_target(
    records: &mut [TripRecord],
    pickup_col: &str,
    dropoff_col: &str,
    target_col: &str,
) -> Result<()> {
    for (row, record) in records.iter_mut().enumerate() {
        let pickup = timestamp_at(record, pickup_col, row)?;
        let dropoff = timestamp_at(record, dropoff_col, row)?;
        let duration = match (pickup, dropoff) {
            (Some(p), Some(d)) => duration_minutes(p, d),
            _ => f64::NAN,
        };
        record.insert(target_col, FieldValue::Float(duration));
    }
    Ok(())
}

fn timestamp_at(record: &TripRecord, column: &str, row: usize) -> Result<Option<NaiveDateTime>> {
    match record.get(column) {
        None => Err(PipelineError::missing_column(column)),
        Some(FieldValue::Timestamp(ts)) => Ok(Some(*ts)),
        Some(value) if value.is_missing() => Ok(None),
        Some(other) => Err(PipelineError::invalid_value(
            column,
            row,
            format!("expected timestamp, got {}", other.kind()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const PICKUP: &str = "tpep_pickup_datetime";
    const DROPOFF: &str = "tpep_dropoff_datetime";

    fn ts(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2021, 1, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn trip(pickup: FieldValue, dropoff: FieldValue) -> TripRecord {
        TripRecord::new().with(PICKUP, pickup).with(DROPOFF, dropoff)
    }

    fn durations(records: &[TripRecord]) -> Vec<f64> {
        records
            .iter()
            .map(|r| r.get("duration").and_then(FieldValue::as_f64).unwrap())
            .collect()
    }

    #[test]
    fn test_duration_in_minutes() {
        let mut records = vec![
            trip(ts(0, 0, 0).into(), ts(0, 10, 0).into()),
            trip(ts(0, 0, 0).into(), ts(0, 5, 0).into()),
            trip(ts(0, 0, 0).into(), ts(0, 0, 30).into()),
        ];
        compute_target(&mut records, PICKUP, DROPOFF, "duration").unwrap();
        assert_eq!(durations(&records), vec![10.0, 5.0, 0.5]);
    }

    #[test]
    fn test_negative_and_zero_durations_kept() {
        let mut records = vec![
            trip(ts(0, 10, 0).into(), ts(0, 0, 0).into()),
            trip(ts(0, 10, 0).into(), ts(0, 10, 0).into()),
        ];
        compute_target(&mut records, PICKUP, DROPOFF, "duration").unwrap();
        assert_eq!(durations(&records), vec![-10.0, 0.0]);
    }

    #[test]
    fn test_null_timestamp_gives_nan() {
        let mut records = vec![trip(FieldValue::Missing, ts(0, 10, 0).into())];
        compute_target(&mut records, PICKUP, DROPOFF, "duration").unwrap();
        assert!(durations(&records)[0].is_nan());
    }

    #[test]
    fn test_other_fields_untouched() {
        let mut records = vec![trip(ts(0, 0, 0).into(), ts(0, 1, 0).into()).with("fare_amount", 7.5)];
        compute_target(&mut records, PICKUP, DROPOFF, "duration").unwrap();
        assert_eq!(records[0].get("fare_amount"), Some(&FieldValue::Float(7.5)));
        assert_eq!(records[0].len(), 4);
    }

    #[test]
    fn test_missing_column_is_error() {
        let mut records = vec![TripRecord::new().with(PICKUP, ts(0, 0, 0))];
        let result = compute_target(&mut records, PICKUP, DROPOFF, "duration");
        assert!(matches!(
            result,
            Err(PipelineError::MissingColumn { ref column }) if column == DROPOFF
        ));
    }

    #[test]
    fn test_non_timestamp_is_error() {
        let mut records = vec![trip(ts(0, 0, 0).into(), FieldValue::Str("soon".into()))];
        let result = compute_target(&mut records, PICKUP, DROPOFF, "duration");
        assert!(matches!(result, Err(PipelineError::InvalidValue { row: 0, .. })));
    }
}
