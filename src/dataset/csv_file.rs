//! CSV trip loader.
//!
//! Cells are typed by content: empty → missing, then integer, float,
//! timestamp, and finally plain string.

use std::path::Path;

use chrono::{DateTime, NaiveDateTime};
use csv::ReaderBuilder;

use super::{FieldValue, TripRecord};
use crate::error::Result;

const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Load every row of a CSV file with a header line.
pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<Vec<TripRecord>> {
    let mut rdr = ReaderBuilder::new().from_path(path)?;
    let headers = rdr.headers()?.clone();

    let mut records = Vec::new();
    for result in rdr.records() {
        let row = result?;
        let record: TripRecord = headers
            .iter()
            .zip(row.iter())
            .map(|(name, cell)| (name, parse_cell(cell)))
            .collect();
        records.push(record);
    }
    Ok(records)
}

pub(crate) fn parse_cell(raw: &str) -> FieldValue {
    let raw = raw.trim();
    if raw.is_empty() {
        return FieldValue::Missing;
    }
    if let Ok(v) = raw.parse::<i64>() {
        return FieldValue::Int(v);
    }
    if let Ok(v) = raw.parse::<f64>() {
        return FieldValue::Float(v);
    }
    if let Some(ts) = parse_timestamp(raw) {
        return FieldValue::Timestamp(ts);
    }
    FieldValue::Str(raw.to_string())
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.naive_utc())
        })
}
