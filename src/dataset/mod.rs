//! Trip records and the loaders that read them from disk.
//!
//! A [`TripRecord`] is one row of tabular trip data, stored as a
//! column-name → [`FieldValue`] map. Pipeline stages read and rewrite only the
//! columns they are configured with; everything else passes through unread.
//!
//! Files are read whole ([`read_trips`]): Parquet by default, CSV when the
//! path ends in `.csv`.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

mod csv_file;
mod parquet_file;

pub use self::csv_file::read_csv;
pub use self::parquet_file::read_parquet;

use crate::error::Result;

/// A single cell of trip data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    /// Null / absent value.
    Missing,
    Int(i64),
    Float(f64),
    Str(String),
    Timestamp(NaiveDateTime),
}

impl FieldValue {
    /// `true` for [`FieldValue::Missing`] and NaN floats.
    pub fn is_missing(&self) -> bool {
        match self {
            FieldValue::Missing => true,
            FieldValue::Float(v) => v.is_nan(),
            _ => false,
        }
    }

    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int(v) => Some(*v as f64),
            FieldValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            FieldValue::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    /// Short type name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            FieldValue::Missing => "missing",
            FieldValue::Int(_) => "int",
            FieldValue::Float(_) => "float",
            FieldValue::Str(_) => "string",
            FieldValue::Timestamp(_) => "timestamp",
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Missing => write!(f, "<missing>"),
            FieldValue::Int(v) => write!(f, "{}", v),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Str(s) => write!(f, "{}", s),
            FieldValue::Timestamp(ts) => write!(f, "{}", ts),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Str(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Str(v)
    }
}

impl From<NaiveDateTime> for FieldValue {
    fn from(v: NaiveDateTime) -> Self {
        FieldValue::Timestamp(v)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(FieldValue::Missing)
    }
}

/// One row of trip data.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TripRecord {
    fields: BTreeMap<String, FieldValue>,
}

impl TripRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(column.into(), value.into());
        self
    }

    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.fields.get(column)
    }

    pub fn get_mut(&mut self, column: &str) -> Option<&mut FieldValue> {
        self.fields.get_mut(column)
    }

    /// Insert or replace a column, returning the previous value.
    pub fn insert(
        &mut self,
        column: impl Into<String>,
        value: impl Into<FieldValue>,
    ) -> Option<FieldValue> {
        self.fields.insert(column.into(), value.into())
    }

    pub fn contains(&self, column: &str) -> bool {
        self.fields.contains_key(column)
    }

    /// Column names in sorted order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for TripRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Read a whole trip file, choosing the reader from the file extension.
pub fn read_trips<P: AsRef<Path>>(path: P) -> Result<Vec<TripRecord>> {
    let path = path.as_ref();
    let is_csv = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);

    let records = if is_csv {
        read_csv(path)?
    } else {
        read_parquet(path)?
    };
    tracing::info!(path = %path.display(), rows = records.len(), "loaded trip data");
    Ok(records)
}
