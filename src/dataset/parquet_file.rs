//! Parquet trip loader.
//!
//! The file is read into Arrow record batches, then every supported column is
//! converted row by row into [`FieldValue`]s. Columns of other Arrow types are
//! skipped.

use std::fs::File;
use std::path::Path;

use arrow::array::{Array, ArrayRef, Float64Array, Int64Array, StringArray, TimestampMicrosecondArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::DateTime;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use super::{FieldValue, TripRecord};
use crate::error::{PipelineError, Result};

/// Load every row of a Parquet file.
pub fn read_parquet<P: AsRef<Path>>(path: P) -> Result<Vec<TripRecord>> {
    let file = File::open(path.as_ref())?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

    let mut records = Vec::new();
    for batch in reader {
        append_batch(&batch?, &mut records)?;
    }
    Ok(records)
}

/// Convert one record batch and append its rows to `records`.
pub(crate) fn append_batch(batch: &RecordBatch, records: &mut Vec<TripRecord>) -> Result<()> {
    let offset = records.len();
    records.extend((0..batch.num_rows()).map(|_| TripRecord::new()));

    let schema = batch.schema();
    for (field, column) in schema.fields().iter().zip(batch.columns()) {
        let Some(values) = column_values(field.name(), column)? else {
            tracing::debug!(column = %field.name(), data_type = %field.data_type(), "skipping unsupported column");
            continue;
        };
        for (row, value) in values.into_iter().enumerate() {
            records[offset + row].insert(field.name().as_str(), value);
        }
    }
    Ok(())
}

fn column_values(name: &str, column: &ArrayRef) -> Result<Option<Vec<FieldValue>>> {
    let values = match column.data_type() {
        DataType::Timestamp(_, _) | DataType::Date64 => {
            let casted = cast(column, &DataType::Timestamp(TimeUnit::Microsecond, None))?;
            let array = downcast::<TimestampMicrosecondArray>(name, &casted)?;
            let mut out = Vec::with_capacity(array.len());
            for i in 0..array.len() {
                if array.is_null(i) {
                    out.push(FieldValue::Missing);
                    continue;
                }
                let ts = DateTime::from_timestamp_micros(array.value(i))
                    .ok_or_else(|| PipelineError::invalid_value(name, i, "timestamp out of range"))?;
                out.push(FieldValue::Timestamp(ts.naive_utc()));
            }
            out
        }
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => {
            let casted = cast(column, &DataType::Int64)?;
            let array = downcast::<Int64Array>(name, &casted)?;
            array.iter().map(FieldValue::from).collect()
        }
        DataType::Float16 | DataType::Float32 | DataType::Float64 => {
            let casted = cast(column, &DataType::Float64)?;
            let array = downcast::<Float64Array>(name, &casted)?;
            array.iter().map(FieldValue::from).collect()
        }
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => {
            let casted = cast(column, &DataType::Utf8)?;
            let array = downcast::<StringArray>(name, &casted)?;
            array.iter().map(FieldValue::from).collect()
        }
        _ => return Ok(None),
    };
    Ok(Some(values))
}

fn downcast<'a, T: 'static>(name: &str, array: &'a ArrayRef) -> Result<&'a T> {
    array.as_any().downcast_ref::<T>().ok_or_else(|| {
        PipelineError::invalid_value(name, 0, format!("unexpected array type {}", array.data_type()))
    })
}
