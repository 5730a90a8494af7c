//! Thin helpers over Arrow compute kernels shared by table operations

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, UInt64Array};
use arrow::compute::{CastOptions, cast_with_options, take};
use arrow::datatypes::{DataType, FieldRef, Schema};
use arrow::error::ArrowError;
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use arrow::row::{OwnedRow, RowConverter, SortField};

/// Build a batch with an explicit row count, so zero-column tables keep
/// their length
pub(crate) fn build_batch(
    fields: Vec<FieldRef>,
    columns: Vec<ArrayRef>,
    num_rows: usize,
) -> Result<RecordBatch, ArrowError> {
    RecordBatch::try_new_with_options(
        Arc::new(Schema::new(fields)),
        columns,
        &RecordBatchOptions::new().with_row_count(Some(num_rows)),
    )
}

/// Gather rows of `array`; `None` indices produce nulls
pub(crate) fn take_rows(array: &ArrayRef, indices: &[Option<u64>]) -> Result<ArrayRef, ArrowError> {
    let indices = UInt64Array::from(indices.to_vec());
    take(array.as_ref(), &indices, None)
}

/// Gather rows of `array` at fully valid indices
pub(crate) fn take_valid(array: &ArrayRef, indices: &[u64]) -> Result<ArrayRef, ArrowError> {
    let indices = UInt64Array::from(indices.to_vec());
    take(array.as_ref(), &indices, None)
}

/// Cast `array` to `data_type`, failing on values that cannot be
/// represented instead of turning them into nulls
pub(crate) fn cast_to(array: &ArrayRef, data_type: &DataType) -> Result<ArrayRef, ArrowError> {
    if array.data_type() == data_type {
        return Ok(array.clone());
    }
    let options = CastOptions {
        safe: false,
        ..Default::default()
    };
    cast_with_options(array.as_ref(), data_type, &options)
}

/// Type that values of all `types` can be stored as
///
/// Identical types are kept, mixed numeric types widen to Float64 and
/// anything else falls back to Utf8.
pub(crate) fn common_type(types: &[DataType]) -> DataType {
    let Some(first) = types.first() else {
        return DataType::Null;
    };
    let non_null: Vec<&DataType> = types.iter().filter(|t| **t != DataType::Null).collect();
    match non_null.first() {
        None => first.clone(),
        Some(head) if non_null.iter().all(|t| t == head) => (*head).clone(),
        Some(_) if non_null.iter().all(|t| t.is_numeric()) => DataType::Float64,
        Some(_) => DataType::Utf8,
    }
}

/// Encodes key columns into comparable, hashable rows
///
/// Both sides of a join must be encoded by the same encoder.
pub(crate) struct KeyEncoder {
    converter: RowConverter,
}

impl KeyEncoder {
    pub(crate) fn new(columns: &[ArrayRef]) -> Result<Self, ArrowError> {
        let fields = columns
            .iter()
            .map(|c| SortField::new(c.data_type().clone()))
            .collect();
        Ok(Self {
            converter: RowConverter::new(fields)?,
        })
    }

    pub(crate) fn encode(&self, columns: &[ArrayRef]) -> Result<Vec<OwnedRow>, ArrowError> {
        let rows = self.converter.convert_columns(columns)?;
        Ok(rows.iter().map(|row| row.owned()).collect())
    }
}

/// Encode key columns with a fresh encoder
pub(crate) fn encode_rows(columns: &[ArrayRef]) -> Result<Vec<OwnedRow>, ArrowError> {
    KeyEncoder::new(columns)?.encode(columns)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_type() {
        assert_eq!(
            common_type(&[DataType::Int64, DataType::Int64]),
            DataType::Int64
        );
        assert_eq!(
            common_type(&[DataType::Int64, DataType::Float32]),
            DataType::Float64
        );
        assert_eq!(
            common_type(&[DataType::Int64, DataType::Utf8]),
            DataType::Utf8
        );
        assert_eq!(
            common_type(&[DataType::Null, DataType::Float64]),
            DataType::Float64
        );
    }

    #[test]
    fn test_cast_to_rejects_unparseable_values() {
        let strings: ArrayRef = Arc::new(arrow::array::StringArray::from(vec!["1.5", "n/a"]));
        assert!(cast_to(&strings, &DataType::Float64).is_err());

        let numbers: ArrayRef = Arc::new(arrow::array::Int64Array::from(vec![1, 2]));
        let widened = cast_to(&numbers, &DataType::Float64).unwrap();
        assert_eq!(widened.data_type(), &DataType::Float64);
        assert_eq!(widened.null_count(), 0);
    }
}
