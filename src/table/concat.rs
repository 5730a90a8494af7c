//! Row-wise concatenation of tables

use arrow::array::{ArrayRef, new_null_array};
use arrow::datatypes::DataType;

use super::error::TableResult;
use super::kernels::{cast_to, common_type};
use super::Table;
use crate::meta::{
    ConflictPolicy, Operation, VariableMeta, combine_tables_metadata, combine_variables_metadata,
};

/// Options for [`concat`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ConcatOptions {
    pub conflict_policy: ConflictPolicy,
}

impl ConcatOptions {
    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }
}

/// Stack `tables` on top of each other
///
/// Columns are the union of all input columns in first-seen order. A column
/// missing from an input is filled with nulls for that input's rows. Values
/// are stored as the common type of the inputs (mixed numerics as Float64,
/// any other mix as Utf8), and a value that cannot be cast is an error.
/// Metadata of each column is combined across the inputs that have it.
pub fn concat(tables: &[&Table], options: &ConcatOptions) -> TableResult<Table> {
    if tables.is_empty() {
        return Ok(Table::empty());
    }

    let mut names: Vec<String> = Vec::new();
    for table in tables {
        for name in table.column_names() {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }

    let num_rows = tables.iter().map(|t| t.num_rows()).sum();
    let mut columns: Vec<(String, ArrayRef, VariableMeta)> = Vec::with_capacity(names.len());
    for name in names {
        let types: Vec<DataType> = tables
            .iter()
            .filter_map(|t| t.column(&name).ok())
            .map(|c| c.data_type().clone())
            .collect();
        let target = common_type(&types);

        let pieces = tables
            .iter()
            .map(|t| -> TableResult<ArrayRef> {
                match t.column(&name) {
                    Ok(values) => Ok(cast_to(values, &target)?),
                    Err(_) => Ok(new_null_array(&target, t.num_rows())),
                }
            })
            .collect::<TableResult<Vec<ArrayRef>>>()?;
        let refs: Vec<&dyn arrow::array::Array> = pieces.iter().map(|a| a.as_ref()).collect();
        let values = arrow::compute::concat(&refs)?;

        let inputs: Vec<(&str, &VariableMeta)> = tables
            .iter()
            .filter_map(|t| t.field(&name))
            .map(|meta| (name.as_str(), meta))
            .collect();
        let meta = combine_variables_metadata(&inputs, Operation::Concat, &name, options.conflict_policy)
            .resolve(&name, options.conflict_policy)?;

        columns.push((name, values, meta));
    }

    let metas: Vec<_> = tables.iter().map(|t| &t.metadata).collect();
    Table::assemble(columns, num_rows, combine_tables_metadata(&metas))
}
