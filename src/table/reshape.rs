//! Wide/long reshaping: melt and pivot

use std::collections::HashMap;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, StringArray};
use arrow::util::display::array_value_to_string;

use super::error::{TableError, TableResult};
use super::kernels::{cast_to, common_type, encode_rows, take_rows, take_valid};
use super::Table;
use crate::meta::{ConflictPolicy, LogEntry, Operation, VariableMeta, combine_variables_metadata};

impl Table {
    /// Unpivot `value_vars` into `var_name` / `value_name` columns
    ///
    /// `value_vars` defaults to every column not in `id_vars`. Output rows
    /// are grouped by melted column, in the order of `value_vars`. The value
    /// column carries the combined metadata of the melted columns, so every
    /// origin survives.
    pub fn melt(
        &self,
        id_vars: &[&str],
        value_vars: Option<&[&str]>,
        var_name: &str,
        value_name: &str,
    ) -> TableResult<Table> {
        let value_vars: Vec<String> = match value_vars {
            Some(vars) => vars.iter().map(|v| v.to_string()).collect(),
            None => self
                .column_names()
                .into_iter()
                .filter(|name| !id_vars.contains(&name.as_str()))
                .collect(),
        };
        if value_vars.is_empty() {
            return Err(TableError::InvalidArgument(
                "melt needs at least one value column".to_string(),
            ));
        }

        let n = self.num_rows();
        let repeats = value_vars.len();
        let num_rows = n * repeats;
        let repeated: Vec<u64> = (0..repeats).flat_map(|_| 0..n as u64).collect();

        let mut columns: Vec<(String, ArrayRef, VariableMeta)> = Vec::with_capacity(id_vars.len() + 2);
        for id in id_vars {
            let values = take_valid(self.column(id)?, &repeated)?;
            columns.push((id.to_string(), values, self.meta_of(id)));
        }

        let labels: Vec<&str> = value_vars
            .iter()
            .flat_map(|v| std::iter::repeat_n(v.as_str(), n))
            .collect();
        columns.push((var_name.to_string(), Arc::new(StringArray::from(labels)), VariableMeta::new()));

        let sources = value_vars
            .iter()
            .map(|v| self.column(v).cloned())
            .collect::<TableResult<Vec<_>>>()?;
        let types: Vec<_> = sources.iter().map(|s| s.data_type().clone()).collect();
        let target = common_type(&types);
        let cast = sources
            .iter()
            .map(|s| cast_to(s, &target))
            .collect::<Result<Vec<_>, _>>()?;
        let refs: Vec<&dyn Array> = cast.iter().map(|a| a.as_ref()).collect();
        let values = arrow::compute::concat(&refs)?;

        let metas: Vec<VariableMeta> = value_vars.iter().map(|v| self.meta_of(v)).collect();
        let inputs: Vec<(&str, &VariableMeta)> = value_vars
            .iter()
            .map(String::as_str)
            .zip(metas.iter())
            .collect();
        let meta = combine_variables_metadata(&inputs, Operation::Melt, value_name, ConflictPolicy::Warn)
            .metadata;
        columns.push((value_name.to_string(), values, meta));

        let mut metadata = self.metadata.clone();
        metadata.primary_key = id_vars
            .iter()
            .map(|id| id.to_string())
            .chain(std::iter::once(var_name.to_string()))
            .collect();
        Table::assemble(columns, num_rows, metadata)
    }

    /// Spread `values` into one column per distinct label of `columns`
    ///
    /// Labels become column names in first-seen order and each new column
    /// inherits the metadata of `values`. Rows with a null label are
    /// skipped; two rows with the same index and label are an error.
    ///
    /// A label naming a column that was melted into `values` gets that
    /// column as its parent, so a melt followed by a pivot restores the
    /// original lineage.
    pub fn pivot(&self, index: &[&str], columns: &str, values: &str) -> TableResult<Table> {
        if index.is_empty() {
            return Err(TableError::InvalidArgument(
                "pivot needs at least one index column".to_string(),
            ));
        }
        let label_array = self.column(columns)?;
        let value_array = self.column(values)?;
        let index_arrays = index
            .iter()
            .map(|name| self.column(name).cloned())
            .collect::<TableResult<Vec<_>>>()?;
        let index_rows = encode_rows(&index_arrays)?;

        let mut groups: HashMap<&arrow::row::OwnedRow, usize> = HashMap::new();
        let mut group_rows: Vec<u64> = Vec::new();
        let mut labels: Vec<String> = Vec::new();
        let mut label_pos: HashMap<String, usize> = HashMap::new();
        let mut cells: Vec<Vec<Option<u64>>> = Vec::new();

        for row in 0..self.num_rows() {
            if label_array.is_null(row) {
                continue;
            }
            let label = array_value_to_string(label_array, row)?;

            let group = *groups.entry(&index_rows[row]).or_insert_with(|| {
                group_rows.push(row as u64);
                group_rows.len() - 1
            });
            let column = *label_pos.entry(label.clone()).or_insert_with(|| {
                labels.push(label);
                cells.push(Vec::new());
                labels.len() - 1
            });

            let cell = &mut cells[column];
            if cell.len() <= group {
                cell.resize(group + 1, None);
            }
            if cell[group].is_some() {
                let mut keys: Vec<String> = index.iter().map(|k| k.to_string()).collect();
                keys.push(columns.to_string());
                return Err(TableError::DuplicateKeys(self.describe_row(&keys, row)));
            }
            cell[group] = Some(row as u64);
        }

        let num_rows = group_rows.len();
        let mut output: Vec<(String, ArrayRef, VariableMeta)> = Vec::with_capacity(index.len() + labels.len());
        for (name, array) in index.iter().zip(index_arrays.iter()) {
            output.push((name.to_string(), take_valid(array, &group_rows)?, self.meta_of(name)));
        }

        let source = self.meta_of(values);
        for (label, mut cell) in labels.into_iter().zip(cells) {
            cell.resize(num_rows, None);
            let mut meta = source.clone();
            let parent = if source.processing_log.entries().iter().any(|e| {
                e.variable == values
                    && e.operation == Operation::Melt.name()
                    && e.parents.contains(&label)
            }) {
                label.clone()
            } else {
                values.to_string()
            };
            meta.log(
                LogEntry::new(&label, vec![parent], "pivot")
                    .with_comment(format!("{columns}={label}")),
            );
            output.push((label, take_rows(value_array, &cell)?, meta));
        }

        let mut metadata = self.metadata.clone();
        metadata.primary_key = index.iter().map(|k| k.to_string()).collect();
        Table::assemble(output, num_rows, metadata)
    }
}
