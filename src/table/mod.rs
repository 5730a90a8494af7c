//! Tables with metadata
//!
//! A [`Table`] is an Arrow [`RecordBatch`] plus table level metadata
//! ([`TableMeta`]) and one [`VariableMeta`] per column. Every operation
//! returns a new table and decides what happens to the metadata of the
//! columns it touches:
//!
//! - row subsetting ([`Table::filter`], [`Table::slice`]) keeps metadata verbatim
//! - [`Table::select`] and [`Table::drop_columns`] keep the surviving columns' metadata
//! - [`Table::rename`] moves metadata to the new name and logs the rename
//! - [`concat`], [`merge`], [`Table::melt`], [`Table::pivot`] and
//!   [`Table::group_by`] combine metadata with [`crate::meta::combine`]

pub mod concat;
pub mod error;
pub mod groupby;
pub(crate) mod kernels;
pub mod merge;
pub mod reshape;
pub mod variable;

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, BooleanArray};
use arrow::compute::{SortColumn, SortOptions, filter_record_batch, lexsort_to_indices, take_record_batch};
use arrow::datatypes::{Field, FieldRef, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use arrow::util::display::array_value_to_string;
use tracing::warn;

pub use concat::{ConcatOptions, concat};
pub use error::{TableError, TableResult};
pub use groupby::{AggFunc, GroupBy};
pub use merge::{JoinType, MergeOptions, merge};
pub use variable::Variable;

use crate::meta::{LogEntry, MetadataFile, TableMeta, VariableMeta};
use crate::validation::underscore;
use kernels::{build_batch, encode_rows};

/// Columnar data plus metadata
#[derive(Debug, Clone)]
pub struct Table {
    data: RecordBatch,
    pub metadata: TableMeta,
    fields: BTreeMap<String, VariableMeta>,
}

impl Table {
    /// Wrap a batch; every column starts with empty metadata
    pub fn new(data: RecordBatch) -> TableResult<Self> {
        Self::from_parts(data, TableMeta::default(), BTreeMap::new())
    }

    pub fn empty() -> Self {
        Self {
            data: RecordBatch::new_empty(Arc::new(Schema::empty())),
            metadata: TableMeta::default(),
            fields: BTreeMap::new(),
        }
    }

    /// Assemble a table from a batch and metadata
    ///
    /// Columns without an entry in `fields` get empty metadata; entries for
    /// columns that are not in the batch are discarded.
    pub fn from_parts(
        data: RecordBatch,
        metadata: TableMeta,
        mut fields: BTreeMap<String, VariableMeta>,
    ) -> TableResult<Self> {
        let mut seen = HashSet::new();
        for field in data.schema().fields() {
            if !seen.insert(field.name().clone()) {
                return Err(TableError::DuplicateColumn(field.name().clone()));
            }
        }
        fields.retain(|name, _| seen.contains(name));
        for name in seen {
            fields.entry(name).or_default();
        }
        let mut table = Self {
            data,
            metadata,
            fields,
        };
        table.retain_primary_key();
        Ok(table)
    }

    /// Build a table from variables of equal length
    pub fn from_variables(variables: Vec<Variable>) -> TableResult<Self> {
        let num_rows = variables.first().map(Variable::len).unwrap_or(0);
        let columns = variables
            .into_iter()
            .map(|v| {
                if v.len() != num_rows {
                    return Err(TableError::LengthMismatch {
                        column: v.name().to_string(),
                        expected: num_rows,
                        found: v.len(),
                    });
                }
                let (name, values, meta) = v.into_parts();
                Ok((name, values, meta))
            })
            .collect::<TableResult<Vec<_>>>()?;
        Self::assemble(columns, num_rows, TableMeta::default())
    }

    /// Build a table from (name, values, metadata) triples
    pub(crate) fn assemble(
        columns: Vec<(String, ArrayRef, VariableMeta)>,
        num_rows: usize,
        metadata: TableMeta,
    ) -> TableResult<Self> {
        let mut fields = BTreeMap::new();
        let mut schema_fields: Vec<FieldRef> = Vec::with_capacity(columns.len());
        let mut arrays = Vec::with_capacity(columns.len());
        for (name, values, meta) in columns {
            if fields.insert(name.clone(), meta).is_some() {
                return Err(TableError::DuplicateColumn(name));
            }
            schema_fields.push(Arc::new(Field::new(&name, values.data_type().clone(), true)));
            arrays.push(values);
        }
        let data = build_batch(schema_fields, arrays, num_rows)?;
        let mut table = Self {
            data,
            metadata,
            fields,
        };
        table.retain_primary_key();
        Ok(table)
    }

    pub fn with_metadata(mut self, metadata: TableMeta) -> Self {
        self.metadata = metadata;
        self.retain_primary_key();
        self
    }

    /// Set the primary key; every key must be a column
    pub fn with_primary_key(mut self, keys: &[&str]) -> TableResult<Self> {
        for key in keys {
            self.require(key)?;
        }
        self.metadata.primary_key = keys.iter().map(|k| k.to_string()).collect();
        Ok(self)
    }

    pub fn data(&self) -> &RecordBatch {
        &self.data
    }

    pub fn schema(&self) -> SchemaRef {
        self.data.schema()
    }

    pub fn num_rows(&self) -> usize {
        self.data.num_rows()
    }

    pub fn num_columns(&self) -> usize {
        self.data.num_columns()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.data
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn primary_key(&self) -> &[String] {
        &self.metadata.primary_key
    }

    pub fn column(&self, name: &str) -> TableResult<&ArrayRef> {
        self.data
            .column_by_name(name)
            .ok_or_else(|| TableError::ColumnNotFound(name.to_string()))
    }

    pub fn field(&self, name: &str) -> Option<&VariableMeta> {
        self.fields.get(name)
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut VariableMeta> {
        self.fields.get_mut(name)
    }

    /// Metadata of every column, keyed by column name
    pub fn fields(&self) -> &BTreeMap<String, VariableMeta> {
        &self.fields
    }

    pub fn variable(&self, name: &str) -> TableResult<Variable> {
        let values = self.column(name)?.clone();
        Ok(Variable::new(name, values, self.meta_of(name)))
    }

    /// All columns as variables, in column order
    pub fn variables(&self) -> Vec<Variable> {
        self.column_names()
            .into_iter()
            .zip(self.data.columns().iter())
            .map(|(name, values)| {
                let meta = self.meta_of(&name);
                Variable::new(name, values.clone(), meta)
            })
            .collect()
    }

    /// Keep `columns` in the given order
    pub fn select(&self, columns: &[&str]) -> TableResult<Table> {
        let schema = self.data.schema();
        let mut seen = HashSet::new();
        let mut indices = Vec::with_capacity(columns.len());
        for column in columns {
            if !seen.insert(*column) {
                return Err(TableError::DuplicateColumn(column.to_string()));
            }
            indices.push(
                schema
                    .index_of(column)
                    .map_err(|_| TableError::ColumnNotFound(column.to_string()))?,
            );
        }
        let data = self.data.project(&indices)?;
        Table::from_parts(data, self.metadata.clone(), self.fields.clone())
    }

    /// Remove `columns`
    pub fn drop_columns(&self, columns: &[&str]) -> TableResult<Table> {
        for column in columns {
            self.require(column)?;
        }
        let keep: Vec<String> = self
            .column_names()
            .into_iter()
            .filter(|name| !columns.contains(&name.as_str()))
            .collect();
        let keep: Vec<&str> = keep.iter().map(String::as_str).collect();
        self.select(&keep)
    }

    /// Keep rows where `mask` is true; nulls count as false
    pub fn filter(&self, mask: &BooleanArray) -> TableResult<Table> {
        if mask.len() != self.num_rows() {
            return Err(TableError::LengthMismatch {
                column: "mask".to_string(),
                expected: self.num_rows(),
                found: mask.len(),
            });
        }
        let data = filter_record_batch(&self.data, mask)?;
        Ok(self.with_data(data))
    }

    /// Rows `offset..offset + length`, clamped to the table
    pub fn slice(&self, offset: usize, length: usize) -> Table {
        let offset = offset.min(self.num_rows());
        let length = length.min(self.num_rows() - offset);
        self.with_data(self.data.slice(offset, length))
    }

    pub fn head(&self, n: usize) -> Table {
        self.slice(0, n)
    }

    /// Rename columns; metadata follows each column and the rename is logged
    pub fn rename(&self, pairs: &[(&str, &str)]) -> TableResult<Table> {
        let mut mapping = BTreeMap::new();
        for (old, new) in pairs {
            self.require(old)?;
            mapping.insert(old.to_string(), new.to_string());
        }

        let schema = self.data.schema();
        let mut fields = BTreeMap::new();
        let mut schema_fields: Vec<FieldRef> = Vec::with_capacity(schema.fields().len());
        for field in schema.fields() {
            let old = field.name();
            let new = mapping.get(old).unwrap_or(old);
            let mut meta = self.meta_of(old);
            if new != old {
                meta.log(LogEntry::new(new, vec![old.clone()], "rename"));
            }
            if fields.insert(new.clone(), meta).is_some() {
                return Err(TableError::DuplicateColumn(new.clone()));
            }
            schema_fields.push(Arc::new(field.as_ref().clone().with_name(new)));
        }

        let data = build_batch(schema_fields, self.data.columns().to_vec(), self.num_rows())?;
        let mut metadata = self.metadata.clone();
        for key in metadata.primary_key.iter_mut() {
            if let Some(new) = mapping.get(key) {
                *key = new.clone();
            }
        }
        Ok(Table {
            data,
            metadata,
            fields,
        })
    }

    /// Add `variable` as a column, replacing a column of the same name
    pub fn with_column(&self, variable: Variable) -> TableResult<Table> {
        let num_rows = if self.num_columns() == 0 {
            variable.len()
        } else {
            self.num_rows()
        };
        if variable.len() != num_rows {
            return Err(TableError::LengthMismatch {
                column: variable.name().to_string(),
                expected: num_rows,
                found: variable.len(),
            });
        }

        let (name, values, meta) = variable.into_parts();
        let mut columns: Vec<(String, ArrayRef, VariableMeta)> = self
            .variables()
            .into_iter()
            .map(Variable::into_parts)
            .collect();
        match columns.iter_mut().find(|(n, _, _)| *n == name) {
            Some(slot) => *slot = (name, values, meta),
            None => columns.push((name, values, meta)),
        }
        Table::assemble(columns, num_rows, self.metadata.clone())
    }

    /// Sort rows by `columns`, ascending with nulls first
    pub fn sort_by(&self, columns: &[&str]) -> TableResult<Table> {
        if columns.is_empty() || self.num_rows() < 2 {
            return Ok(self.clone());
        }
        let sort_columns = columns
            .iter()
            .map(|name| -> TableResult<SortColumn> {
                Ok(SortColumn {
                    values: self.column(name)?.clone(),
                    options: Some(SortOptions::default()),
                })
            })
            .collect::<TableResult<Vec<_>>>()?;
        let indices = lexsort_to_indices(&sort_columns, None)?;
        let data = take_record_batch(&self.data, &indices)?;
        Ok(self.with_data(data))
    }

    /// Normalize column names, set `keys` as primary key, check the key is
    /// unique and sort by it
    pub fn format(&self, keys: &[&str]) -> TableResult<Table> {
        let names = self.column_names();
        let mut seen = HashSet::new();
        let mut pairs = Vec::with_capacity(names.len());
        for name in &names {
            let normalized = underscore(name);
            if !seen.insert(normalized.clone()) {
                return Err(TableError::DuplicateColumn(normalized));
            }
            pairs.push((name.as_str(), normalized));
        }
        let pairs: Vec<(&str, &str)> = pairs.iter().map(|(o, n)| (*o, n.as_str())).collect();
        let renamed = self.rename(&pairs)?;

        let keys: Vec<String> = keys.iter().map(|k| underscore(k)).collect();
        let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
        let table = renamed.with_primary_key(&keys)?;
        table.check_primary_key_unique()?;
        table.sort_by(&keys)
    }

    /// Fail when two rows share the same primary key values
    pub fn check_primary_key_unique(&self) -> TableResult<()> {
        let keys = self.primary_key();
        if keys.is_empty() || self.num_rows() < 2 {
            return Ok(());
        }
        let columns = keys
            .iter()
            .map(|k| self.column(k).cloned())
            .collect::<TableResult<Vec<_>>>()?;
        let rows = encode_rows(&columns)?;

        let mut seen = HashSet::with_capacity(rows.len());
        for (index, row) in rows.into_iter().enumerate() {
            if !seen.insert(row) {
                return Err(TableError::DuplicateKeys(self.describe_row(keys, index)));
            }
        }
        Ok(())
    }

    /// Apply a YAML metadata file to this table
    ///
    /// See [`crate::meta::yaml`] for the file layout and precedence rules.
    pub fn update_metadata_from_yaml(&mut self, path: &Path, table_name: &str) -> TableResult<()> {
        let file = MetadataFile::load(path)?;
        self.apply_metadata_file(&file, table_name);
        Ok(())
    }

    /// Apply already parsed metadata; common definitions skip key columns
    pub fn apply_metadata_file(&mut self, file: &MetadataFile, table_name: &str) {
        let Some(definition) = file.table(table_name) else {
            warn!("Table '{}' not found in metadata file", table_name);
            return;
        };

        for name in definition.variables.keys() {
            if !self.has_column(name) {
                warn!(
                    "Variable '{}' of table '{}' is described but not in the table, skipping",
                    name, table_name
                );
            }
        }

        let primary_key = self.metadata.primary_key.clone();
        for (name, meta) in self.fields.iter_mut() {
            let include_common = !primary_key.contains(name);
            if let Some(patch) = file.variable_patch(table_name, name, include_common) {
                meta.update(&patch);
            }
        }

        if let Some(title) = &definition.title {
            self.metadata.title = Some(title.clone());
        }
        if let Some(description) = &definition.description {
            self.metadata.description = Some(description.clone());
        }
    }

    fn with_data(&self, data: RecordBatch) -> Table {
        Table {
            data,
            metadata: self.metadata.clone(),
            fields: self.fields.clone(),
        }
    }

    fn meta_of(&self, name: &str) -> VariableMeta {
        self.fields.get(name).cloned().unwrap_or_default()
    }

    fn require(&self, name: &str) -> TableResult<()> {
        if self.has_column(name) {
            Ok(())
        } else {
            Err(TableError::ColumnNotFound(name.to_string()))
        }
    }

    fn retain_primary_key(&mut self) {
        let fields = &self.fields;
        self.metadata.primary_key.retain(|k| fields.contains_key(k));
    }

    /// Human readable `column=value` list for row `index`
    pub(crate) fn describe_row(&self, columns: &[String], index: usize) -> String {
        columns
            .iter()
            .map(|name| {
                let value = self
                    .data
                    .column_by_name(name)
                    .and_then(|array| array_value_to_string(array, index).ok())
                    .unwrap_or_default();
                format!("{name}={value}")
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Default for Table {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match arrow::util::pretty::pretty_format_batches(std::slice::from_ref(&self.data)) {
            Ok(rendered) => write!(f, "{rendered}"),
            Err(_) => Err(fmt::Error),
        }
    }
}
