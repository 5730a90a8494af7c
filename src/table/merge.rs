//! Key-based joins of two tables

use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use arrow::array::{Array, ArrayRef};
use arrow::row::OwnedRow;
use serde::{Deserialize, Serialize};

use super::error::{TableError, TableResult};
use super::kernels::{KeyEncoder, cast_to, take_rows};
use super::Table;
use crate::meta::{
    ConflictPolicy, LogEntry, Operation, VariableMeta, combine_tables_metadata,
    combine_variables_metadata,
};

/// Which rows a merge keeps
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinType {
    /// Rows whose key is in both tables
    #[default]
    Inner,
    /// Every left row
    Left,
    /// Every right row
    Right,
    /// Every row of either table
    Outer,
}

impl FromStr for JoinType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "inner" => Ok(JoinType::Inner),
            "left" => Ok(JoinType::Left),
            "right" => Ok(JoinType::Right),
            "outer" | "full" => Ok(JoinType::Outer),
            _ => Err(format!(
                "Invalid join type: {}. Expected: inner, left, right, outer",
                s
            )),
        }
    }
}

/// Options for [`merge`]
#[derive(Debug, Clone)]
pub struct MergeOptions {
    /// Key columns; empty means every column both tables share
    pub on: Vec<String>,
    pub how: JoinType,
    /// Appended to overlapping non-key columns of the left and right table
    pub suffixes: (String, String),
    pub conflict_policy: ConflictPolicy,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            on: Vec::new(),
            how: JoinType::Inner,
            suffixes: ("_x".to_string(), "_y".to_string()),
            conflict_policy: ConflictPolicy::Warn,
        }
    }
}

impl MergeOptions {
    pub fn on(keys: &[&str]) -> Self {
        Self {
            on: keys.iter().map(|k| k.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn with_how(mut self, how: JoinType) -> Self {
        self.how = how;
        self
    }

    pub fn with_suffixes(mut self, left: impl Into<String>, right: impl Into<String>) -> Self {
        self.suffixes = (left.into(), right.into());
        self
    }

    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }
}

/// Join `left` and `right` on key columns
///
/// Key columns appear once, with values taken from whichever side has the
/// row, and carry the combination of both sides' metadata. Other columns
/// keep the metadata of the table they came from; columns present on both
/// sides get the configured suffixes and a rename entry in their log.
pub fn merge(left: &Table, right: &Table, options: &MergeOptions) -> TableResult<Table> {
    let keys: Vec<String> = if options.on.is_empty() {
        left.column_names()
            .into_iter()
            .filter(|name| right.has_column(name))
            .collect()
    } else {
        options.on.clone()
    };
    if keys.is_empty() {
        return Err(TableError::InvalidArgument(
            "no common columns to merge on".to_string(),
        ));
    }

    let left_keys = keys
        .iter()
        .map(|k| left.column(k).cloned())
        .collect::<TableResult<Vec<_>>>()?;
    let right_keys = keys
        .iter()
        .zip(left_keys.iter())
        .map(|(k, l)| -> TableResult<ArrayRef> { Ok(cast_to(right.column(k)?, l.data_type())?) })
        .collect::<TableResult<Vec<_>>>()?;

    let encoder = KeyEncoder::new(&left_keys)?;
    let left_rows = encoder.encode(&left_keys)?;
    let right_rows = encoder.encode(&right_keys)?;
    let pairs = join_indices(&left_rows, &right_rows, options.how);
    let left_idx: Vec<Option<u64>> = pairs.iter().map(|(l, _)| *l).collect();
    let right_idx: Vec<Option<u64>> = pairs.iter().map(|(_, r)| *r).collect();

    let (left_suffix, right_suffix) = &options.suffixes;
    let mut columns: Vec<(String, ArrayRef, VariableMeta)> = Vec::new();

    for name in left.column_names() {
        if let Some(position) = keys.iter().position(|k| *k == name) {
            let values = coalesce(&left_keys[position], &right_keys[position], &pairs)?;
            let meta = combine_variables_metadata(
                &[
                    (name.as_str(), &left.meta_of(&name)),
                    (name.as_str(), &right.meta_of(&name)),
                ],
                Operation::Merge,
                &name,
                options.conflict_policy,
            )
            .resolve(&name, options.conflict_policy)?;
            columns.push((name, values, meta));
        } else {
            let values = take_rows(left.column(&name)?, &left_idx)?;
            let (name, meta) = if right.has_column(&name) {
                suffixed(&name, left_suffix, left.meta_of(&name))
            } else {
                let meta = left.meta_of(&name);
                (name, meta)
            };
            columns.push((name, values, meta));
        }
    }

    for name in right.column_names() {
        if keys.contains(&name) {
            continue;
        }
        let values = take_rows(right.column(&name)?, &right_idx)?;
        let (name, meta) = if left.has_column(&name) {
            suffixed(&name, right_suffix, right.meta_of(&name))
        } else {
            let meta = right.meta_of(&name);
            (name, meta)
        };
        columns.push((name, values, meta));
    }

    let metadata = combine_tables_metadata(&[&left.metadata, &right.metadata]);
    Table::assemble(columns, pairs.len(), metadata)
}

type RowPair = (Option<u64>, Option<u64>);

/// Matching (left, right) row indices in output order
fn join_indices(left: &[OwnedRow], right: &[OwnedRow], how: JoinType) -> Vec<RowPair> {
    fn index(rows: &[OwnedRow]) -> HashMap<&OwnedRow, Vec<u64>> {
        let mut index: HashMap<&OwnedRow, Vec<u64>> = HashMap::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            index.entry(row).or_default().push(i as u64);
        }
        index
    }

    let mut pairs = Vec::new();
    if how == JoinType::Right {
        let left_index = index(left);
        for (j, row) in right.iter().enumerate() {
            match left_index.get(row) {
                Some(matches) => pairs.extend(matches.iter().map(|&i| (Some(i), Some(j as u64)))),
                None => pairs.push((None, Some(j as u64))),
            }
        }
        return pairs;
    }

    let right_index = index(right);
    let mut matched = HashSet::new();
    for (i, row) in left.iter().enumerate() {
        match right_index.get(row) {
            Some(matches) => {
                matched.extend(matches.iter().copied());
                pairs.extend(matches.iter().map(|&j| (Some(i as u64), Some(j))));
            }
            None if matches!(how, JoinType::Left | JoinType::Outer) => {
                pairs.push((Some(i as u64), None));
            }
            None => {}
        }
    }
    if how == JoinType::Outer {
        for j in 0..right.len() as u64 {
            if !matched.contains(&j) {
                pairs.push((None, Some(j)));
            }
        }
    }
    pairs
}

/// Key values from whichever side has the row
fn coalesce(left: &ArrayRef, right: &ArrayRef, pairs: &[RowPair]) -> TableResult<ArrayRef> {
    let both = arrow::compute::concat(&[left.as_ref(), right.as_ref()])?;
    let offset = left.len() as u64;
    let indices: Vec<Option<u64>> = pairs
        .iter()
        .map(|(l, r)| l.or(r.map(|r| offset + r)))
        .collect();
    Ok(take_rows(&both, &indices)?)
}

fn suffixed(name: &str, suffix: &str, mut meta: VariableMeta) -> (String, VariableMeta) {
    let new_name = format!("{name}{suffix}");
    if new_name != name {
        meta.log(LogEntry::new(&new_name, vec![name.to_string()], "rename"));
    }
    (new_name, meta)
}
