//! Group-by aggregation

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, Float64Array, Int64Array};
use arrow::datatypes::{DataType, Float64Type};
use arrow::row::OwnedRow;
use serde::{Deserialize, Serialize};

use super::error::TableResult;
use super::kernels::{cast_to, encode_rows, take_rows, take_valid};
use super::Table;
use crate::meta::{LogEntry, ProcessingLevel, VariableMeta};

/// Aggregation applied to each group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggFunc {
    Sum,
    Mean,
    Min,
    Max,
    Count,
    First,
    Last,
}

impl AggFunc {
    pub fn name(&self) -> &'static str {
        match self {
            AggFunc::Sum => "sum",
            AggFunc::Mean => "mean",
            AggFunc::Min => "min",
            AggFunc::Max => "max",
            AggFunc::Count => "count",
            AggFunc::First => "first",
            AggFunc::Last => "last",
        }
    }

    /// Whether the result is a new value rather than one picked from the group
    pub fn derives_values(&self) -> bool {
        matches!(self, AggFunc::Sum | AggFunc::Mean | AggFunc::Count)
    }
}

impl fmt::Display for AggFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AggFunc {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sum" => Ok(AggFunc::Sum),
            "mean" | "avg" => Ok(AggFunc::Mean),
            "min" => Ok(AggFunc::Min),
            "max" => Ok(AggFunc::Max),
            "count" => Ok(AggFunc::Count),
            "first" => Ok(AggFunc::First),
            "last" => Ok(AggFunc::Last),
            _ => Err(format!(
                "Invalid aggregation: {}. Expected: sum, mean, min, max, count, first, last",
                s
            )),
        }
    }
}

/// Rows of a table grouped by key columns, see [`Table::group_by`]
#[derive(Debug)]
pub struct GroupBy<'a> {
    table: &'a Table,
    keys: Vec<String>,
}

impl Table {
    /// Group rows by the values of `keys`
    pub fn group_by(&self, keys: &[&str]) -> TableResult<GroupBy<'_>> {
        for key in keys {
            self.require(key)?;
        }
        Ok(GroupBy {
            table: self,
            keys: keys.iter().map(|k| k.to_string()).collect(),
        })
    }
}

impl GroupBy<'_> {
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Aggregate each `(column, function)` pair over the groups
    ///
    /// The result has one row per group, sorted by the keys, and the keys as
    /// primary key. Aggregated columns keep their name.
    pub fn agg(&self, aggregations: &[(&str, AggFunc)]) -> TableResult<Table> {
        let table = self.table;
        let key_arrays = self
            .keys
            .iter()
            .map(|k| table.column(k).cloned())
            .collect::<TableResult<Vec<_>>>()?;
        let groups = if key_arrays.is_empty() {
            // No keys: the whole table is a single group
            if table.num_rows() == 0 {
                Vec::new()
            } else {
                vec![(0..table.num_rows() as u64).collect()]
            }
        } else {
            group_rows(&encode_rows(&key_arrays)?)
        };

        let firsts: Vec<u64> = groups.iter().map(|members| members[0]).collect();
        let mut columns: Vec<(String, ArrayRef, VariableMeta)> = Vec::new();
        for (name, array) in self.keys.iter().zip(key_arrays.iter()) {
            columns.push((name.clone(), take_valid(array, &firsts)?, table.meta_of(name)));
        }

        for (column, func) in aggregations {
            let source = table.column(column)?;
            let values = aggregate(source, &groups, *func)?;
            columns.push((column.to_string(), values, aggregated_meta(table.meta_of(column), column, *func)));
        }

        let mut metadata = table.metadata.clone();
        metadata.primary_key = self.keys.clone();
        Table::assemble(columns, groups.len(), metadata)
    }
}

/// Row indices of each group, groups sorted by key
fn group_rows(rows: &[OwnedRow]) -> Vec<Vec<u64>> {
    let mut index: HashMap<&OwnedRow, usize> = HashMap::new();
    let mut groups: Vec<Vec<u64>> = Vec::new();
    for (i, row) in rows.iter().enumerate() {
        let group = *index.entry(row).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[group].push(i as u64);
    }
    groups.sort_by(|a, b| rows[a[0] as usize].cmp(&rows[b[0] as usize]));
    groups
}

fn aggregated_meta(mut meta: VariableMeta, column: &str, func: AggFunc) -> VariableMeta {
    if func.derives_values() {
        meta.escalate(ProcessingLevel::Major);
    }
    if func == AggFunc::Count {
        meta.unit = None;
        meta.short_unit = None;
    }
    meta.log(LogEntry::new(column, vec![column.to_string()], func.name()));
    meta
}

fn aggregate(source: &ArrayRef, groups: &[Vec<u64>], func: AggFunc) -> TableResult<ArrayRef> {
    let valid = |members: &Vec<u64>| -> Vec<u64> {
        members
            .iter()
            .copied()
            .filter(|&i| source.is_valid(i as usize))
            .collect()
    };

    match func {
        AggFunc::Sum | AggFunc::Mean => {
            let floats = cast_to(source, &DataType::Float64)?;
            let floats = floats.as_primitive::<Float64Type>();
            let values: Vec<Option<f64>> = groups
                .iter()
                .map(|members| {
                    let present = valid(members);
                    if present.is_empty() {
                        return None;
                    }
                    let sum: f64 = present.iter().map(|&i| floats.value(i as usize)).sum();
                    Some(match func {
                        AggFunc::Mean => sum / present.len() as f64,
                        _ => sum,
                    })
                })
                .collect();
            Ok(Arc::new(Float64Array::from(values)))
        }
        AggFunc::Count => {
            let counts: Vec<i64> = groups.iter().map(|m| valid(m).len() as i64).collect();
            Ok(Arc::new(Int64Array::from(counts)))
        }
        AggFunc::First | AggFunc::Last => {
            let picks: Vec<Option<u64>> = groups
                .iter()
                .map(|members| {
                    let present = valid(members);
                    if func == AggFunc::First {
                        present.first().copied()
                    } else {
                        present.last().copied()
                    }
                })
                .collect();
            Ok(take_rows(source, &picks)?)
        }
        AggFunc::Min | AggFunc::Max => {
            let rows = encode_rows(std::slice::from_ref(source))?;
            let wanted = if func == AggFunc::Min {
                Ordering::Less
            } else {
                Ordering::Greater
            };
            let picks: Vec<Option<u64>> = groups
                .iter()
                .map(|members| {
                    valid(members).into_iter().reduce(|best, i| {
                        if rows[i as usize].cmp(&rows[best as usize]) == wanted {
                            i
                        } else {
                            best
                        }
                    })
                })
                .collect();
            Ok(take_rows(source, &picks)?)
        }
    }
}
