//! JSON metadata sidecar
//!
//! Every data file `<table>.<ext>` has a sidecar `<table>.meta.json` holding
//! the table metadata with one entry per column under `fields`:
//!
//! ```json
//! {
//!   "short_name": "population",
//!   "primary_key": ["country", "year"],
//!   "fields": {
//!     "population": { "unit": "people", "origins": [{ "producer": "UN" }] }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};

use super::FormatError;
use crate::meta::{TableMeta, VariableMeta};
use crate::table::Table;

/// Key under which the sidecar JSON is embedded in Arrow schema metadata
pub const SCHEMA_METADATA_KEY: &str = "owid:table";

/// Serialized metadata of a table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableSidecar {
    #[serde(flatten)]
    pub table: TableMeta,
    #[serde(default)]
    pub fields: BTreeMap<String, VariableMeta>,
}

impl TableSidecar {
    pub fn from_table(table: &Table) -> Self {
        Self {
            table: table.metadata.clone(),
            fields: table.fields().clone(),
        }
    }

    pub fn to_json(&self) -> Result<String, FormatError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(content: &str) -> Result<Self, FormatError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn from_slice(content: &[u8]) -> Result<Self, FormatError> {
        Ok(serde_json::from_slice(content)?)
    }

    pub fn read(path: &Path) -> Result<Self, FormatError> {
        let content = std::fs::read(path)?;
        Self::from_slice(&content)
    }

    pub fn write(&self, path: &Path) -> Result<(), FormatError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Attach this metadata to `data`
    pub fn into_table(self, data: RecordBatch) -> Result<Table, FormatError> {
        Ok(Table::from_parts(data, self.table, self.fields)?)
    }
}

/// Sidecar path of a data file: `gdp.feather` → `gdp.meta.json`
pub fn sidecar_path(data_path: &Path) -> PathBuf {
    data_path.with_extension("meta.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sidecar_path() {
        assert_eq!(
            sidecar_path(Path::new("garden/un/2024/wpp/population.feather")),
            PathBuf::from("garden/un/2024/wpp/population.meta.json")
        );
    }

    #[test]
    fn test_fields_are_nested_and_table_flattened() {
        let mut sidecar = TableSidecar {
            table: TableMeta::new("population"),
            ..Default::default()
        };
        sidecar.table.primary_key = vec!["country".into()];
        sidecar
            .fields
            .insert("population".into(), VariableMeta::new().with_unit("people", None));

        let value: serde_json::Value = serde_json::from_str(&sidecar.to_json().unwrap()).unwrap();
        assert_eq!(value["short_name"], "population");
        assert_eq!(value["primary_key"][0], "country");
        assert_eq!(value["fields"]["population"]["unit"], "people");
        assert!(value.get("title").is_none());

        let parsed = TableSidecar::from_json(&sidecar.to_json().unwrap()).unwrap();
        assert_eq!(parsed, sidecar);
    }
}
