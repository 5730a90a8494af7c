//! YAML metadata files
//!
//! Steps keep hand-written metadata next to their code:
//!
//! ```yaml
//! definitions:
//!   common:
//!     processing_level: minor
//!     origins:
//!       - producer: UN
//! dataset:
//!   title: World Population Prospects
//! tables:
//!   population:
//!     title: Population
//!     variables:
//!       population:
//!         title: Population
//!         unit: people
//! ```
//!
//! Definitions are applied from the most general to the most specific:
//! `definitions.common`, then `tables.<table>.common`, then
//! `tables.<table>.variables.<column>`. Anchors, aliases and `<<` merge keys
//! are resolved; Jinja templating is not.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::MetaError;
use super::dataset::DatasetMeta;
use super::variable::VariableMeta;

/// Shared definitions block
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Definitions {
    /// Applied to every variable of every table
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub common: Option<VariableMeta>,
    /// Anchor targets and other helper entries
    #[serde(flatten)]
    pub other: BTreeMap<String, serde_yaml::Value>,
}

/// Metadata for one table of the file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Applied to every variable of this table
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub common: Option<VariableMeta>,
    #[serde(default)]
    pub variables: BTreeMap<String, VariableMeta>,
}

/// Parsed metadata file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataFile {
    #[serde(default)]
    pub definitions: Definitions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset: Option<DatasetMeta>,
    #[serde(default)]
    pub tables: BTreeMap<String, TableDefinition>,
}

impl MetadataFile {
    /// Parse YAML content
    pub fn parse(content: &str) -> Result<Self, MetaError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let mut value: serde_yaml::Value = serde_yaml::from_str(content)?;
        value.apply_merge()?;
        if value.is_null() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_value(value)?)
    }

    /// Read and parse a metadata file
    pub fn load(path: &Path) -> Result<Self, MetaError> {
        if !path.exists() {
            return Err(MetaError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn table(&self, table_name: &str) -> Option<&TableDefinition> {
        self.tables.get(table_name)
    }

    /// Effective patch for `column` of `table_name`, or `None` when the file
    /// says nothing specific about that column.
    ///
    /// Common definitions only apply to columns that are listed under the
    /// table's `variables`, or to every column when `include_common` is set.
    pub fn variable_patch(
        &self,
        table_name: &str,
        column: &str,
        include_common: bool,
    ) -> Option<VariableMeta> {
        let table = self.tables.get(table_name);
        let specific = table.and_then(|t| t.variables.get(column));
        if specific.is_none() && !include_common {
            return None;
        }

        let mut patch = VariableMeta::default();
        if let Some(common) = &self.definitions.common {
            patch.update(common);
        }
        if let Some(common) = table.and_then(|t| t.common.as_ref()) {
            patch.update(common);
        }
        if let Some(specific) = specific {
            patch.update(specific);
        }
        Some(patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::ProcessingLevel;

    const YAML: &str = r#"
definitions:
  common:
    processing_level: minor
    origins:
      - producer: UN
        title: World Population Prospects
  others:
    description_processing: &processing Interpolated between census years.

dataset:
  title: Population
  update_period_days: 365

tables:
  population:
    title: Population by country
    common:
      unit: people
    variables:
      population:
        title: Population
        description_processing: *processing
      population_density:
        title: Population density
        unit: people per km²
"#;

    #[test]
    fn test_parse_metadata_file() {
        let file = MetadataFile::parse(YAML).unwrap();
        let dataset = file.dataset.as_ref().unwrap();
        assert_eq!(dataset.title.as_deref(), Some("Population"));
        assert_eq!(dataset.update_period_days, Some(365));

        let table = file.table("population").unwrap();
        assert_eq!(table.title.as_deref(), Some("Population by country"));
        assert_eq!(table.variables.len(), 2);
    }

    #[test]
    fn test_specific_definitions_override_common_ones() {
        let file = MetadataFile::parse(YAML).unwrap();

        let population = file.variable_patch("population", "population", false).unwrap();
        assert_eq!(population.unit.as_deref(), Some("people"));
        assert_eq!(population.processing_level, Some(ProcessingLevel::Minor));
        assert_eq!(population.origins.len(), 1);
        assert_eq!(
            population.description_processing.as_deref(),
            Some("Interpolated between census years.")
        );

        let density = file
            .variable_patch("population", "population_density", false)
            .unwrap();
        assert_eq!(density.unit.as_deref(), Some("people per km²"));

        assert!(file.variable_patch("population", "year", false).is_none());
        assert!(file.variable_patch("population", "year", true).is_some());
    }

    #[test]
    fn test_empty_file() {
        let file = MetadataFile::parse("").unwrap();
        assert!(file.tables.is_empty());
    }
}
