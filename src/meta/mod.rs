//! Metadata schema
//!
//! Structured metadata attached to datasets, tables and variables:
//! - [`DatasetMeta`]: publication metadata shared by all tables of a dataset
//! - [`TableMeta`]: title, description and primary key of a table
//! - [`VariableMeta`]: unit, descriptions, presentation hints and provenance
//!   ([`Origin`]) of a single column
//!
//! [`combine`] holds the rules deciding what metadata survives when columns
//! are combined, [`yaml`] reads hand-written metadata files.

pub mod combine;
pub mod dataset;
pub mod license;
pub mod origin;
pub mod processing_log;
pub mod variable;
pub mod yaml;

use std::path::PathBuf;

pub use combine::{
    Combined, ConflictPolicy, FieldConflict, Operation, combine_tables_metadata,
    combine_variables_metadata,
};
pub use dataset::{Channel, DatasetMeta, TableMeta};
pub use license::{License, Source};
pub use origin::Origin;
pub use processing_log::{LogEntry, ProcessingLog};
pub use variable::{FaqLink, ProcessingLevel, VariableMeta, VariablePresentationMeta};
pub use yaml::MetadataFile;

/// Errors raised while combining or loading metadata
#[derive(Debug, thiserror::Error)]
pub enum MetaError {
    #[error("Metadata conflict in column '{column}' for field '{field}': {values}")]
    Conflict {
        column: String,
        field: String,
        values: String,
    },
    #[error("Metadata file not found: {0}")]
    FileNotFound(PathBuf),
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
