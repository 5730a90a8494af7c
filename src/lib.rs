//! OWID catalog - metadata-carrying tables
//!
//! Provides:
//! - Metadata schema for datasets, tables and variables (origins, licenses,
//!   processing level, processing log)
//! - Tables that keep per-column metadata through select, filter, concat,
//!   merge, melt, pivot and groupby
//! - Feather/parquet/csv files with a JSON metadata sidecar
//! - Dataset directories with a publish lifecycle
//! - Catalog search and fetch over pluggable storage backends
//! - Metadata validation

pub mod catalog;
pub mod config;
pub mod dataset;
pub mod io;
pub mod meta;
pub mod storage;
pub mod table;
pub mod validation;

// Re-export commonly used types
pub use catalog::{Catalog, CatalogEntry, CatalogError, CatalogIndex, CatalogQuery, reindex};
pub use config::{CatalogConfig, ConfigError};
pub use dataset::{Dataset, DatasetError};
pub use io::{Format, FormatError, TableSidecar, read_table, write_table};
pub use meta::{
    Channel, ConflictPolicy, DatasetMeta, License, LogEntry, MetaError, MetadataFile, Origin,
    ProcessingLevel, ProcessingLog, Source, TableMeta, VariableMeta,
};
pub use storage::{StorageBackend, StorageError};
#[cfg(feature = "native-fs")]
pub use storage::filesystem::FileSystemStorageBackend;
#[cfg(feature = "api-backend")]
pub use storage::http::HttpStorageBackend;
pub use table::{
    AggFunc, ConcatOptions, JoinType, MergeOptions, Table, TableError, Variable, concat, merge,
};
pub use validation::{ValidationReport, validate_dataset, validate_table};
