//! Dataset directories
//!
//! A dataset is a directory holding an `index.json` with the dataset
//! metadata and, per table, one data file per configured format plus a
//! `<table>.meta.json` sidecar:
//!
//! ```text
//! garden/un/2024-07-12/un_wpp/
//! ├── index.json
//! ├── population.feather
//! ├── population.parquet
//! └── population.meta.json
//! ```
//!
//! Datasets are enriched by adding tables and patching metadata, then
//! published. Publishing validates every table and freezes the dataset;
//! a frozen dataset rejects further writes.

use std::fs::File;
use std::io::{BufReader, Read as _};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use tracing::{info, warn};

use crate::io::{self, Format, FormatError, TableSidecar, sidecar_path};
use crate::meta::{DatasetMeta, MetaError, MetadataFile};
use crate::table::Table;
use crate::validation::{NameError, validate_dataset, validate_short_name};

/// Name of the dataset index file
pub const INDEX_FILE: &str = "index.json";

const SIDECAR_SUFFIX: &str = ".meta.json";
const BUFFER_SIZE: usize = 8192;

/// Errors raised by dataset operations
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("Dataset is published and frozen: {0}")]
    Frozen(String),
    #[error("Dataset not found: {0}")]
    NotFound(PathBuf),
    #[error("Table not found in dataset: {0}")]
    TableNotFound(String),
    #[error("Table has no short_name")]
    MissingShortName,
    #[error("Invalid short name: {0}")]
    InvalidName(#[from] NameError),
    #[error("Dataset failed validation:\n{0}")]
    ValidationFailed(String),
    #[error("Format error: {0}")]
    Format(#[from] FormatError),
    #[error("Metadata error: {0}")]
    Meta(#[from] MetaError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Contents of `index.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DatasetIndex {
    #[serde(flatten)]
    metadata: DatasetMeta,
    #[serde(default = "default_formats")]
    formats: Vec<Format>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    published_at: Option<DateTime<Utc>>,
}

fn default_formats() -> Vec<Format> {
    vec![Format::Feather]
}

/// A dataset directory
#[derive(Debug, Clone)]
pub struct Dataset {
    path: PathBuf,
    pub metadata: DatasetMeta,
    formats: Vec<Format>,
    published_at: Option<DateTime<Utc>>,
}

impl Dataset {
    /// Create (or reset the index of) a dataset directory
    ///
    /// Fails with [`DatasetError::Frozen`] when the directory already holds a
    /// published dataset.
    pub fn create(path: impl AsRef<Path>, metadata: DatasetMeta) -> Result<Self, DatasetError> {
        let path = path.as_ref().to_path_buf();
        if path.join(INDEX_FILE).exists() {
            let existing = Self::load(&path)?;
            if existing.is_frozen() {
                return Err(DatasetError::Frozen(path.display().to_string()));
            }
        }
        if let Some(short_name) = &metadata.short_name {
            validate_short_name(short_name)?;
        }

        std::fs::create_dir_all(&path)?;
        let dataset = Self {
            path,
            metadata,
            formats: default_formats(),
            published_at: None,
        };
        dataset.write_index()?;
        info!("Created dataset at {}", dataset.path.display());
        Ok(dataset)
    }

    /// Open an existing dataset directory
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let path = path.as_ref().to_path_buf();
        let index_path = path.join(INDEX_FILE);
        if !index_path.exists() {
            return Err(DatasetError::NotFound(path));
        }
        let index: DatasetIndex = serde_json::from_slice(&std::fs::read(&index_path)?)?;
        Ok(Self {
            path,
            metadata: index.metadata,
            formats: index.formats,
            published_at: index.published_at,
        })
    }

    /// Formats every added table is written in; the first is preferred
    /// when reading
    pub fn with_formats(mut self, formats: &[Format]) -> Result<Self, DatasetError> {
        self.ensure_writable()?;
        if !formats.is_empty() {
            self.formats = formats.to_vec();
            self.write_index()?;
        }
        Ok(self)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn formats(&self) -> &[Format] {
        &self.formats
    }

    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.published_at
    }

    pub fn is_frozen(&self) -> bool {
        self.published_at.is_some()
    }

    /// Write `table` into the dataset, replacing a table of the same name
    ///
    /// The table's `short_name` names its files. The stored metadata embeds
    /// the dataset metadata.
    pub fn add(&mut self, table: &Table) -> Result<(), DatasetError> {
        self.ensure_writable()?;
        let short_name = table
            .metadata
            .short_name
            .clone()
            .ok_or(DatasetError::MissingShortName)?;
        validate_short_name(&short_name)?;
        self.write_table(&short_name, table.clone())?;
        info!(
            "Added table {} ({} rows) to dataset {}",
            short_name,
            table.num_rows(),
            self.display_name()
        );
        Ok(())
    }

    /// Names of the tables in the dataset, sorted
    pub fn table_names(&self) -> Result<Vec<String>, DatasetError> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.path)? {
            let file_name = entry?.file_name();
            if let Some(name) = file_name.to_str().and_then(|n| n.strip_suffix(SIDECAR_SUFFIX)) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Read a table, from the first available format in preference order
    pub fn read(&self, name: &str) -> Result<Table, DatasetError> {
        let all = Format::all();
        let candidates = self
            .formats
            .iter()
            .chain(all.iter().filter(|f| !self.formats.contains(*f)));
        for format in candidates {
            let path = self.table_path(name, *format);
            if path.exists() {
                return Ok(io::read_table(&path)?);
            }
        }
        Err(DatasetError::TableNotFound(name.to_string()))
    }

    /// Read a table to write it back, preferring a typed format so column
    /// types are not re-inferred from CSV
    fn read_for_rewrite(&self, name: &str) -> Result<Table, DatasetError> {
        let all = Format::all();
        let typed = self
            .formats
            .iter()
            .chain(all.iter().filter(|f| !self.formats.contains(*f)))
            .filter(|f| f.embeds_metadata());
        for format in typed {
            let path = self.table_path(name, *format);
            if path.exists() {
                return Ok(io::read_table(&path)?);
            }
        }
        self.read(name)
    }

    /// Rewrite the index and refresh the dataset metadata of every table
    pub fn save(&mut self) -> Result<(), DatasetError> {
        self.ensure_writable()?;
        self.write_index()?;
        for name in self.table_names()? {
            let table = self.read_for_rewrite(&name)?;
            self.write_table(&name, table)?;
        }
        info!("Saved dataset {}", self.display_name());
        Ok(())
    }

    /// Patch dataset and table metadata from a YAML metadata file
    ///
    /// Tables listed in the file but missing from the dataset are skipped
    /// with a warning.
    pub fn update_metadata_from_yaml(&mut self, path: &Path) -> Result<(), DatasetError> {
        self.ensure_writable()?;
        let file = MetadataFile::load(path)?;
        if let Some(dataset) = &file.dataset {
            self.metadata.update(dataset);
        }
        self.write_index()?;

        let names = self.table_names()?;
        for table_name in file.tables.keys() {
            if !names.contains(table_name) {
                warn!(
                    "Table '{}' is described in {} but not in the dataset, skipping",
                    table_name,
                    path.display()
                );
            }
        }
        for name in names {
            let mut table = self.read_for_rewrite(&name)?;
            if file.table(&name).is_some() {
                table.apply_metadata_file(&file, &name);
            }
            self.write_table(&name, table)?;
        }
        Ok(())
    }

    /// SHA-256 over every file of the dataset except the index, in path order
    pub fn checksum(&self) -> Result<String, DatasetError> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(&self.path)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && p.file_name().is_some_and(|n| n != INDEX_FILE))
            .collect();
        files.sort();

        let mut hasher = Sha256::new();
        let mut buffer = [0u8; BUFFER_SIZE];
        for file in files {
            if let Some(name) = file.file_name().and_then(|n| n.to_str()) {
                hasher.update(name.as_bytes());
            }
            let mut reader = BufReader::with_capacity(BUFFER_SIZE, File::open(&file)?);
            loop {
                let bytes_read = reader.read(&mut buffer)?;
                if bytes_read == 0 {
                    break;
                }
                hasher.update(&buffer[..bytes_read]);
            }
        }
        let hash = hasher.finalize();
        Ok(format!("{hash:x}"))
    }

    /// Validate every table and freeze the dataset
    pub fn publish(&mut self) -> Result<(), DatasetError> {
        self.ensure_writable()?;
        let report = validate_dataset(self)?;
        for warning in report.warnings() {
            warn!("{}", warning);
        }
        if !report.is_valid() {
            let errors: Vec<String> = report.errors().map(|e| e.to_string()).collect();
            return Err(DatasetError::ValidationFailed(errors.join("\n")));
        }

        self.published_at = Some(Utc::now());
        self.write_index()?;
        info!("Published dataset {}", self.display_name());
        Ok(())
    }

    pub fn table_path(&self, name: &str, format: Format) -> PathBuf {
        self.path.join(format!("{name}.{}", format.extension()))
    }

    fn write_table(&self, name: &str, mut table: Table) -> Result<(), DatasetError> {
        table.metadata.short_name = Some(name.to_string());
        table.metadata.dataset = Some(self.metadata.clone());
        for format in &self.formats {
            std::fs::write(self.table_path(name, *format), io::encode_table(&table, *format)?)?;
        }
        let sidecar = sidecar_path(&self.table_path(name, Format::Feather));
        TableSidecar::from_table(&table).write(&sidecar)?;
        Ok(())
    }

    fn write_index(&self) -> Result<(), DatasetError> {
        let index = DatasetIndex {
            metadata: self.metadata.clone(),
            formats: self.formats.clone(),
            published_at: self.published_at,
        };
        std::fs::write(self.path.join(INDEX_FILE), serde_json::to_string_pretty(&index)?)?;
        Ok(())
    }

    fn ensure_writable(&self) -> Result<(), DatasetError> {
        if self.is_frozen() {
            return Err(DatasetError::Frozen(self.display_name()));
        }
        Ok(())
    }

    fn display_name(&self) -> String {
        self.metadata
            .uri()
            .or_else(|| self.metadata.short_name.clone())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}
