//! Catalog search and fetch
//!
//! A catalog is a tree of published datasets with a `catalog.json` index at
//! its root. [`reindex`] builds the index from a local tree; [`Catalog`]
//! searches it and loads tables through any [`StorageBackend`], so the same
//! API serves a local directory and a catalog published over HTTP.
//!
//! ```rust,no_run
//! # async fn run() -> Result<(), owid_catalog::catalog::CatalogError> {
//! use owid_catalog::catalog::{Catalog, CatalogQuery};
//! use owid_catalog::storage::filesystem::FileSystemStorageBackend;
//!
//! let catalog = Catalog::open(FileSystemStorageBackend::new("/data/catalog")).await?;
//! let entry = catalog.find_latest(&CatalogQuery::new().with_table("population"))?;
//! let table = catalog.load(entry).await?;
//! # Ok(())
//! # }
//! ```

pub mod index;

pub use index::{CATALOG_FILE, CatalogEntry, CatalogIndex, reindex};

use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::CatalogConfig;
use crate::dataset::DatasetError;
use crate::io::{self, Format, FormatError};
use crate::meta::Channel;
use crate::storage::{StorageBackend, StorageError};
use crate::table::Table;

/// Version label that always sorts after dated versions
pub const LATEST_VERSION: &str = "latest";

/// Errors raised by catalog operations
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("No table matches {0}")]
    NotFound(String),
    #[error("{count} tables match {query}, refine the query")]
    Ambiguous { query: String, count: usize },
    #[error("Table {0} has no data file in a supported format")]
    NoDataFile(String),
    #[error("Unexpected catalog layout at {0}")]
    InvalidLayout(String),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Format error: {0}")]
    Format(#[from] FormatError),
    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Search criteria; unset fields match everything
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogQuery {
    /// Case-insensitive substring of the table name
    pub table: Option<String>,
    pub namespace: Option<String>,
    pub dataset: Option<String>,
    pub version: Option<String>,
    /// Accepted channels; empty accepts all
    pub channels: Vec<Channel>,
}

impl CatalogQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_dataset(mut self, dataset: impl Into<String>) -> Self {
        self.dataset = Some(dataset.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_channels(mut self, channels: &[Channel]) -> Self {
        self.channels = channels.to_vec();
        self
    }

    pub fn matches(&self, entry: &CatalogEntry) -> bool {
        if let Some(table) = &self.table
            && !entry.table.to_lowercase().contains(&table.to_lowercase())
        {
            return false;
        }
        let exact = |wanted: &Option<String>, actual: &str| wanted.as_deref().is_none_or(|w| w == actual);
        exact(&self.namespace, &entry.namespace)
            && exact(&self.dataset, &entry.dataset)
            && exact(&self.version, &entry.version)
            && (self.channels.is_empty() || self.channels.contains(&entry.channel))
    }
}

impl fmt::Display for CatalogQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        for (key, value) in [
            ("table", &self.table),
            ("namespace", &self.namespace),
            ("dataset", &self.dataset),
            ("version", &self.version),
        ] {
            if let Some(value) = value {
                parts.push(format!("{key}={value}"));
            }
        }
        if !self.channels.is_empty() {
            let channels: Vec<&str> = self.channels.iter().map(Channel::name).collect();
            parts.push(format!("channel={}", channels.join(",")));
        }
        if parts.is_empty() {
            write!(f, "<any>")
        } else {
            write!(f, "{}", parts.join(" "))
        }
    }
}

/// Order versions so that `latest` comes after every dated version
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (a == LATEST_VERSION, b == LATEST_VERSION) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.cmp(b),
    }
}

/// Catalog read through a storage backend
pub struct Catalog<B: StorageBackend> {
    backend: B,
    index: CatalogIndex,
    formats: Vec<Format>,
    cache_dir: Option<PathBuf>,
}

impl<B: StorageBackend> Catalog<B> {
    /// Read `catalog.json` through `backend`
    pub async fn open(backend: B) -> Result<Self, CatalogError> {
        let bytes = backend.read_file(CATALOG_FILE).await?;
        let index: CatalogIndex = serde_json::from_slice(&bytes)?;
        info!("Opened catalog with {} tables", index.len());
        Ok(Self::from_index(backend, index))
    }

    pub fn from_index(backend: B, index: CatalogIndex) -> Self {
        Self {
            backend,
            index,
            formats: Format::all().to_vec(),
            cache_dir: None,
        }
    }

    /// Keep fetched files under `dir`, keyed by dataset checksum
    ///
    /// Entries without a checksum are never cached, since their content
    /// may change under the same path.
    pub fn with_cache_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cache_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Apply the formats and cache directory of `config`
    pub fn with_config(self, config: &CatalogConfig) -> Self {
        let catalog = self.with_formats(&config.formats);
        match &config.cache_dir {
            Some(dir) => catalog.with_cache_dir(dir),
            None => catalog,
        }
    }

    /// Preferred data formats when loading, most preferred first
    pub fn with_formats(mut self, formats: &[Format]) -> Self {
        if !formats.is_empty() {
            self.formats = formats.to_vec();
        }
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn index(&self) -> &CatalogIndex {
        &self.index
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.index.tables
    }

    /// All entries matching `query`, in index order
    pub fn find(&self, query: &CatalogQuery) -> Vec<&CatalogEntry> {
        let found: Vec<&CatalogEntry> = self.index.tables.iter().filter(|e| query.matches(e)).collect();
        debug!("{} tables match {}", found.len(), query);
        found
    }

    /// The single entry matching `query`
    pub fn find_one(&self, query: &CatalogQuery) -> Result<&CatalogEntry, CatalogError> {
        single(self.find(query), query)
    }

    /// The entry matching `query` with the highest version
    ///
    /// Fails when several tables share that version.
    pub fn find_latest(&self, query: &CatalogQuery) -> Result<&CatalogEntry, CatalogError> {
        let found = self.find(query);
        let Some(max) = found
            .iter()
            .map(|e| e.version.as_str())
            .max_by(|a, b| compare_versions(a, b))
        else {
            return Err(CatalogError::NotFound(query.to_string()));
        };
        let max = max.to_string();
        single(found.into_iter().filter(|e| e.version == max).collect(), query)
    }

    /// Fetch a table with its metadata
    ///
    /// Uses the first preferred format the entry is available in. The
    /// sidecar is authoritative for metadata when present.
    pub async fn load(&self, entry: &CatalogEntry) -> Result<Table, CatalogError> {
        let format = self
            .formats
            .iter()
            .find(|f| entry.formats.contains(f))
            .or_else(|| entry.formats.first())
            .copied()
            .ok_or_else(|| CatalogError::NoDataFile(entry.path.clone()))?;

        let data = self.fetch(entry, &entry.file_path(format)).await?;
        let sidecar = match self.fetch(entry, &entry.sidecar_path()).await {
            Ok(bytes) => Some(bytes),
            Err(CatalogError::Storage(StorageError::FileNotFound(_))) => {
                debug!("No sidecar for {}, using embedded metadata", entry.path);
                None
            }
            Err(e) => return Err(e),
        };

        let table = io::decode_table(&data, format, sidecar.as_deref())?;
        info!("Loaded {} ({} rows, {})", entry.path, table.num_rows(), format);
        Ok(table)
    }

    async fn fetch(&self, entry: &CatalogEntry, path: &str) -> Result<Vec<u8>, CatalogError> {
        let cached = match (&self.cache_dir, &entry.checksum) {
            (Some(dir), Some(checksum)) => Some(dir.join(checksum).join(path)),
            _ => None,
        };
        if let Some(cached) = &cached
            && cached.exists()
        {
            debug!("Reading {} from cache {}", path, cached.display());
            return Ok(std::fs::read(cached)?);
        }

        let bytes = self.backend.read_file(path).await?;
        if let Some(cached) = cached {
            if let Some(parent) = cached.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&cached, &bytes)?;
        }
        Ok(bytes)
    }
}

fn single<'a>(found: Vec<&'a CatalogEntry>, query: &CatalogQuery) -> Result<&'a CatalogEntry, CatalogError> {
    match found.as_slice() {
        [] => Err(CatalogError::NotFound(query.to_string())),
        [entry] => Ok(entry),
        _ => Err(CatalogError::Ambiguous {
            query: query.to_string(),
            count: found.len(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(table: &str, dataset: &str, version: &str, channel: Channel) -> CatalogEntry {
        CatalogEntry {
            table: table.to_string(),
            dataset: dataset.to_string(),
            version: version.to_string(),
            namespace: "un".to_string(),
            channel,
            path: format!("{channel}/un/{version}/{dataset}/{table}"),
            formats: vec![Format::Feather],
            dimensions: vec!["country".to_string(), "year".to_string()],
            title: None,
            description: None,
            is_public: true,
            checksum: None,
        }
    }

    fn index() -> CatalogIndex {
        CatalogIndex {
            tables: vec![
                entry("population", "un_wpp", "2022-07-11", Channel::Garden),
                entry("population", "un_wpp", "2024-07-12", Channel::Garden),
                entry("population_density", "un_wpp", "2024-07-12", Channel::Garden),
                entry("population", "un_wpp", "latest", Channel::Meadow),
                entry("fertility", "un_wpp", "2024-07-12", Channel::Garden),
            ],
        }
    }

    #[test]
    fn test_query_matching() {
        let e = entry("Population_Density", "un_wpp", "2024-07-12", Channel::Garden);
        assert!(CatalogQuery::new().matches(&e));
        assert!(CatalogQuery::new().with_table("density").matches(&e));
        assert!(CatalogQuery::new().with_table("DENSITY").matches(&e));
        assert!(!CatalogQuery::new().with_dataset("un").matches(&e));
        assert!(CatalogQuery::new().with_version("2024-07-12").matches(&e));
        assert!(!CatalogQuery::new().with_channels(&[Channel::Meadow]).matches(&e));
        assert!(CatalogQuery::new()
            .with_channels(&[Channel::Meadow, Channel::Garden])
            .matches(&e));
    }

    #[test]
    fn test_version_ordering() {
        assert_eq!(compare_versions("2024-07-12", "2022-07-11"), Ordering::Greater);
        assert_eq!(compare_versions("latest", "2024-07-12"), Ordering::Greater);
        assert_eq!(compare_versions("2024-07-12", "latest"), Ordering::Less);
        assert_eq!(compare_versions("latest", "latest"), Ordering::Equal);
    }

    #[test]
    fn test_query_display() {
        assert_eq!(CatalogQuery::new().to_string(), "<any>");
        assert_eq!(
            CatalogQuery::new()
                .with_table("population")
                .with_channels(&[Channel::Garden])
                .to_string(),
            "table=population channel=garden"
        );
    }

    #[cfg(feature = "native-fs")]
    #[test]
    fn test_find_one_and_latest() {
        use crate::storage::filesystem::FileSystemStorageBackend;

        let catalog = Catalog::from_index(FileSystemStorageBackend::new("/nonexistent"), index());

        assert_eq!(catalog.find(&CatalogQuery::new().with_table("population")).len(), 4);

        let garden = CatalogQuery::new()
            .with_table("population")
            .with_channels(&[Channel::Garden]);
        assert!(matches!(
            catalog.find_one(&garden),
            Err(CatalogError::Ambiguous { count: 3, .. })
        ));
        assert!(matches!(
            catalog.find_one(&CatalogQuery::new().with_table("gdp")),
            Err(CatalogError::NotFound(_))
        ));
        let fertility = catalog
            .find_one(&CatalogQuery::new().with_table("fertility"))
            .unwrap();
        assert_eq!(fertility.version, "2024-07-12");

        // two garden tables share the newest version
        assert!(matches!(
            catalog.find_latest(&garden),
            Err(CatalogError::Ambiguous { count: 2, .. })
        ));
        let latest = catalog
            .find_latest(&CatalogQuery::new().with_table("population_density"))
            .unwrap();
        assert_eq!(latest.version, "2024-07-12");

        let latest = catalog
            .find_latest(&CatalogQuery::new().with_dataset("un_wpp").with_table("population"))
            .unwrap();
        assert_eq!(latest.channel, Channel::Meadow);

        let exact = CatalogQuery::new()
            .with_table("population")
            .with_channels(&[Channel::Meadow]);
        assert_eq!(catalog.find_latest(&exact).unwrap().version, "latest");
    }
}
