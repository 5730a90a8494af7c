//! Catalog index
//!
//! The catalog root is laid out as
//! `<channel>/<namespace>/<version>/<dataset>/<table>.<ext>`. [`reindex`]
//! walks that tree and records one [`CatalogEntry`] per table in
//! `<root>/catalog.json`.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::CatalogError;
use crate::dataset::{Dataset, INDEX_FILE};
use crate::io::{Format, TableSidecar, sidecar_path};
use crate::meta::Channel;

/// Name of the index file at the catalog root
pub const CATALOG_FILE: &str = "catalog.json";

/// One table of the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub table: String,
    pub dataset: String,
    pub version: String,
    pub namespace: String,
    pub channel: Channel,
    /// Path of the table relative to the catalog root, without extension
    pub path: String,
    pub formats: Vec<Format>,
    /// Primary key columns
    #[serde(default)]
    pub dimensions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub is_public: bool,
    /// Checksum of the dataset the table belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

fn default_true() -> bool {
    true
}

impl CatalogEntry {
    pub fn file_path(&self, format: Format) -> String {
        format!("{}.{}", self.path, format.extension())
    }

    pub fn sidecar_path(&self) -> String {
        format!("{}.meta.json", self.path)
    }

    /// `channel/namespace/version/dataset`
    pub fn dataset_uri(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.channel, self.namespace, self.version, self.dataset
        )
    }
}

/// Contents of `catalog.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogIndex {
    pub tables: Vec<CatalogEntry>,
}

impl CatalogIndex {
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Rebuild `<root>/catalog.json` from the datasets under `root`
pub fn reindex(root: &Path) -> Result<CatalogIndex, CatalogError> {
    let mut tables = Vec::new();

    for channel_dir in subdirectories(root)? {
        let Some(channel) = dir_name(&channel_dir).and_then(|n| n.parse::<Channel>().ok()) else {
            debug!("Skipping {}: not a channel", channel_dir.display());
            continue;
        };
        for namespace_dir in subdirectories(&channel_dir)? {
            for version_dir in subdirectories(&namespace_dir)? {
                for dataset_dir in subdirectories(&version_dir)? {
                    if !dataset_dir.join(INDEX_FILE).exists() {
                        warn!("Skipping {}: no {}", dataset_dir.display(), INDEX_FILE);
                        continue;
                    }
                    tables.extend(index_dataset(root, channel, &dataset_dir)?);
                }
            }
        }
    }

    tables.sort_by(|a, b| a.path.cmp(&b.path));
    let index = CatalogIndex { tables };
    std::fs::write(root.join(CATALOG_FILE), serde_json::to_string_pretty(&index)?)?;
    info!("Indexed {} tables under {}", index.len(), root.display());
    Ok(index)
}

fn index_dataset(root: &Path, channel: Channel, dir: &Path) -> Result<Vec<CatalogEntry>, CatalogError> {
    let dataset = Dataset::load(dir)?;
    let checksum = dataset.checksum()?;

    let relative = dir
        .strip_prefix(root)
        .map_err(|_| CatalogError::InvalidLayout(dir.display().to_string()))?;
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| c.as_os_str().to_str().map(str::to_string))
        .collect();
    let [_, namespace, version, dataset_name] = parts.as_slice() else {
        return Err(CatalogError::InvalidLayout(relative.display().to_string()));
    };

    let mut entries = Vec::new();
    for table in dataset.table_names()? {
        let formats: Vec<Format> = Format::all()
            .into_iter()
            .filter(|f| dataset.table_path(&table, *f).exists())
            .collect();
        if formats.is_empty() {
            warn!("Table {} in {} has no data file, skipping", table, dir.display());
            continue;
        }
        let sidecar = TableSidecar::read(&sidecar_path(&dataset.table_path(&table, formats[0])))?;

        entries.push(CatalogEntry {
            path: format!("{channel}/{namespace}/{version}/{dataset_name}/{table}"),
            table,
            dataset: dataset_name.clone(),
            version: version.clone(),
            namespace: namespace.clone(),
            channel,
            formats,
            dimensions: sidecar.table.primary_key,
            title: sidecar.table.title,
            description: sidecar.table.description,
            is_public: dataset.metadata.is_public,
            checksum: Some(checksum.clone()),
        });
    }
    Ok(entries)
}

fn subdirectories(dir: &Path) -> Result<Vec<std::path::PathBuf>, CatalogError> {
    let mut dirs: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    Ok(dirs)
}

fn dir_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}
