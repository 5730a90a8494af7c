//! Find command implementation

use anyhow::{Context as _, Result};
use owid_catalog::catalog::{Catalog, CatalogQuery};
use owid_catalog::config::CatalogConfig;
use owid_catalog::storage::StorageBackend;
use owid_catalog::storage::filesystem::FileSystemStorageBackend;
use owid_catalog::storage::http::HttpStorageBackend;

use crate::output::format_entries;

/// Handle the find command
///
/// Channels from the configuration apply when the query names none.
pub async fn handle_find(config: &CatalogConfig, query: CatalogQuery, latest: bool, json: bool) -> Result<()> {
    let query = if query.channels.is_empty() {
        query.with_channels(&config.channels)
    } else {
        query
    };

    if config.is_remote() {
        let backend = HttpStorageBackend::new(&config.catalog_url, None);
        run(open(backend, config).await?, &query, latest, json)
    } else {
        let backend = FileSystemStorageBackend::new(&config.catalog_url);
        run(open(backend, config).await?, &query, latest, json)
    }
}

async fn open<B: StorageBackend>(backend: B, config: &CatalogConfig) -> Result<Catalog<B>> {
    let catalog = Catalog::open(backend)
        .await
        .with_context(|| format!("Failed to open catalog at {}", config.catalog_url))?;
    Ok(catalog.with_config(config))
}

fn run<B: StorageBackend>(catalog: Catalog<B>, query: &CatalogQuery, latest: bool, json: bool) -> Result<()> {
    let entries = if latest {
        vec![catalog.find_latest(query)?]
    } else {
        catalog.find(query)
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        print!("{}", format_entries(&entries));
    }
    Ok(())
}
