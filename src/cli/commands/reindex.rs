//! Reindex command implementation

use std::path::Path;

use anyhow::{Context as _, Result};
use owid_catalog::catalog::{CATALOG_FILE, reindex};

/// Handle the reindex command
pub fn handle_reindex(root: &Path) -> Result<()> {
    let index = reindex(root)
        .with_context(|| format!("Failed to reindex catalog at {}", root.display()))?;
    println!(
        "Indexed {} table(s) into {}",
        index.len(),
        root.join(CATALOG_FILE).display()
    );
    Ok(())
}
