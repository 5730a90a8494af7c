//! Validate command implementation

use std::path::Path;

use anyhow::{Context as _, Result, bail};
use owid_catalog::dataset::{Dataset, INDEX_FILE};
use owid_catalog::io::read_table;
use owid_catalog::validation::{validate_dataset, validate_table};

use crate::output::format_report;

/// Handle the validate command
///
/// `path` is either a dataset directory or a single table file.
pub fn handle_validate(path: &Path, json: bool) -> Result<()> {
    let report = if path.is_dir() {
        if !path.join(INDEX_FILE).exists() {
            bail!("{} is not a dataset directory (no {})", path.display(), INDEX_FILE);
        }
        let dataset = Dataset::load(path)?;
        validate_dataset(&dataset)?
    } else {
        let table = read_table(path).with_context(|| format!("Failed to read {}", path.display()))?;
        validate_table(&table)
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", format_report(&report));
    }

    if !report.is_valid() {
        bail!("{} error(s) found", report.errors().count());
    }
    Ok(())
}
