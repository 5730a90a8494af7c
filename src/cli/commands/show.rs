//! Show command implementation

use std::path::Path;

use anyhow::{Context as _, Result};
use owid_catalog::io::{TableSidecar, read_table};

use crate::output::format_table;

/// Handle the show command
pub fn handle_show(path: &Path, rows: usize, json: bool) -> Result<()> {
    let table = read_table(path).with_context(|| format!("Failed to read {}", path.display()))?;

    if json {
        println!("{}", TableSidecar::from_table(&table).to_json()?);
    } else {
        print!("{}", format_table(&table, rows));
    }
    Ok(())
}
