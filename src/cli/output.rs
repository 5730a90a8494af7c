//! Output formatting for CLI

use owid_catalog::catalog::CatalogEntry;
use owid_catalog::table::Table;
use owid_catalog::validation::{Severity, ValidationReport};

/// One line per catalog entry
pub fn format_entries(entries: &[&CatalogEntry]) -> String {
    let mut output = String::new();
    for entry in entries {
        output.push_str(&format!("{}  [{}]", entry.path, format_list(&entry.formats)));
        if let Some(title) = &entry.title {
            output.push_str(&format!("  {}", title));
        }
        if !entry.is_public {
            output.push_str("  (private)");
        }
        output.push('\n');
    }
    output.push_str(&format!("\n{} table(s) found\n", entries.len()));
    output
}

/// Table metadata, column metadata and the first `rows` rows
pub fn format_table(table: &Table, rows: usize) -> String {
    let meta = &table.metadata;
    let mut output = String::new();

    output.push_str(&format!(
        "Table: {}\n",
        meta.short_name.as_deref().unwrap_or("<unnamed>")
    ));
    if let Some(title) = &meta.title {
        output.push_str(&format!("  Title: {}\n", title));
    }
    if let Some(uri) = meta.dataset.as_ref().and_then(|d| d.uri()) {
        output.push_str(&format!("  Dataset: {}\n", uri));
    }
    if !meta.primary_key.is_empty() {
        output.push_str(&format!("  Primary key: {}\n", meta.primary_key.join(", ")));
    }
    output.push_str(&format!(
        "  Rows: {}  Columns: {}\n",
        table.num_rows(),
        table.num_columns()
    ));

    output.push_str("\nColumns:\n");
    for variable in table.variables() {
        let field = &variable.metadata;
        output.push_str(&format!("  - {} ({})\n", variable.name(), variable.data_type()));
        if let Some(title) = &field.title {
            output.push_str(&format!("      Title: {}\n", title));
        }
        if let Some(unit) = &field.unit {
            output.push_str(&format!("      Unit: {}\n", unit));
        }
        if let Some(level) = field.processing_level {
            output.push_str(&format!("      Processing: {}\n", level));
        }
        let producers: Vec<&str> = field.origins.iter().map(|o| o.producer.as_str()).collect();
        if !producers.is_empty() {
            output.push_str(&format!("      Origins: {}\n", producers.join("; ")));
        }
        if !field.processing_log.is_empty() {
            output.push_str(&format!(
                "      Derived from: {}\n",
                field.processing_log.roots(variable.name()).join(", ")
            ));
        }
    }

    if rows > 0 {
        output.push_str(&format!("\n{}\n", table.head(rows)));
    }
    output
}

/// Validation findings grouped by severity
pub fn format_report(report: &ValidationReport) -> String {
    let mut output = String::new();
    for (severity, heading) in [(Severity::Error, "Errors"), (Severity::Warning, "Warnings")] {
        let issues: Vec<_> = report.issues.iter().filter(|i| i.severity == severity).collect();
        if issues.is_empty() {
            continue;
        }
        output.push_str(&format!("\n{} ({}):\n", heading, issues.len()));
        for issue in issues {
            output.push_str(&format!("  - {}\n", issue));
        }
    }

    if report.is_valid() {
        output.push_str("\nValidation successful\n");
    }
    output
}

fn format_list<T: ToString>(items: &[T]) -> String {
    items.iter().map(|i| i.to_string()).collect::<Vec<_>>().join(",")
}
