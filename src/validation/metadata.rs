//! Metadata completeness checks
//!
//! Checks that a table is ready to be published: every non-key column
//! traces to an origin, derived columns declare a processing level, names
//! are normalized and the primary key identifies rows.

use std::fmt;

use serde::Serialize;

use super::naming::{is_underscored, validate_short_name};
use crate::dataset::{Dataset, DatasetError};
use crate::meta::VariableMeta;
use crate::table::{Table, TableError};

/// How serious an issue is; errors block publishing
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    InvalidTableName,
    InvalidColumnName,
    MissingPrimaryKey,
    DuplicatePrimaryKey,
    MissingOrigin,
    MissingProcessingLevel,
    MissingUnit,
    MissingTitle,
    InvalidOriginDate,
}

/// A single finding
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    pub severity: Severity,
    pub kind: IssueKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    pub message: String,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "[{level}]")?;
        match (&self.table, &self.column) {
            (Some(table), Some(column)) => write!(f, " {table}.{column}:")?,
            (Some(table), None) => write!(f, " {table}:")?,
            (None, Some(column)) => write!(f, " {column}:")?,
            (None, None) => {}
        }
        write!(f, " {}", self.message)
    }
}

/// All issues found in a table or dataset
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub issues: Vec<Issue>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// No error-level issues
    pub fn is_valid(&self) -> bool {
        self.errors().next().is_none()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warning)
    }

    pub fn extend(&mut self, other: ValidationReport) {
        self.issues.extend(other.issues);
    }

    fn push(
        &mut self,
        severity: Severity,
        kind: IssueKind,
        table: Option<&str>,
        column: Option<&str>,
        message: impl Into<String>,
    ) {
        self.issues.push(Issue {
            severity,
            kind,
            table: table.map(str::to_string),
            column: column.map(str::to_string),
            message: message.into(),
        });
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for issue in &self.issues {
            writeln!(f, "{issue}")?;
        }
        Ok(())
    }
}

/// Check a table's metadata
pub fn validate_table(table: &Table) -> ValidationReport {
    let mut report = ValidationReport::new();
    let name = table.metadata.short_name.as_deref();

    if let Some(short_name) = name
        && let Err(e) = validate_short_name(short_name)
    {
        report.push(Severity::Error, IssueKind::InvalidTableName, name, None, e.to_string());
    }

    if table.primary_key().is_empty() {
        report.push(
            Severity::Warning,
            IssueKind::MissingPrimaryKey,
            name,
            None,
            "no primary key set",
        );
    } else {
        match table.check_primary_key_unique() {
            Ok(()) => {}
            Err(TableError::DuplicateKeys(keys)) => report.push(
                Severity::Error,
                IssueKind::DuplicatePrimaryKey,
                name,
                None,
                format!("duplicate primary key ({keys})"),
            ),
            Err(e) => report.push(
                Severity::Error,
                IssueKind::DuplicatePrimaryKey,
                name,
                None,
                format!("primary key could not be checked: {e}"),
            ),
        }
    }

    for column in table.column_names() {
        if !is_underscored(&column) {
            report.push(
                Severity::Error,
                IssueKind::InvalidColumnName,
                name,
                Some(&column),
                "column name is not snake_case",
            );
        }
        if table.primary_key().contains(&column) {
            continue;
        }
        if let Some(meta) = table.field(&column) {
            validate_variable(&mut report, name, &column, meta);
        }
    }

    report
}

fn validate_variable(report: &mut ValidationReport, table: Option<&str>, column: &str, meta: &VariableMeta) {
    if !meta.has_provenance() {
        report.push(
            Severity::Error,
            IssueKind::MissingOrigin,
            table,
            Some(column),
            "no origin attached",
        );
    }
    if meta.processing_level.is_none() && meta.processing_log.has_derivations() {
        report.push(
            Severity::Error,
            IssueKind::MissingProcessingLevel,
            table,
            Some(column),
            "values were derived but processing_level is not set",
        );
    }
    if meta.unit.is_none() {
        report.push(Severity::Warning, IssueKind::MissingUnit, table, Some(column), "no unit");
    }
    if meta.title.is_none() {
        report.push(Severity::Warning, IssueKind::MissingTitle, table, Some(column), "no title");
    }
    for origin in &meta.origins {
        if !origin.date_published_is_valid() {
            report.push(
                Severity::Warning,
                IssueKind::InvalidOriginDate,
                table,
                Some(column),
                format!(
                    "origin '{}' has date_published '{}', expected YYYY, YYYY-MM-DD or latest",
                    origin.producer,
                    origin.date_published.as_deref().unwrap_or_default()
                ),
            );
        }
    }
}

/// Check every table of a dataset
pub fn validate_dataset(dataset: &Dataset) -> Result<ValidationReport, DatasetError> {
    let mut report = ValidationReport::new();
    for name in dataset.table_names()? {
        let table = dataset.read(&name)?;
        report.extend(validate_table(&table));
    }
    Ok(report)
}
