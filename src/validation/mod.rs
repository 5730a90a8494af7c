//! Validation functionality
//!
//! Provides validation logic for:
//! - Naming (snake_case column names, dataset and table short names)
//! - Metadata completeness of tables and datasets before publishing

pub mod metadata;
pub mod naming;

pub use metadata::{Issue, IssueKind, Severity, ValidationReport, validate_dataset, validate_table};
pub use naming::{NameError, is_underscored, underscore, validate_short_name};
