//! Error types for table operations

use arrow::error::ArrowError;
use thiserror::Error;

use crate::meta::MetaError;

/// Errors that can occur while building or transforming tables
#[derive(Error, Debug)]
pub enum TableError {
    /// Referenced column does not exist
    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    /// Two columns would share a name
    #[error("Duplicate column: {0}")]
    DuplicateColumn(String),

    /// Column or mask length does not match the table
    #[error("Length mismatch for '{column}': expected {expected} rows, found {found}")]
    LengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },

    /// Key columns do not uniquely identify rows
    #[error("Duplicate entries for key ({0})")]
    DuplicateKeys(String),

    /// Operation called with unusable arguments
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Metadata could not be combined or loaded
    #[error(transparent)]
    Meta(#[from] MetaError),

    /// Compute kernel failure
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),
}

pub type TableResult<T> = Result<T, TableError>;
