//! Data file formats

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::FormatError;

/// Payload format of a table file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Arrow IPC file
    Feather,
    Parquet,
    /// Values only; types are re-inferred on read
    Csv,
}

impl Format {
    pub fn extension(&self) -> &'static str {
        match self {
            Format::Feather => "feather",
            Format::Parquet => "parquet",
            Format::Csv => "csv",
        }
    }

    pub fn all() -> [Format; 3] {
        [Format::Feather, Format::Parquet, Format::Csv]
    }

    /// Whether table metadata can be embedded in the file itself
    pub fn embeds_metadata(&self) -> bool {
        !matches!(self, Format::Csv)
    }

    pub fn from_extension(extension: &str) -> Result<Self, FormatError> {
        extension
            .parse()
            .map_err(|_| FormatError::UnsupportedFormat(extension.to_string()))
    }

    /// Format implied by a file's extension
    pub fn from_path(path: &Path) -> Result<Self, FormatError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| FormatError::UnsupportedFormat(path.display().to_string()))?;
        Self::from_extension(extension)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "feather" | "arrow" | "ipc" => Ok(Format::Feather),
            "parquet" => Ok(Format::Parquet),
            "csv" => Ok(Format::Csv),
            _ => Err(format!(
                "Invalid format: {}. Expected: feather, parquet, csv",
                s
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path() {
        assert_eq!(
            Format::from_path(Path::new("data/population.feather")).unwrap(),
            Format::Feather
        );
        assert_eq!(Format::from_path(Path::new("gdp.PARQUET")).unwrap(), Format::Parquet);
        assert!(matches!(
            Format::from_path(Path::new("notes.txt")),
            Err(FormatError::UnsupportedFormat(_))
        ));
        assert!(Format::from_path(Path::new("no_extension")).is_err());
    }
}
