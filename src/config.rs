//! Catalog configuration
//!
//! Settings come from defaults, an optional TOML file and `OWID_*`
//! environment variables, in that order of increasing precedence:
//!
//! ```toml
//! catalog_url = "https://catalog.ourworldindata.org"
//! cache_dir = "/tmp/owid-catalog"
//! formats = ["parquet", "feather"]
//! channels = ["garden"]
//! conflict_policy = "keep_first"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::io::Format;
use crate::meta::{Channel, ConflictPolicy};
use crate::table::{ConcatOptions, MergeOptions};

pub const ENV_CATALOG_URL: &str = "OWID_CATALOG_URL";
pub const ENV_CACHE_DIR: &str = "OWID_CATALOG_CACHE_DIR";
pub const ENV_FORMATS: &str = "OWID_CATALOG_FORMATS";
pub const ENV_CONFLICT_POLICY: &str = "OWID_CONFLICT_POLICY";

pub const DEFAULT_CATALOG_URL: &str = "https://catalog.ourworldindata.org";

/// Errors raised while loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Where the catalog lives and how tables are read from it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Base URL of a remote catalog, or a local directory
    pub catalog_url: String,
    pub cache_dir: Option<PathBuf>,
    /// Preferred data formats, most preferred first
    pub formats: Vec<Format>,
    /// Channels searched by default; empty searches all
    pub channels: Vec<Channel>,
    pub conflict_policy: ConflictPolicy,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            cache_dir: None,
            formats: vec![Format::Feather, Format::Parquet, Format::Csv],
            channels: Vec::new(),
            conflict_policy: ConflictPolicy::default(),
        }
    }
}

impl CatalogConfig {
    pub fn with_catalog_url(mut self, url: impl Into<String>) -> Self {
        self.catalog_url = url.into();
        self
    }

    pub fn with_cache_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cache_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn with_formats(mut self, formats: &[Format]) -> Self {
        self.formats = formats.to_vec();
        self
    }

    pub fn with_channels(mut self, channels: &[Channel]) -> Self {
        self.channels = channels.to_vec();
        self
    }

    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }

    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Loaded catalog config from {}", path.display());
        Self::from_toml(&content)
    }

    /// Defaults, overlaid with `path` if given, overlaid with the environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides looked up by environment variable name
    pub fn apply_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(url) = lookup(ENV_CATALOG_URL) {
            self.catalog_url = url;
        }
        if let Some(dir) = lookup(ENV_CACHE_DIR) {
            self.cache_dir = Some(PathBuf::from(dir));
        }
        if let Some(formats) = lookup(ENV_FORMATS) {
            self.formats = formats
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| s.parse::<Format>().map_err(|e| invalid(ENV_FORMATS, e)))
                .collect::<Result<_, _>>()?;
        }
        if let Some(policy) = lookup(ENV_CONFLICT_POLICY) {
            self.conflict_policy = policy.parse().map_err(|e| invalid(ENV_CONFLICT_POLICY, e))?;
        }
        Ok(self)
    }

    /// Concat options using the configured conflict policy
    pub fn concat_options(&self) -> ConcatOptions {
        ConcatOptions::default().with_conflict_policy(self.conflict_policy)
    }

    /// Merge options on `keys` using the configured conflict policy
    pub fn merge_options(&self, keys: &[&str]) -> MergeOptions {
        MergeOptions::on(keys).with_conflict_policy(self.conflict_policy)
    }

    /// Whether `catalog_url` points at a remote catalog
    pub fn is_remote(&self) -> bool {
        self.catalog_url.starts_with("http://") || self.catalog_url.starts_with("https://")
    }
}

fn invalid(key: &str, message: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}
