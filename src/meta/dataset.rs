//! Dataset and table level metadata

use serde::{Deserialize, Serialize};

use super::license::{License, Source};

/// Pipeline stage a dataset was produced by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Snapshot,
    Meadow,
    Garden,
    Grapher,
    Explorers,
    Examples,
    OpenNumbers,
}

impl Channel {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Snapshot => "snapshot",
            Self::Meadow => "meadow",
            Self::Garden => "garden",
            Self::Grapher => "grapher",
            Self::Explorers => "explorers",
            Self::Examples => "examples",
            Self::OpenNumbers => "open_numbers",
        }
    }

    pub fn all() -> Vec<Channel> {
        vec![
            Self::Snapshot,
            Self::Meadow,
            Self::Garden,
            Self::Grapher,
            Self::Explorers,
            Self::Examples,
            Self::OpenNumbers,
        ]
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Channel::all()
            .into_iter()
            .find(|c| c.name() == s.to_lowercase())
            .ok_or_else(|| {
                format!(
                    "Invalid channel: {}. Expected one of: {}",
                    s,
                    Channel::all()
                        .iter()
                        .map(Channel::name)
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            })
    }
}

fn default_true() -> bool {
    true
}

/// Publication metadata shared by every table of a dataset
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatasetMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<Channel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Source>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub licenses: Vec<License>,
    #[serde(default = "default_true")]
    pub is_public: bool,
    #[serde(default)]
    pub non_redistributable: bool,
    /// Version string, usually `YYYY-MM-DD` or `latest`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_period_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_checksum: Option<String>,
}

impl Default for DatasetMeta {
    fn default() -> Self {
        Self {
            channel: None,
            namespace: None,
            short_name: None,
            title: None,
            description: None,
            sources: Vec::new(),
            licenses: Vec::new(),
            is_public: true,
            non_redistributable: false,
            version: None,
            update_period_days: None,
            source_checksum: None,
        }
    }
}

impl DatasetMeta {
    pub fn new(
        channel: Channel,
        namespace: impl Into<String>,
        version: impl Into<String>,
        short_name: impl Into<String>,
    ) -> Self {
        Self {
            channel: Some(channel),
            namespace: Some(namespace.into()),
            version: Some(version.into()),
            short_name: Some(short_name.into()),
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Catalog path `channel/namespace/version/short_name`
    ///
    /// Returns `None` until all four parts are known.
    pub fn uri(&self) -> Option<String> {
        Some(format!(
            "{}/{}/{}/{}",
            self.channel?,
            self.namespace.as_ref()?,
            self.version.as_ref()?,
            self.short_name.as_ref()?
        ))
    }

    /// Override fields with every field `other` sets
    ///
    /// `is_public` and `non_redistributable` are plain booleans, so they are
    /// only taken when they differ from their defaults.
    pub fn update(&mut self, other: &DatasetMeta) {
        macro_rules! take_some {
            ($($field:ident),* $(,)?) => {
                $(
                    if other.$field.is_some() {
                        self.$field = other.$field.clone();
                    }
                )*
            };
        }
        take_some!(
            channel,
            namespace,
            short_name,
            title,
            description,
            version,
            update_period_days,
            source_checksum,
        );
        if !other.sources.is_empty() {
            self.sources = other.sources.clone();
        }
        if !other.licenses.is_empty() {
            self.licenses = other.licenses.clone();
        }
        if !other.is_public {
            self.is_public = false;
        }
        if other.non_redistributable {
            self.non_redistributable = true;
        }
    }
}

/// Table level metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TableMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Columns that uniquely identify a row (e.g., `country`, `year`)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub primary_key: Vec<String>,
    /// Metadata of the dataset the table was saved in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset: Option<DatasetMeta>,
}

impl TableMeta {
    pub fn new(short_name: impl Into<String>) -> Self {
        Self {
            short_name: Some(short_name.into()),
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uri_requires_all_parts() {
        let meta = DatasetMeta::new(Channel::Garden, "un", "2024-07-12", "un_wpp");
        assert_eq!(meta.uri().as_deref(), Some("garden/un/2024-07-12/un_wpp"));

        let partial = DatasetMeta {
            short_name: Some("un_wpp".into()),
            ..Default::default()
        };
        assert_eq!(partial.uri(), None);
    }

    #[test]
    fn test_channel_from_str() {
        assert_eq!("garden".parse::<Channel>().unwrap(), Channel::Garden);
        assert_eq!("Open_Numbers".parse::<Channel>().unwrap(), Channel::OpenNumbers);
        assert!("backport".parse::<Channel>().is_err());
    }

    #[test]
    fn test_is_public_defaults_to_true() {
        let meta: DatasetMeta = serde_json::from_str(r#"{"short_name": "x"}"#).unwrap();
        assert!(meta.is_public);
        assert!(!meta.non_redistributable);
    }
}
