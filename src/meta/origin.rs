//! Origin: the provenance record attached to every published variable

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::license::License;

static DATE_PUBLISHED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4}|\d{4}-\d{2}-\d{2}|latest)$").expect("valid regex"));

/// Where a variable's values ultimately come from
///
/// # Example
///
/// ```rust
/// use owid_catalog::meta::{License, Origin};
///
/// let origin = Origin::new("UN WPP")
///     .with_title("World Population Prospects")
///     .with_date_published("2024-07-11")
///     .with_license(License::new("CC BY 3.0 IGO"));
/// assert!(origin.date_published_is_valid());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Origin {
    /// Institution or author(s) that produced the data
    pub producer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Title of the snapshot, when it differs from the data product title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_snapshot: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_snapshot: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation_full: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribution_short: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_producer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_main: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_download: Option<String>,
    /// Day the snapshot was taken
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_accessed: Option<NaiveDate>,
    /// Publication date as given by the producer: `YYYY`, `YYYY-MM-DD` or `latest`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_published: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<License>,
}

impl Origin {
    pub fn new(producer: impl Into<String>) -> Self {
        Self {
            producer: producer.into(),
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_url_main(mut self, url: impl Into<String>) -> Self {
        self.url_main = Some(url.into());
        self
    }

    pub fn with_date_accessed(mut self, date: NaiveDate) -> Self {
        self.date_accessed = Some(date);
        self
    }

    pub fn with_date_published(mut self, date: impl Into<String>) -> Self {
        self.date_published = Some(date.into());
        self
    }

    pub fn with_license(mut self, license: License) -> Self {
        self.license = Some(license);
        self
    }

    /// Whether `date_published` is absent or uses one of the accepted forms
    pub fn date_published_is_valid(&self) -> bool {
        self.date_published
            .as_deref()
            .is_none_or(|d| DATE_PUBLISHED_RE.is_match(d))
    }
}
