//! Variable (column) metadata

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::license::{License, Source};
use super::origin::Origin;
use super::processing_log::{LogEntry, ProcessingLog};

/// How much a value has been transformed from its source
///
/// Ordered: `Minor < Major`. A variable's level only ever escalates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingLevel {
    /// Reformatting, renaming, unit conversion of a verbatim value
    Minor,
    /// Values derived by combining or aggregating source values
    Major,
}

impl std::fmt::Display for ProcessingLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Minor => write!(f, "minor"),
            Self::Major => write!(f, "major"),
        }
    }
}

/// Link to an FAQ fragment in a Google doc
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FaqLink {
    pub gdoc_id: String,
    pub fragment_id: String,
}

/// Presentation hints used by the charting backend
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VariablePresentationMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_public: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_variant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribution_short: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribution: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topic_tag_links: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub faqs: Vec<FaqLink>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grapher_config: Option<serde_json::Value>,
}

/// Metadata of a single variable (table column)
///
/// Every field is optional so that partial definitions from YAML files can be
/// deserialized and applied with [`VariableMeta::update`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VariableMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Legacy long description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_short: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub description_key: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_from_producer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_processing: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub origins: Vec<Origin>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub licenses: Vec<License>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<License>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Source>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_unit: Option<String>,
    /// Free-form display settings (e.g., `numDecimalPlaces`)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub display: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_info: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_level: Option<ProcessingLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presentation: Option<VariablePresentationMeta>,
    #[serde(default, skip_serializing_if = "ProcessingLog::is_empty")]
    pub processing_log: ProcessingLog,
}

impl VariableMeta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>, short_unit: Option<&str>) -> Self {
        self.unit = Some(unit.into());
        self.short_unit = short_unit.map(str::to_string);
        self
    }

    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.add_origin(origin);
        self
    }

    pub fn with_processing_level(mut self, level: ProcessingLevel) -> Self {
        self.escalate(level);
        self
    }

    /// Add an origin unless an identical one is already attached
    pub fn add_origin(&mut self, origin: Origin) {
        if !self.origins.contains(&origin) {
            self.origins.push(origin);
        }
    }

    /// Raise the processing level to at least `level`; never lowers it
    pub fn escalate(&mut self, level: ProcessingLevel) {
        self.processing_level = Some(match self.processing_level {
            Some(current) => current.max(level),
            None => level,
        });
    }

    pub fn log(&mut self, entry: LogEntry) {
        self.processing_log.push(entry);
    }

    /// First attached origin, if any
    pub fn primary_origin(&self) -> Option<&Origin> {
        self.origins.first()
    }

    /// Whether the variable traces to at least one origin
    pub fn has_provenance(&self) -> bool {
        !self.origins.is_empty()
    }

    /// Override fields with every field `other` sets
    ///
    /// Lists replace the current value when non-empty. `processing_level`
    /// still only escalates and the processing log is extended, never
    /// replaced.
    pub fn update(&mut self, other: &VariableMeta) {
        macro_rules! take_some {
            ($($field:ident),* $(,)?) => {
                $(
                    if other.$field.is_some() {
                        self.$field = other.$field.clone();
                    }
                )*
            };
        }
        macro_rules! take_non_empty {
            ($($field:ident),* $(,)?) => {
                $(
                    if !other.$field.is_empty() {
                        self.$field = other.$field.clone();
                    }
                )*
            };
        }

        take_some!(
            title,
            description,
            description_short,
            description_from_producer,
            description_processing,
            license,
            unit,
            short_unit,
            additional_info,
            presentation,
        );
        take_non_empty!(description_key, origins, licenses, sources);

        for (key, value) in &other.display {
            self.display.insert(key.clone(), value.clone());
        }
        if let Some(level) = other.processing_level {
            self.escalate(level);
        }
        self.processing_log.extend_from(&other.processing_log);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processing_level_never_decreases() {
        let mut meta = VariableMeta::new();
        meta.escalate(ProcessingLevel::Major);
        meta.escalate(ProcessingLevel::Minor);
        assert_eq!(meta.processing_level, Some(ProcessingLevel::Major));
    }

    #[test]
    fn test_update_overrides_only_set_fields() {
        let mut meta = VariableMeta::new()
            .with_title("Population")
            .with_unit("people", None)
            .with_origin(Origin::new("UN"));

        let patch = VariableMeta {
            description_short: Some("Total population".into()),
            unit: Some("persons".into()),
            ..Default::default()
        };
        meta.update(&patch);

        assert_eq!(meta.title.as_deref(), Some("Population"));
        assert_eq!(meta.unit.as_deref(), Some("persons"));
        assert_eq!(meta.description_short.as_deref(), Some("Total population"));
        assert_eq!(meta.origins.len(), 1);
    }

    #[test]
    fn test_processing_level_serializes_lowercase() {
        let meta = VariableMeta::new().with_processing_level(ProcessingLevel::Minor);
        let json = serde_json::to_string(&meta).unwrap();
        assert_eq!(json, r#"{"processing_level":"minor"}"#);
    }
}
