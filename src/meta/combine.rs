//! Metadata propagation rules
//!
//! Decides what metadata a column carries after an operation combined one or
//! more input columns:
//! - text fields survive when every input that sets them agrees
//! - origins, licenses, sources and key descriptions are unioned
//! - the processing level is the maximum of the inputs, escalated to
//!   `major` by operations that derive new values
//! - logs are unioned and a new entry records the operation

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::MetaError;
use super::dataset::TableMeta;
use super::processing_log::LogEntry;
use super::variable::{ProcessingLevel, VariableMeta};

/// What to do when inputs disagree on a metadata field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Drop the field and log a warning (default)
    #[default]
    Warn,
    /// Keep the value of the first input that sets the field
    KeepFirst,
    /// Fail the operation
    Error,
}

impl std::str::FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "warn" => Ok(ConflictPolicy::Warn),
            "keep_first" | "keep-first" | "first" => Ok(ConflictPolicy::KeepFirst),
            "error" | "strict" => Ok(ConflictPolicy::Error),
            _ => Err(format!(
                "Invalid conflict policy: {}. Expected: warn, keep_first, error",
                s
            )),
        }
    }
}

/// Operation that combined input columns into a new one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
    Concat,
    Merge,
    Melt,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Subtract => "subtract",
            Self::Multiply => "multiply",
            Self::Divide => "divide",
            Self::Concat => "concat",
            Self::Merge => "merge",
            Self::Melt => "melt",
        }
    }

    /// Whether the result's values differ from every input's values
    pub fn derives_values(&self) -> bool {
        matches!(
            self,
            Self::Add | Self::Subtract | Self::Multiply | Self::Divide
        )
    }

    /// Whether the inputs end up in the same column, so that disagreeing
    /// metadata is a genuine conflict
    pub fn expects_same_variable(&self) -> bool {
        matches!(self, Self::Concat | Self::Merge | Self::Melt)
    }
}

/// Inputs disagreed on `field`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldConflict {
    pub field: &'static str,
    /// Distinct values found, JSON encoded
    pub values: Vec<String>,
}

/// Result of combining metadata
#[derive(Debug, Clone)]
pub struct Combined {
    pub metadata: VariableMeta,
    pub conflicts: Vec<FieldConflict>,
}

impl Combined {
    /// Turn conflicts into an error under [`ConflictPolicy::Error`]
    pub fn resolve(self, column: &str, policy: ConflictPolicy) -> Result<VariableMeta, MetaError> {
        if policy == ConflictPolicy::Error
            && let Some(conflict) = self.conflicts.into_iter().next()
        {
            return Err(MetaError::Conflict {
                column: column.to_string(),
                field: conflict.field.to_string(),
                values: conflict.values.join(" vs "),
            });
        }
        Ok(self.metadata)
    }
}

fn agree<T: Clone + PartialEq + Serialize>(
    field: &'static str,
    values: impl IntoIterator<Item = Option<T>>,
    require_all: bool,
    policy: ConflictPolicy,
    conflicts: &mut Vec<FieldConflict>,
) -> Option<T> {
    let values: Vec<Option<T>> = values.into_iter().collect();
    if require_all && values.iter().any(Option::is_none) {
        return None;
    }

    let mut distinct: Vec<T> = Vec::new();
    for value in values.into_iter().flatten() {
        if !distinct.contains(&value) {
            distinct.push(value);
        }
    }

    let mut distinct = distinct.into_iter();
    let first = distinct.next()?;
    let rest: Vec<T> = distinct.collect();
    if rest.is_empty() {
        return Some(first);
    }

    let values = std::iter::once(&first)
        .chain(rest.iter())
        .map(|v| serde_json::to_string(v).unwrap_or_default())
        .collect();
    conflicts.push(FieldConflict { field, values });

    match policy {
        ConflictPolicy::KeepFirst => Some(first),
        ConflictPolicy::Warn | ConflictPolicy::Error => None,
    }
}

fn union<'a, T: Clone + PartialEq + 'a>(lists: impl IntoIterator<Item = &'a Vec<T>>) -> Vec<T> {
    let mut out: Vec<T> = Vec::new();
    for item in lists.into_iter().flatten() {
        if !out.contains(item) {
            out.push(item.clone());
        }
    }
    out
}

/// Combine the metadata of `inputs` (name, metadata) into the metadata of the
/// variable `name` produced by `operation`
pub fn combine_variables_metadata(
    inputs: &[(&str, &VariableMeta)],
    operation: Operation,
    name: &str,
    policy: ConflictPolicy,
) -> Combined {
    let metas: Vec<&VariableMeta> = inputs.iter().map(|(_, m)| *m).collect();
    let mut conflicts = Vec::new();
    // A derived value only inherits a description that every input shares
    let require_all = operation.derives_values();

    macro_rules! agree_field {
        ($field:ident) => {
            agree(
                stringify!($field),
                metas.iter().map(|m| m.$field.clone()),
                require_all,
                policy,
                &mut conflicts,
            )
        };
    }

    let mut meta = VariableMeta {
        title: agree_field!(title),
        description: agree_field!(description),
        description_short: agree_field!(description_short),
        description_from_producer: agree_field!(description_from_producer),
        description_processing: agree_field!(description_processing),
        license: agree_field!(license),
        additional_info: agree_field!(additional_info),
        presentation: agree_field!(presentation),
        display: agree(
            "display",
            metas
                .iter()
                .map(|m| Some(m.display.clone()).filter(|d| !d.is_empty())),
            require_all,
            policy,
            &mut conflicts,
        )
        .unwrap_or_default(),
        description_key: union(metas.iter().map(|m| &m.description_key)),
        origins: union(metas.iter().map(|m| &m.origins)),
        licenses: union(metas.iter().map(|m| &m.licenses)),
        sources: union(metas.iter().map(|m| &m.sources)),
        ..Default::default()
    };

    if matches!(operation, Operation::Multiply | Operation::Divide) {
        // The product or ratio of two quantities has a new unit
        meta.unit = None;
        meta.short_unit = None;
    } else {
        meta.unit = agree_field!(unit);
        meta.short_unit = agree_field!(short_unit);
    }

    meta.processing_level = metas.iter().filter_map(|m| m.processing_level).max();
    if operation.derives_values() {
        meta.escalate(ProcessingLevel::Major);
    }

    for m in &metas {
        meta.processing_log.extend_from(&m.processing_log);
    }
    meta.log(LogEntry::new(
        name,
        inputs.iter().map(|(n, _)| n.to_string()).collect(),
        operation.name(),
    ));

    for conflict in &conflicts {
        if operation.expects_same_variable() {
            warn!(
                "Metadata conflict in '{}' on {}: {} ({:?})",
                name,
                operation.name(),
                conflict.field,
                conflict.values
            );
        } else {
            debug!(
                "Dropping '{}' of '{}' after {}: inputs differ",
                conflict.field,
                name,
                operation.name()
            );
        }
    }

    Combined {
        metadata: meta,
        conflicts,
    }
}

/// Combine table level metadata of several inputs
///
/// Descriptive fields survive only when identical across inputs; the primary
/// key is taken from the first input.
pub fn combine_tables_metadata(inputs: &[&TableMeta]) -> TableMeta {
    let Some(first) = inputs.first() else {
        return TableMeta::default();
    };

    fn identical<T: Clone + PartialEq>(values: Vec<&Option<T>>) -> Option<T> {
        let first = values.first()?;
        if values.iter().all(|v| v == first) {
            (*first).clone()
        } else {
            None
        }
    }

    TableMeta {
        short_name: identical(inputs.iter().map(|t| &t.short_name).collect()),
        title: identical(inputs.iter().map(|t| &t.title).collect()),
        description: identical(inputs.iter().map(|t| &t.description).collect()),
        dataset: identical(inputs.iter().map(|t| &t.dataset).collect()),
        primary_key: first.primary_key.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::Origin;

    fn population(producer: &str) -> VariableMeta {
        VariableMeta::new()
            .with_title("Population")
            .with_unit("people", None)
            .with_origin(Origin::new(producer))
            .with_processing_level(ProcessingLevel::Minor)
    }

    #[test]
    fn test_concat_unions_origins_and_keeps_agreed_fields() {
        let a = population("UN");
        let b = population("HYDE");
        let combined = combine_variables_metadata(
            &[("population", &a), ("population", &b)],
            Operation::Concat,
            "population",
            ConflictPolicy::Warn,
        );

        assert!(combined.conflicts.is_empty());
        let meta = combined.metadata;
        assert_eq!(meta.title.as_deref(), Some("Population"));
        assert_eq!(meta.unit.as_deref(), Some("people"));
        assert_eq!(meta.origins.len(), 2);
        assert_eq!(meta.processing_level, Some(ProcessingLevel::Minor));
    }

    #[test]
    fn test_conflicting_titles_are_flagged() {
        let a = population("UN");
        let b = population("UN").with_title("Total population");

        let combined = combine_variables_metadata(
            &[("population", &a), ("population", &b)],
            Operation::Merge,
            "population",
            ConflictPolicy::Warn,
        );
        assert_eq!(combined.conflicts.len(), 1);
        assert_eq!(combined.conflicts[0].field, "title");
        assert_eq!(combined.metadata.title, None);

        let keep_first = combine_variables_metadata(
            &[("population", &a), ("population", &b)],
            Operation::Merge,
            "population",
            ConflictPolicy::KeepFirst,
        );
        assert_eq!(keep_first.metadata.title.as_deref(), Some("Population"));

        let strict = combine_variables_metadata(
            &[("population", &a), ("population", &b)],
            Operation::Merge,
            "population",
            ConflictPolicy::Error,
        );
        assert!(matches!(
            strict.resolve("population", ConflictPolicy::Error),
            Err(MetaError::Conflict { .. })
        ));
    }

    #[test]
    fn test_division_clears_units_and_escalates() {
        let gdp = VariableMeta::new()
            .with_unit("international-$", Some("$"))
            .with_origin(Origin::new("World Bank"));
        let pop = population("UN");

        let meta = combine_variables_metadata(
            &[("gdp", &gdp), ("population", &pop)],
            Operation::Divide,
            "gdp_per_capita",
            ConflictPolicy::Warn,
        )
        .metadata;

        assert_eq!(meta.title, None);
        assert_eq!(meta.unit, None);
        assert_eq!(meta.short_unit, None);
        assert_eq!(meta.processing_level, Some(ProcessingLevel::Major));
        assert_eq!(meta.origins.len(), 2);
        assert_eq!(
            meta.processing_log.roots("gdp_per_capita"),
            vec!["gdp", "population"]
        );
    }

    #[test]
    fn test_combine_tables_metadata() {
        let a = TableMeta::new("population").with_title("Population");
        let mut b = TableMeta::new("population").with_title("Population (HYDE)");
        b.primary_key = vec!["country".into()];

        let meta = combine_tables_metadata(&[&a, &b]);
        assert_eq!(meta.short_name.as_deref(), Some("population"));
        assert_eq!(meta.title, None);
        assert!(meta.primary_key.is_empty());
    }

    #[test]
    fn test_conflict_policy_from_str() {
        assert_eq!(
            "keep-first".parse::<ConflictPolicy>().unwrap(),
            ConflictPolicy::KeepFirst
        );
        assert_eq!("error".parse::<ConflictPolicy>().unwrap(), ConflictPolicy::Error);
        assert!("ignore".parse::<ConflictPolicy>().is_err());
    }
}
