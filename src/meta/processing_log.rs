//! Processing log and provenance lineage
//!
//! Every table operation that renames or recomputes a column appends a
//! [`LogEntry`] to the resulting variable's log. Logs of combined inputs are
//! unioned, so a variable's log always describes its full ancestry and the
//! original source columns can be recovered with [`ProcessingLog::roots`].

use std::collections::{BTreeSet, HashMap};

use petgraph::Direction;
use petgraph::algo::has_path_connecting;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, Reversed};
use serde::{Deserialize, Serialize};

/// One step in a variable's history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct LogEntry {
    /// Name of the variable produced by this step
    pub variable: String,
    /// Names of the variables it was computed from
    #[serde(default)]
    pub parents: Vec<String>,
    /// Operation name (e.g., "rename", "add", "aggregate:sum")
    pub operation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl LogEntry {
    pub fn new(
        variable: impl Into<String>,
        parents: Vec<String>,
        operation: impl Into<String>,
    ) -> Self {
        Self {
            variable: variable.into(),
            parents,
            operation: operation.into(),
            comment: None,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Whether the operation produced values that differ from its inputs
    pub fn derives_values(&self) -> bool {
        DERIVING_OPERATIONS.contains(&self.operation.as_str())
    }
}

const DERIVING_OPERATIONS: &[&str] = &["add", "subtract", "multiply", "divide", "sum", "mean", "count"];

/// Ordered, duplicate-free list of log entries
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct ProcessingLog(Vec<LogEntry>);

impl ProcessingLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.0
    }

    /// Append an entry unless an identical one is already present
    pub fn push(&mut self, entry: LogEntry) {
        if !self.0.contains(&entry) {
            self.0.push(entry);
        }
    }

    /// Append every entry of `other` that is not already present
    pub fn extend_from(&mut self, other: &ProcessingLog) {
        for entry in &other.0 {
            self.push(entry.clone());
        }
    }

    /// Whether any entry computed new values rather than moving existing ones
    pub fn has_derivations(&self) -> bool {
        self.0.iter().any(LogEntry::derives_values)
    }

    /// Build the lineage graph: one node per variable name, one edge per
    /// parent → child relation, weighted by the operation name.
    pub fn lineage_graph(&self) -> (DiGraph<String, String>, HashMap<String, NodeIndex>) {
        let mut graph = DiGraph::new();
        let mut nodes: HashMap<String, NodeIndex> = HashMap::new();

        let mut node_for = |graph: &mut DiGraph<String, String>, name: &str| {
            *nodes
                .entry(name.to_string())
                .or_insert_with(|| graph.add_node(name.to_string()))
        };

        for entry in &self.0 {
            let child = node_for(&mut graph, &entry.variable);
            for parent in &entry.parents {
                let parent = node_for(&mut graph, parent);
                // A rename to the same name would be a self loop
                if parent != child {
                    graph.add_edge(parent, child, entry.operation.clone());
                }
            }
        }

        (graph, nodes)
    }

    /// Source variables `variable` derives from (ancestors with no parents)
    ///
    /// Returns `[variable]` when the log has no record of it. A variable on a
    /// cycle (a name reused further down its own lineage) counts as one of
    /// its own roots.
    pub fn roots(&self, variable: &str) -> Vec<String> {
        let (graph, nodes) = self.lineage_graph();
        let Some(&start) = nodes.get(variable) else {
            return vec![variable.to_string()];
        };

        let reversed = Reversed(&graph);
        let mut dfs = Dfs::new(reversed, start);
        let mut roots = BTreeSet::new();
        while let Some(node) = dfs.next(reversed) {
            if graph
                .neighbors_directed(node, Direction::Incoming)
                .next()
                .is_none()
            {
                roots.insert(graph[node].clone());
            }
        }
        let on_cycle = graph
            .neighbors_directed(start, Direction::Incoming)
            .any(|parent| has_path_connecting(&graph, start, parent, None));
        if on_cycle || roots.is_empty() {
            roots.insert(variable.to_string());
        }
        roots.into_iter().collect()
    }
}

impl From<Vec<LogEntry>> for ProcessingLog {
    fn from(entries: Vec<LogEntry>) -> Self {
        let mut log = ProcessingLog::new();
        for entry in entries {
            log.push(entry);
        }
        log
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_deduplicates() {
        let mut log = ProcessingLog::new();
        log.push(LogEntry::new("b", vec!["a".into()], "rename"));
        log.push(LogEntry::new("b", vec!["a".into()], "rename"));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_roots_follow_renames_and_derivations() {
        let log = ProcessingLog::from(vec![
            LogEntry::new("pop", vec!["population".into()], "rename"),
            LogEntry::new("gdp_pc", vec!["gdp".into(), "pop".into()], "divide"),
        ]);

        assert_eq!(log.roots("gdp_pc"), vec!["gdp", "population"]);
        assert_eq!(log.roots("pop"), vec!["population"]);
        assert_eq!(log.roots("unrelated"), vec!["unrelated"]);
        assert!(log.has_derivations());
    }

    #[test]
    fn test_roots_keep_variable_on_cycle() {
        // gdp and population melted into value, then value spread back to gdp
        let log = ProcessingLog::from(vec![
            LogEntry::new("value", vec!["gdp".into(), "population".into()], "melt"),
            LogEntry::new("gdp", vec!["value".into()], "pivot"),
        ]);
        assert_eq!(log.roots("gdp"), vec!["gdp", "population"]);

        let renamed = ProcessingLog::from(vec![
            LogEntry::new("b", vec!["a".into()], "rename"),
            LogEntry::new("a", vec!["b".into()], "rename"),
        ]);
        assert_eq!(renamed.roots("a"), vec!["a"]);
    }
}
