//! Materialization reports.
//!
//! Counts are the success signal for a load: a run that skipped rows or
//! whole edge types still completes, and the report says what was dropped.

use std::fmt;

use serde::Serialize;

use super::ClassState;
use crate::report::ItemFailure;

/// Per node class outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeClassReport {
    pub label: String,
    pub state: ClassState,
    pub created: usize,
    /// Rows that updated an existing node with the same key.
    pub merged: usize,
    /// Rows without a key value or any mappable value, and rejected writes.
    pub skipped: usize,
    /// Rows the CSV reader could not parse.
    pub malformed: usize,
}

impl NodeClassReport {
    pub fn new(label: impl Into<String>, state: ClassState) -> Self {
        Self {
            label: label.into(),
            state,
            created: 0,
            merged: 0,
            skipped: 0,
            malformed: 0,
        }
    }
}

/// Per edge type outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EdgeTypeReport {
    pub relationship: String,
    pub csv_file: String,
    /// Data rows read.
    pub rows: usize,
    /// Rows resolved by the classes' key properties.
    pub primary: usize,
    /// Rows resolved by the secondary key.
    pub secondary: usize,
    /// Rows with an empty value on either side.
    pub skipped_empty: usize,
    /// Rows neither key could resolve.
    pub unresolved: usize,
    /// Rows the CSV reader could not parse.
    pub malformed: usize,
}

impl EdgeTypeReport {
    pub fn resolved(&self) -> usize {
        self.primary + self.secondary
    }
}

/// Graph contents after a run, as verification queries would report them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphSummary {
    pub nodes: usize,
    pub edges: usize,
    pub labels: Vec<(String, usize)>,
    pub relationship_types: Vec<(String, usize)>,
}

/// Aggregate outcome of a materialization run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MaterializeReport {
    pub nodes: Vec<NodeClassReport>,
    pub edges: Vec<EdgeTypeReport>,
    pub failures: Vec<ItemFailure>,
    pub summary: GraphSummary,
}

impl MaterializeReport {
    pub fn nodes_created(&self) -> usize {
        self.nodes.iter().map(|n| n.created).sum()
    }

    pub fn nodes_merged(&self) -> usize {
        self.nodes.iter().map(|n| n.merged).sum()
    }

    pub fn nodes_skipped(&self) -> usize {
        self.nodes.iter().map(|n| n.skipped).sum()
    }

    pub fn edges_resolved(&self) -> usize {
        self.edges.iter().map(EdgeTypeReport::resolved).sum()
    }

    pub fn edges_unresolved(&self) -> usize {
        self.edges.iter().map(|e| e.unresolved).sum()
    }

    pub fn node_class(&self, label: &str) -> Option<&NodeClassReport> {
        self.nodes.iter().find(|n| n.label == label)
    }

    pub fn edge_type(&self, relationship: &str) -> Option<&EdgeTypeReport> {
        self.edges.iter().find(|e| e.relationship == relationship)
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.edges_unresolved() == 0
    }
}

impl fmt::Display for MaterializeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Nodes:")?;
        for n in &self.nodes {
            writeln!(
                f,
                "  {:<24} {:>8} created {:>8} merged {:>6} skipped {:>6} malformed  [{:?}]",
                n.label, n.created, n.merged, n.skipped, n.malformed, n.state
            )?;
        }
        writeln!(f, "Relationships:")?;
        for e in &self.edges {
            writeln!(
                f,
                "  {:<24} {:>8} primary {:>6} secondary {:>6} empty {:>6} unresolved {:>6} malformed",
                e.relationship, e.primary, e.secondary, e.skipped_empty, e.unresolved, e.malformed
            )?;
        }
        if !self.failures.is_empty() {
            writeln!(f, "Failures:")?;
            for failure in &self.failures {
                writeln!(f, "  {failure}")?;
            }
        }
        writeln!(f, "Graph:")?;
        for (label, count) in &self.summary.labels {
            writeln!(f, "  ({label}) {count}")?;
        }
        for (rel, count) in &self.summary.relationship_types {
            writeln!(f, "  [:{rel}] {count}")?;
        }
        write!(
            f,
            "  total: {} nodes, {} relationships",
            self.summary.nodes, self.summary.edges
        )
    }
}
