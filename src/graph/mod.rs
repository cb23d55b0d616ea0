//! Property graph store.
//!
//! The materializer talks to the graph through [`GraphStore`]. The contract is
//! deliberately small: uniqueness constraints keyed by label and property,
//! node writes, edge merges between key-matched endpoints, and the counts
//! used to verify a load.
//!
//! ## Implementations
//!
//! | Store          | Module   | Description                                      |
//! |----------------|----------|--------------------------------------------------|
//! | `MemoryGraph`  | `memory` | In-memory store with JSON snapshots              |
//!
//! A populated graph can be exported as a Cypher script with
//! [`export_cypher_dump`] for loading into Neo4j-compatible databases.

mod export;
mod memory;

pub use export::export_cypher_dump;
pub use memory::{GraphSnapshot, MemoryGraph, SnapshotEdge, SnapshotNode};

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for graph store operations.
pub type GraphResult<T> = Result<T, GraphError>;

/// Graph store errors.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Existing data violates a uniqueness constraint being created.
    #[error("constraint {constraint} violated: duplicate {label}.{property} = '{value}'")]
    ConstraintViolation {
        constraint: String,
        label: String,
        property: String,
        value: String,
    },

    #[error("snapshot {path}: {source}")]
    Snapshot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid snapshot: {0}")]
    SnapshotFormat(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GraphError {
    /// Whether the error is scoped to one constraint rather than the store.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, Self::ConstraintViolation { .. })
    }
}

/// Node and edge properties. Values are flat-file fields, stored as text.
pub type PropertyMap = BTreeMap<String, String>;

/// A uniqueness constraint on one property of one label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniqueConstraint {
    pub name: String,
    pub label: String,
    pub property: String,
}

/// Outcome of creating a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintOutcome {
    Created,
    /// An equivalent constraint exists; nothing changed.
    AlreadyExists,
}

/// Outcome of writing a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeWrite {
    Created,
    /// A node with the same constrained key existed; its properties were
    /// overwritten.
    Merged,
}

/// Selects nodes by label and one property value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeMatch<'a> {
    pub label: &'a str,
    pub property: &'a str,
    pub value: &'a str,
}

impl<'a> NodeMatch<'a> {
    pub fn new(label: &'a str, property: &'a str, value: &'a str) -> Self {
        Self {
            label,
            property,
            value,
        }
    }
}

/// Storage contract for materialization.
///
/// Implementations must tolerate concurrent calls; writes against the same
/// key are serialized by the store itself.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Drop a constraint by name. Returns whether it existed.
    async fn drop_constraint_if_exists(&self, name: &str) -> GraphResult<bool>;

    /// Require `property` to be unique among nodes labelled `label`.
    async fn create_unique_constraint(
        &self,
        name: &str,
        label: &str,
        property: &str,
    ) -> GraphResult<ConstraintOutcome>;

    /// Write one node. When `label` has a uniqueness constraint and `props`
    /// carries its property, a node with the same value is updated instead of
    /// duplicated.
    async fn write_node(&self, label: &str, props: PropertyMap) -> GraphResult<NodeWrite>;

    /// Merge a `rel_type` edge from every node matching `from` to every node
    /// matching `to`. Returns the number of endpoint pairs matched; zero means
    /// nothing matched and nothing was written.
    async fn merge_edge(
        &self,
        rel_type: &str,
        from: &NodeMatch<'_>,
        to: &NodeMatch<'_>,
    ) -> GraphResult<u64>;

    /// Remove every node and edge. Constraints are kept.
    async fn clear(&self) -> GraphResult<()>;

    async fn node_count(&self) -> GraphResult<usize>;

    async fn edge_count(&self) -> GraphResult<usize>;

    /// Node counts per label, largest first.
    async fn label_counts(&self) -> GraphResult<Vec<(String, usize)>>;

    /// Edge counts per relationship type, largest first.
    async fn relationship_type_counts(&self) -> GraphResult<Vec<(String, usize)>>;
}

/// Sort `(name, count)` pairs by descending count, then name.
pub(crate) fn sort_counts(counts: BTreeMap<String, usize>) -> Vec<(String, usize)> {
    let mut out: Vec<(String, usize)> = counts.into_iter().collect();
    out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    out
}
