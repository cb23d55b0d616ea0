//! In-memory graph store.
//!
//! Everything lives behind a single `RwLock`, so each store call is atomic
//! with respect to every other call. Uniqueness constraints are backed by a
//! value index per (label, property); unconstrained lookups scan the label
//! index.
//!
//! The whole graph can be saved to and restored from a JSON snapshot, which is
//! how the CLI keeps a graph across runs.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    sort_counts, ConstraintOutcome, GraphError, GraphResult, GraphStore, NodeMatch, NodeWrite,
    PropertyMap, UniqueConstraint,
};

// ============================================================================
// Snapshot format
// ============================================================================

/// A node as stored in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotNode {
    pub id: u64,
    pub label: String,
    #[serde(default)]
    pub properties: PropertyMap,
}

/// An edge as stored in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEdge {
    pub from: u64,
    #[serde(rename = "type")]
    pub rel_type: String,
    pub to: u64,
}

/// Serializable image of a whole graph, constraints included.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    #[serde(default)]
    pub constraints: Vec<UniqueConstraint>,
    #[serde(default)]
    pub nodes: Vec<SnapshotNode>,
    #[serde(default)]
    pub edges: Vec<SnapshotEdge>,
}

// ============================================================================
// State
// ============================================================================

#[derive(Debug, Clone)]
struct StoredNode {
    label: String,
    properties: PropertyMap,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct EdgeKey {
    from: u64,
    rel_type: String,
    to: u64,
}

type IndexKey = (String, String);

#[derive(Debug, Default)]
struct GraphState {
    nodes: BTreeMap<u64, StoredNode>,
    /// label → node ids
    label_index: HashMap<String, BTreeSet<u64>>,
    edges: BTreeSet<EdgeKey>,
    constraints: BTreeMap<String, UniqueConstraint>,
    /// (label, property) → value → node id
    unique_index: HashMap<IndexKey, HashMap<String, u64>>,
    next_id: u64,
}

impl GraphState {
    fn constrained_properties(&self, label: &str) -> Vec<String> {
        self.constraints
            .values()
            .filter(|c| c.label == label)
            .map(|c| c.property.clone())
            .collect()
    }

    fn index_node(&mut self, id: u64) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        for property in self.constrained_properties(&node.label) {
            if let Some(value) = node.properties.get(&property) {
                self.unique_index
                    .entry((node.label.clone(), property))
                    .or_default()
                    .insert(value.clone(), id);
            }
        }
    }

    fn unindex_node(&mut self, id: u64) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        for property in self.constrained_properties(&node.label) {
            if let Some(value) = node.properties.get(&property) {
                if let Some(index) = self.unique_index.get_mut(&(node.label.clone(), property)) {
                    index.remove(value);
                }
            }
        }
    }

    fn write_node(&mut self, label: &str, props: PropertyMap) -> NodeWrite {
        let existing = self.constrained_properties(label).into_iter().find_map(|property| {
            let value = props.get(&property)?;
            self.unique_index
                .get(&(label.to_string(), property))?
                .get(value)
                .copied()
        });

        match existing {
            Some(id) => {
                self.unindex_node(id);
                if let Some(node) = self.nodes.get_mut(&id) {
                    node.properties.extend(props);
                }
                self.index_node(id);
                NodeWrite::Merged
            }
            None => {
                let id = self.next_id;
                self.next_id += 1;
                self.insert_node(id, label.to_string(), props);
                NodeWrite::Created
            }
        }
    }

    fn insert_node(&mut self, id: u64, label: String, properties: PropertyMap) {
        self.label_index.entry(label.clone()).or_default().insert(id);
        self.nodes.insert(id, StoredNode { label, properties });
        self.index_node(id);
    }

    fn find_nodes(&self, m: &NodeMatch<'_>) -> Vec<u64> {
        let key = (m.label.to_string(), m.property.to_string());
        if let Some(index) = self.unique_index.get(&key) {
            return index.get(m.value).copied().into_iter().collect();
        }
        let Some(ids) = self.label_index.get(m.label) else {
            return Vec::new();
        };
        ids.iter()
            .copied()
            .filter(|id| {
                self.nodes
                    .get(id)
                    .and_then(|n| n.properties.get(m.property))
                    .is_some_and(|v| v == m.value)
            })
            .collect()
    }

    fn create_constraint(
        &mut self,
        name: &str,
        label: &str,
        property: &str,
    ) -> GraphResult<ConstraintOutcome> {
        if self.constraints.contains_key(name)
            || self
                .constraints
                .values()
                .any(|c| c.label == label && c.property == property)
        {
            return Ok(ConstraintOutcome::AlreadyExists);
        }

        let mut index = HashMap::new();
        if let Some(ids) = self.label_index.get(label) {
            for id in ids {
                let Some(value) = self.nodes.get(id).and_then(|n| n.properties.get(property)) else {
                    continue;
                };
                if index.insert(value.clone(), *id).is_some() {
                    return Err(GraphError::ConstraintViolation {
                        constraint: name.to_string(),
                        label: label.to_string(),
                        property: property.to_string(),
                        value: value.clone(),
                    });
                }
            }
        }

        self.unique_index
            .insert((label.to_string(), property.to_string()), index);
        self.constraints.insert(
            name.to_string(),
            UniqueConstraint {
                name: name.to_string(),
                label: label.to_string(),
                property: property.to_string(),
            },
        );
        Ok(ConstraintOutcome::Created)
    }

    fn drop_constraint(&mut self, name: &str) -> bool {
        match self.constraints.remove(name) {
            Some(c) => {
                self.unique_index.remove(&(c.label, c.property));
                true
            }
            None => false,
        }
    }

    fn clear(&mut self) {
        self.nodes.clear();
        self.label_index.clear();
        self.edges.clear();
        for index in self.unique_index.values_mut() {
            index.clear();
        }
    }

    fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            constraints: self.constraints.values().cloned().collect(),
            nodes: self
                .nodes
                .iter()
                .map(|(id, n)| SnapshotNode {
                    id: *id,
                    label: n.label.clone(),
                    properties: n.properties.clone(),
                })
                .collect(),
            edges: self
                .edges
                .iter()
                .map(|e| SnapshotEdge {
                    from: e.from,
                    rel_type: e.rel_type.clone(),
                    to: e.to,
                })
                .collect(),
        }
    }
}

// ============================================================================
// MemoryGraph
// ============================================================================

/// In-memory property graph.
#[derive(Debug, Clone, Default)]
pub struct MemoryGraph {
    inner: Arc<RwLock<GraphState>>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a graph from a snapshot. Fails if the snapshot's nodes violate
    /// its own constraints.
    pub fn from_snapshot(snapshot: GraphSnapshot) -> GraphResult<Self> {
        let mut state = GraphState::default();
        for node in snapshot.nodes {
            state.next_id = state.next_id.max(node.id + 1);
            state.insert_node(node.id, node.label, node.properties);
        }
        for c in snapshot.constraints {
            state.create_constraint(&c.name, &c.label, &c.property)?;
        }
        for e in snapshot.edges {
            if state.nodes.contains_key(&e.from) && state.nodes.contains_key(&e.to) {
                state.edges.insert(EdgeKey {
                    from: e.from,
                    rel_type: e.rel_type,
                    to: e.to,
                });
            }
        }
        Ok(Self {
            inner: Arc::new(RwLock::new(state)),
        })
    }

    /// Current contents as a snapshot.
    pub fn snapshot(&self) -> GraphSnapshot {
        self.inner.read().snapshot()
    }

    /// Write the graph to a JSON snapshot file.
    pub fn save_snapshot(&self, path: impl AsRef<Path>) -> GraphResult<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(&self.snapshot())?;
        fs::write(path, json).map_err(|source| GraphError::Snapshot {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "saved graph snapshot");
        Ok(())
    }

    /// Read a graph from a JSON snapshot file.
    pub fn load_snapshot(path: impl AsRef<Path>) -> GraphResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| GraphError::Snapshot {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_snapshot(serde_json::from_str(&text)?)
    }

    /// Load a snapshot if the file exists, otherwise start empty.
    pub fn open(path: impl AsRef<Path>) -> GraphResult<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load_snapshot(path)
        } else {
            Ok(Self::new())
        }
    }

    /// Constraints currently defined.
    pub fn constraints(&self) -> Vec<UniqueConstraint> {
        self.inner.read().constraints.values().cloned().collect()
    }

    /// Properties of every node with `label`, in creation order.
    pub fn nodes_with_label(&self, label: &str) -> Vec<PropertyMap> {
        let state = self.inner.read();
        state
            .label_index
            .get(label)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| state.nodes.get(id))
                    .map(|n| n.properties.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl GraphStore for MemoryGraph {
    async fn drop_constraint_if_exists(&self, name: &str) -> GraphResult<bool> {
        Ok(self.inner.write().drop_constraint(name))
    }

    async fn create_unique_constraint(
        &self,
        name: &str,
        label: &str,
        property: &str,
    ) -> GraphResult<ConstraintOutcome> {
        self.inner.write().create_constraint(name, label, property)
    }

    async fn write_node(&self, label: &str, props: PropertyMap) -> GraphResult<NodeWrite> {
        Ok(self.inner.write().write_node(label, props))
    }

    async fn merge_edge(
        &self,
        rel_type: &str,
        from: &NodeMatch<'_>,
        to: &NodeMatch<'_>,
    ) -> GraphResult<u64> {
        let mut state = self.inner.write();
        let sources = state.find_nodes(from);
        if sources.is_empty() {
            return Ok(0);
        }
        let targets = state.find_nodes(to);

        let mut matched = 0;
        for a in &sources {
            for b in &targets {
                state.edges.insert(EdgeKey {
                    from: *a,
                    rel_type: rel_type.to_string(),
                    to: *b,
                });
                matched += 1;
            }
        }
        Ok(matched)
    }

    async fn clear(&self) -> GraphResult<()> {
        self.inner.write().clear();
        Ok(())
    }

    async fn node_count(&self) -> GraphResult<usize> {
        Ok(self.inner.read().nodes.len())
    }

    async fn edge_count(&self) -> GraphResult<usize> {
        Ok(self.inner.read().edges.len())
    }

    async fn label_counts(&self) -> GraphResult<Vec<(String, usize)>> {
        let state = self.inner.read();
        let counts = state
            .label_index
            .iter()
            .filter(|(_, ids)| !ids.is_empty())
            .map(|(label, ids)| (label.clone(), ids.len()))
            .collect();
        Ok(sort_counts(counts))
    }

    async fn relationship_type_counts(&self) -> GraphResult<Vec<(String, usize)>> {
        let state = self.inner.read();
        let mut counts = BTreeMap::new();
        for edge in &state.edges {
            *counts.entry(edge.rel_type.clone()).or_insert(0) += 1;
        }
        Ok(sort_counts(counts))
    }
}
