//! Graph materialization.
//!
//! Loads the flat files referenced by an ontology into a [`GraphStore`].
//!
//! # Node class lifecycle
//!
//! ```text
//! Uninitialized ──(drop + create key constraint)──► Constrained ──(read flat file)──► Loaded
//! ```
//!
//! The constraint comes first so that re-running a load updates existing
//! nodes instead of duplicating them. A class without a key property still
//! reaches `Constrained`, with a warning, since nothing can be enforced for it.
//! A class whose constraint cannot be created stays `Uninitialized` and is not
//! loaded.
//!
//! # Stages
//!
//! 1. Constraints for every class
//! 2. Nodes for every `Constrained` class (concurrently)
//! 3. Edges for every edge type whose endpoint classes are `Loaded`
//!    (concurrently), resolved through [`ResolutionPolicy`]
//!
//! A missing file, an unknown class, or an unresolvable row is recorded in the
//! [`MaterializeReport`] and the run continues.

mod report;
mod resolution;

pub use report::{EdgeTypeReport, GraphSummary, MaterializeReport, NodeClassReport};
pub use resolution::{EdgeResolution, Endpoint, KeyVia, ResolutionPolicy};

use std::collections::HashMap;
use std::path::Path;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::graph::{ConstraintOutcome, GraphResult, GraphStore, NodeWrite, PropertyMap};
use crate::ontology::{EdgeType, NodeClass, Ontology};
use crate::report::{FailureKind, ItemFailure};

/// Default secondary key property.
pub const DEFAULT_SECONDARY_KEY: &str = "nodeId";

/// Load state of a node class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassState {
    Uninitialized,
    Constrained,
    Loaded,
}

/// Materialization tuning, from the `[graph]` settings section.
#[derive(Debug, Clone)]
pub struct MaterializeOptions {
    /// Fallback key property for edge resolution; `None` disables fallback.
    pub secondary_key: Option<String>,
    /// Remove all nodes and edges before loading.
    pub clear_before_load: bool,
    /// Node classes / edge types loaded concurrently.
    pub workers: usize,
}

impl Default for MaterializeOptions {
    fn default() -> Self {
        Self {
            secondary_key: Some(DEFAULT_SECONDARY_KEY.to_string()),
            clear_before_load: false,
            workers: 4,
        }
    }
}

/// Drives one ontology into one graph store.
pub struct Materializer<'a, G: ?Sized> {
    store: &'a G,
    ontology: &'a Ontology,
    options: MaterializeOptions,
    policy: ResolutionPolicy,
}

impl<'a, G: GraphStore + ?Sized> Materializer<'a, G> {
    pub fn new(store: &'a G, ontology: &'a Ontology) -> Self {
        Self::with_options(store, ontology, MaterializeOptions::default())
    }

    pub fn with_options(store: &'a G, ontology: &'a Ontology, options: MaterializeOptions) -> Self {
        let policy = ResolutionPolicy::new(options.secondary_key.clone());
        Self {
            store,
            ontology,
            options,
            policy,
        }
    }

    /// Run all stages. Errors are store-wide failures only (clearing,
    /// counting); everything scoped to a class, edge type, or row is reported.
    pub async fn run(&self) -> GraphResult<MaterializeReport> {
        let mut report = MaterializeReport::default();

        for warning in self.ontology.warnings() {
            warn!("{warning}");
        }

        if self.options.clear_before_load {
            self.store.clear().await?;
            info!("graph cleared");
        }

        // Stage 1: constraints.
        let mut states: HashMap<String, ClassState> = HashMap::new();
        for class in &self.ontology.nodes {
            let state = match self.constrain(class).await {
                Ok(state) => state,
                Err(failure) => {
                    warn!("{failure}");
                    report.failures.push(failure);
                    ClassState::Uninitialized
                }
            };
            states.insert(class.label.clone(), state);
        }

        // Stage 2: nodes.
        let workers = self.options.workers.max(1);
        let loaded: Vec<(NodeClassReport, Vec<ItemFailure>)> = stream::iter(&self.ontology.nodes)
            .map(|class| {
                let state = states
                    .get(&class.label)
                    .copied()
                    .unwrap_or(ClassState::Uninitialized);
                async move { self.load_nodes(class, state).await }
            })
            .buffered(workers)
            .collect()
            .await;

        for (node_report, failures) in loaded {
            states.insert(node_report.label.clone(), node_report.state);
            report.failures.extend(failures);
            report.nodes.push(node_report);
        }

        // Stage 3: edges.
        let states = &states;
        let loaded: Vec<(EdgeTypeReport, Vec<ItemFailure>)> = stream::iter(&self.ontology.edges)
            .map(|edge| async move { self.load_edges(edge, states).await })
            .buffered(workers)
            .collect()
            .await;

        for (edge_report, failures) in loaded {
            report.failures.extend(failures);
            report.edges.push(edge_report);
        }

        report.summary = summarize(self.store).await?;
        info!(
            nodes_created = report.nodes_created(),
            nodes_merged = report.nodes_merged(),
            edges = report.edges_resolved(),
            unresolved = report.edges_unresolved(),
            failures = report.failures.len(),
            "materialization complete"
        );
        Ok(report)
    }

    /// Uninitialized → Constrained.
    async fn constrain(&self, class: &NodeClass) -> Result<ClassState, ItemFailure> {
        let (Some(key), Some(name)) = (class.key_name(), class.constraint_name()) else {
            warn!(class = %class.label, "no key property; reloading this class will duplicate nodes");
            return Ok(ClassState::Constrained);
        };
        let store_failure = |e| ItemFailure::new(format!("constraint {name}"), FailureKind::Store, e);

        self.store
            .drop_constraint_if_exists(&name)
            .await
            .map_err(store_failure)?;
        match self
            .store
            .create_unique_constraint(&name, &class.label, key)
            .await
            .map_err(store_failure)?
        {
            ConstraintOutcome::Created => {
                info!(class = %class.label, key = %key, "constraint created")
            }
            ConstraintOutcome::AlreadyExists => {
                debug!(class = %class.label, key = %key, "equivalent constraint already exists")
            }
        }
        Ok(ClassState::Constrained)
    }

    /// Constrained → Loaded.
    async fn load_nodes(
        &self,
        class: &NodeClass,
        state: ClassState,
    ) -> (NodeClassReport, Vec<ItemFailure>) {
        let mut report = NodeClassReport::new(&class.label, state);
        let mut failures = Vec::new();
        if state != ClassState::Constrained {
            return (report, failures);
        }

        let item = format!("node class {}", class.label);
        let path = self.ontology.resolve(&class.csv_file);
        let (headers, records) = match read_flat_file(&path) {
            Ok(file) => file,
            Err((kind, message)) => {
                let failure = ItemFailure::new(item, kind, message);
                warn!("{failure}");
                failures.push(failure);
                return (report, failures);
            }
        };

        let mut columns: Vec<(usize, &str)> = Vec::with_capacity(class.properties.len());
        let mut missing = Vec::new();
        for p in &class.properties {
            match headers.iter().position(|h| *h == p.column) {
                Some(i) => columns.push((i, p.property.as_str())),
                None => missing.push(p.column.as_str()),
            }
        }
        if !missing.is_empty() {
            let failure = ItemFailure::new(
                item.clone(),
                FailureKind::MissingResource,
                format!("columns missing from {}: {}", class.csv_file, missing.join(", ")),
            );
            warn!("{failure}");
            failures.push(failure);
        }

        // Rows without a key value would be created again on every run.
        let key = class.key_name();
        if let Some(key) = key {
            if !columns.iter().any(|(_, property)| *property == key) {
                warn!(class = %class.label, key = %key, "key column not in flat file; class not loaded");
                return (report, failures);
            }
        }

        for record in records {
            let record = match record {
                Ok(r) => r,
                Err(e) => {
                    debug!(class = %class.label, error = %e, "malformed row");
                    report.malformed += 1;
                    continue;
                }
            };

            let props: PropertyMap = columns
                .iter()
                .filter_map(|(i, property)| {
                    record
                        .get(*i)
                        .filter(|v| !v.is_empty())
                        .map(|v| (property.to_string(), v.to_string()))
                })
                .collect();
            let keyless = key.is_some_and(|key| !props.contains_key(key));
            if props.is_empty() || keyless {
                report.skipped += 1;
                continue;
            }

            match self.store.write_node(&class.label, props).await {
                Ok(NodeWrite::Created) => report.created += 1,
                Ok(NodeWrite::Merged) => report.merged += 1,
                Err(e) => {
                    report.skipped += 1;
                    failures.push(ItemFailure::new(
                        format!("node {}", class.label),
                        FailureKind::Store,
                        e,
                    ));
                }
            }
        }

        if report.malformed > 0 {
            let failure = ItemFailure::new(
                item,
                FailureKind::MalformedRow,
                format!("{} rows of {} could not be parsed", report.malformed, class.csv_file),
            );
            warn!("{failure}");
            failures.push(failure);
        }

        report.state = ClassState::Loaded;
        info!(
            class = %class.label,
            created = report.created,
            merged = report.merged,
            skipped = report.skipped,
            malformed = report.malformed,
            file = %class.csv_file,
            "loaded nodes"
        );
        (report, failures)
    }

    async fn load_edges(
        &self,
        edge: &EdgeType,
        states: &HashMap<String, ClassState>,
    ) -> (EdgeTypeReport, Vec<ItemFailure>) {
        let mut report = EdgeTypeReport {
            relationship: edge.relationship.clone(),
            csv_file: edge.csv_file.clone(),
            ..EdgeTypeReport::default()
        };
        let mut failures = Vec::new();
        let item = format!("edge {}", edge.relationship);

        let endpoints = [&edge.from_node, &edge.to_node].map(|label| {
            let loaded = states.get(label.as_str()) == Some(&ClassState::Loaded);
            self.ontology
                .node(label)
                .filter(|_| loaded)
                .map(|class| Endpoint {
                    label: class.label.as_str(),
                    key: class.key_name(),
                })
        });
        let [Some(from), Some(to)] = endpoints else {
            let failure = ItemFailure::new(
                item,
                FailureKind::MissingResource,
                format!(
                    "endpoint classes {} -> {} are not loaded",
                    edge.from_node, edge.to_node
                ),
            );
            warn!("{failure}");
            failures.push(failure);
            return (report, failures);
        };

        let path = self.ontology.resolve(&edge.csv_file);
        let records = match read_flat_file(&path) {
            Ok((_, records)) => records,
            Err((kind, message)) => {
                let failure = ItemFailure::new(item, kind, message);
                warn!("{failure}");
                failures.push(failure);
                return (report, failures);
            }
        };

        for record in records {
            report.rows += 1;
            let (from_value, to_value) = match &record {
                Ok(r) => match (r.get(0), r.get(1)) {
                    (Some(a), Some(b)) if !a.is_empty() && !b.is_empty() => (a, b),
                    _ => {
                        report.skipped_empty += 1;
                        continue;
                    }
                },
                Err(e) => {
                    debug!(relationship = %edge.relationship, error = %e, "malformed row");
                    report.malformed += 1;
                    continue;
                }
            };

            match self
                .policy
                .resolve(self.store, &edge.relationship, from, to, from_value, to_value)
                .await
            {
                Ok(EdgeResolution::Resolved { via: KeyVia::Primary }) => report.primary += 1,
                Ok(EdgeResolution::Resolved { via: KeyVia::Secondary }) => report.secondary += 1,
                Ok(EdgeResolution::Unresolved) => report.unresolved += 1,
                Err(e) => {
                    report.unresolved += 1;
                    failures.push(ItemFailure::new(item.clone(), FailureKind::Store, e));
                }
            }
        }

        if report.unresolved > 0 {
            let failure = ItemFailure::new(
                item.clone(),
                FailureKind::MatchFailure,
                format!("{} of {} rows could not be resolved", report.unresolved, report.rows),
            );
            warn!("{failure}");
            failures.push(failure);
        }
        if report.malformed > 0 {
            let failure = ItemFailure::new(
                item,
                FailureKind::MalformedRow,
                format!("{} of {} rows could not be parsed", report.malformed, report.rows),
            );
            warn!("{failure}");
            failures.push(failure);
        }
        info!(
            relationship = %edge.relationship,
            primary = report.primary,
            secondary = report.secondary,
            unresolved = report.unresolved,
            malformed = report.malformed,
            file = %edge.csv_file,
            "loaded relationships"
        );
        (report, failures)
    }
}

type FlatFile = (Vec<String>, Vec<csv::Result<csv::StringRecord>>);

/// Read a flat file with a header row.
fn read_flat_file(path: &Path) -> Result<FlatFile, (FailureKind, String)> {
    if !path.exists() {
        return Err((
            FailureKind::MissingResource,
            format!("flat file not found: {}", path.display()),
        ));
    }
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| (FailureKind::MissingResource, e.to_string()))?;
    let headers = reader
        .headers()
        .map_err(|e| (FailureKind::MissingResource, e.to_string()))?
        .iter()
        .map(str::to_string)
        .collect();
    let records = reader.records().collect();
    Ok((headers, records))
}

/// Counts by label and relationship type.
pub async fn summarize<G: GraphStore + ?Sized>(store: &G) -> GraphResult<GraphSummary> {
    Ok(GraphSummary {
        nodes: store.node_count().await?,
        edges: store.edge_count().await?,
        labels: store.label_counts().await?,
        relationship_types: store.relationship_type_counts().await?,
    })
}
