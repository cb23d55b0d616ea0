//! Stage orchestration.
//!
//! ```text
//! extract:      catalog ─► introspect ─► fk_*.csv ─► infer ─► implicit_*.csv ─► schema_output.json
//! materialize:  ontology ─► constraints ─► nodes ─► edges ─► graph store
//! ```
//!
//! The ontology itself is produced between the two stages by an external
//! generator reading the schema extract.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::config::{Settings, SettingsError};
use crate::export::{CsvExporter, ExportError};
use crate::graph::{GraphError, GraphStore};
use crate::inference::{InferenceConfig, InferenceEngine, InferenceStats};
use crate::introspect::{IntrospectOptions, IntrospectionReport, SchemaExtract, SchemaIntrospector};
use crate::materialize::{MaterializeOptions, MaterializeReport, Materializer};
use crate::metadata::{CatalogError, CatalogProvider};
use crate::ontology::{Ontology, OntologyError};
use crate::report::ItemFailure;

/// Result type for pipeline stages.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Fatal stage errors. Per-item failures are reported, never raised.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Ontology(#[from] OntologyError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Whether the stage could not reach its catalog at all.
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, Self::Catalog(e) if e.is_connection_failure())
    }
}

/// Options for the extract stage.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Directory for flat files.
    pub output_dir: PathBuf,
    /// Where the schema extract is written.
    pub schema_file: PathBuf,
    pub introspect: IntrospectOptions,
    /// `None` skips inference.
    pub inference: Option<InferenceConfig>,
}

impl ExtractOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            output_dir: PathBuf::from(&settings.export.output_dir),
            schema_file: PathBuf::from(&settings.export.schema_file),
            introspect: settings.export.introspect_options(),
            inference: settings
                .inference
                .enabled
                .then(|| settings.inference.engine.clone()),
        }
    }
}

/// Outcome of the extract stage.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractReport {
    #[serde(skip)]
    pub extract: SchemaExtract,
    pub introspection: IntrospectionReport,
    pub inference: Option<InferenceStats>,
    /// Implicit relationships whose flat file could not be written.
    pub export_failures: Vec<ItemFailure>,
    pub schema_file: PathBuf,
}

impl ExtractReport {
    /// Every per-item failure from every step.
    pub fn failures(&self) -> impl Iterator<Item = &ItemFailure> {
        self.introspection.failures.iter().chain(&self.export_failures)
    }
}

/// Introspect, export, infer and write the schema extract.
pub async fn extract<P: CatalogProvider + ?Sized>(
    catalog: &P,
    options: &ExtractOptions,
) -> PipelineResult<ExtractReport> {
    let exporter = CsvExporter::new(&options.output_dir)?;

    let introspection = SchemaIntrospector::new(catalog, &exporter)
        .with_options(options.introspect)
        .run()
        .await?;
    let mut extract = introspection.extract;

    let mut inference = None;
    let mut export_failures = Vec::new();
    if let Some(config) = &options.inference {
        let engine = InferenceEngine::new(config.clone());
        let outcome = engine
            .infer(catalog, &extract.table_metadata(), &extract.foreign_keys)
            .await?;
        let mut relationships = outcome.relationships;
        export_failures = engine.export(catalog, &exporter, &mut relationships).await?;
        extract.implicit_relationships = relationships;
        inference = Some(outcome.stats);
    }

    extract.save(&options.schema_file)?;
    info!(
        tables = extract.tables.len(),
        foreign_keys = extract.foreign_keys.len(),
        implicit = extract.implicit_relationships.len(),
        path = %options.schema_file.display(),
        "schema extract written"
    );

    Ok(ExtractReport {
        extract,
        introspection: introspection.report,
        inference,
        export_failures,
        schema_file: options.schema_file.clone(),
    })
}

/// Load an ontology into a graph store.
pub async fn materialize<G: GraphStore + ?Sized>(
    store: &G,
    ontology: &Ontology,
    options: MaterializeOptions,
) -> PipelineResult<MaterializeReport> {
    info!(
        nodes = ontology.nodes.len(),
        edges = ontology.edges.len(),
        "materializing ontology"
    );
    Ok(Materializer::with_options(store, ontology, options).run().await?)
}
