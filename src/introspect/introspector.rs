//! Per-table introspection and flat-file export.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::extract::{SchemaExtract, TableEntry};
use crate::export::{export_relationship, CsvExporter, ExportError, RelationshipKind};
use crate::metadata::{CatalogError, CatalogProvider, CatalogResult, ColumnPair, RowSet};
use crate::report::{FailureKind, ItemFailure};

/// Introspection tuning.
#[derive(Debug, Clone, Copy)]
pub struct IntrospectOptions {
    /// Random rows kept per table in the extract.
    pub sample_rows: usize,
    /// Tables processed concurrently.
    pub workers: usize,
}

impl Default for IntrospectOptions {
    fn default() -> Self {
        Self {
            sample_rows: 2,
            workers: 4,
        }
    }
}

/// Aggregate outcome of an introspection run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IntrospectionReport {
    pub tables_exported: usize,
    pub foreign_keys_exported: usize,
    pub failures: Vec<ItemFailure>,
}

impl IntrospectionReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Result of [`SchemaIntrospector::run`].
#[derive(Debug, Clone)]
pub struct Introspection {
    /// Tables and declared foreign keys. `implicit_relationships` is empty.
    pub extract: SchemaExtract,
    pub report: IntrospectionReport,
}

/// Reads a catalog into a [`SchemaExtract`], exporting every table and
/// declared foreign key as it goes.
pub struct SchemaIntrospector<'a, P: ?Sized> {
    catalog: &'a P,
    exporter: &'a CsvExporter,
    options: IntrospectOptions,
}

impl<'a, P: CatalogProvider + ?Sized> SchemaIntrospector<'a, P> {
    pub fn new(catalog: &'a P, exporter: &'a CsvExporter) -> Self {
        Self {
            catalog,
            exporter,
            options: IntrospectOptions::default(),
        }
    }

    pub fn with_options(mut self, options: IntrospectOptions) -> Self {
        self.options = options;
        self
    }

    /// Introspect every table, then export declared foreign keys.
    ///
    /// Only a connection failure is returned as an error. Anything scoped to
    /// one table or one foreign key lands in the report instead.
    pub async fn run(&self) -> CatalogResult<Introspection> {
        let names = self.catalog.list_tables().await?;
        info!(tables = names.len(), "introspecting catalog");

        // Reserve file names in catalog order so colliding names resolve the
        // same way on every run, whatever order the writes finish in.
        for name in &names {
            self.exporter.claim_table(name);
        }

        let results: Vec<(String, Result<TableEntry, ExportError>)> = stream::iter(names)
            .map(|name| async move {
                let result = self.table(&name).await;
                (name, result)
            })
            .buffer_unordered(self.options.workers.max(1))
            .collect()
            .await;

        let mut extract = SchemaExtract::default();
        let mut report = IntrospectionReport::default();

        for (name, result) in results {
            match result {
                Ok(entry) => {
                    debug!(table = %name, rows = entry.row_count, "exported table");
                    extract.tables.insert(name, entry);
                }
                Err(ExportError::Catalog(e)) if e.is_connection_failure() => return Err(e),
                Err(e) => {
                    warn!(table = %name, error = %e, "skipping table");
                    report
                        .failures
                        .push(ItemFailure::new(format!("table {name}"), failure_kind(&e), &e));
                }
            }
        }
        report.failures.sort_by(|a, b| a.item.cmp(&b.item));
        report.tables_exported = extract.tables.len();

        extract.foreign_keys = self.catalog.get_foreign_keys().await?;
        info!(count = extract.foreign_keys.len(), "found declared foreign keys");
        for fk in &extract.foreign_keys {
            self.exporter
                .claim_relationship(RelationshipKind::ForeignKey, &ColumnPair::from(fk));
        }

        let exports: Vec<(usize, Result<String, ExportError>)> =
            stream::iter(extract.foreign_keys.iter().enumerate())
                .map(|(i, fk)| async move {
                    let pair = ColumnPair::from(fk);
                    let result =
                        export_relationship(self.catalog, self.exporter, RelationshipKind::ForeignKey, &pair)
                            .await
                            .map(|file| file.file_name);
                    (i, result)
                })
                .buffer_unordered(self.options.workers.max(1))
                .collect()
                .await;

        for (i, result) in exports {
            let fk = &mut extract.foreign_keys[i];
            match result {
                Ok(file_name) => {
                    fk.csv_file = Some(file_name);
                    report.foreign_keys_exported += 1;
                }
                Err(ExportError::Catalog(e)) if e.is_connection_failure() => return Err(e),
                Err(e) => {
                    warn!(constraint = %fk.constraint_name, error = %e, "foreign key export failed");
                    report.failures.push(ItemFailure::new(
                        format!("foreign key {}", fk.constraint_name),
                        failure_kind(&e),
                        &e,
                    ));
                }
            }
        }

        info!(
            tables = report.tables_exported,
            foreign_keys = report.foreign_keys_exported,
            failures = report.failures.len(),
            "introspection complete"
        );
        Ok(Introspection { extract, report })
    }

    async fn table(&self, name: &str) -> Result<TableEntry, ExportError> {
        let meta = self.catalog.get_table(name).await?;

        let sample_rows = match self.catalog.sample_rows(name, self.options.sample_rows).await {
            Ok(rows) => sample_objects(&rows),
            Err(e) if e.is_connection_failure() => return Err(e.into()),
            Err(e) => {
                warn!(table = %name, error = %e, "could not sample rows");
                Vec::new()
            }
        };

        let rows = self.catalog.scan_rows(name).await?;
        let file = self.exporter.write_table(name, &rows)?;

        Ok(TableEntry {
            columns: meta.columns,
            primary_key: meta.primary_key,
            sample_rows,
            csv_file: file.file_name,
            csv_digest: Some(file.digest),
            row_count: file.rows,
        })
    }
}

fn failure_kind(err: &ExportError) -> FailureKind {
    match err {
        ExportError::Catalog(CatalogError::UnknownIdentifier(_)) => FailureKind::MissingResource,
        ExportError::Catalog(_) => FailureKind::Catalog,
        ExportError::Io { .. } | ExportError::Csv(_) => FailureKind::Export,
    }
}

fn sample_objects(rows: &RowSet) -> Vec<serde_json::Map<String, serde_json::Value>> {
    rows.rows
        .iter()
        .map(|row| {
            rows.columns
                .iter()
                .cloned()
                .zip(row.iter().map(|v| v.to_json()))
                .collect()
        })
        .collect()
}
