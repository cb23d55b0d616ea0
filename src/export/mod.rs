//! CSV flat-file export.
//!
//! Two kinds of files are written into a single export directory:
//!
//! - **Table files** (`<table>.csv`): header row of column names in catalog
//!   order, then every row with values normalized by [`CellValue::to_field`].
//! - **Relationship files** (`<kind>_<from_table>_<from_column>_to_<to_table>_<to_column>.csv`):
//!   header `<from_table>.<from_column>,<to_table>.<to_column>`, one row per
//!   correspondence.
//!
//! Files are rendered in memory first so their digest is known before they
//! hit the disk; an unchanged source therefore produces an unchanged digest.
//!
//! Sanitizing identifiers can map two tables (`"order items"`, `order_items`)
//! or two relationships onto one name. Each exporter hands out every name at
//! most once, compared case-insensitively; later claimants get a numeric
//! suffix (`order_items_2.csv`). Names are stable for the exporter's lifetime,
//! and claiming in a fixed order yields the same names on every run.

mod digest;

pub use digest::{digest_bytes, file_digest};

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::metadata::{CatalogError, CatalogProvider, CellValue, ColumnPair, RowSet};

/// Result type for export operations.
pub type ExportResult<T> = Result<T, ExportError>;

/// Errors that can occur while writing flat files.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("IO error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Origin of a relationship correspondence file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    /// Declared foreign key.
    ForeignKey,
    /// Inferred from value overlap.
    Implicit,
}

impl RelationshipKind {
    /// File-name prefix.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::ForeignKey => "fk",
            Self::Implicit => "implicit",
        }
    }
}

impl std::fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.prefix())
    }
}

/// A file written by the exporter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFile {
    /// File name relative to the export directory.
    pub file_name: String,
    /// Data rows written (header excluded).
    pub rows: usize,
    /// SHA-256 of the file contents.
    pub digest: String,
}

/// What a flat file holds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum FileOwner {
    Table(String),
    Relationship(RelationshipKind, ColumnPair),
}

/// File names handed out so far.
#[derive(Debug, Default)]
struct NameRegistry {
    by_owner: HashMap<FileOwner, String>,
    /// Lowercased names already in use.
    taken: HashSet<String>,
}

impl NameRegistry {
    fn claim(&mut self, owner: FileOwner, stem: &str) -> String {
        if let Some(name) = self.by_owner.get(&owner) {
            return name.clone();
        }
        let mut name = format!("{stem}.csv");
        let mut n = 2;
        while self.taken.contains(&name.to_lowercase()) {
            name = format!("{stem}_{n}.csv");
            n += 1;
        }
        self.taken.insert(name.to_lowercase());
        self.by_owner.insert(owner, name.clone());
        name
    }
}

/// Writes table and relationship flat files into one directory.
///
/// Clones share the directory and the set of claimed names.
#[derive(Debug, Clone)]
pub struct CsvExporter {
    dir: PathBuf,
    names: Arc<Mutex<NameRegistry>>,
}

impl CsvExporter {
    /// Create an exporter, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> ExportResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| ExportError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self {
            dir,
            names: Arc::default(),
        })
    }

    /// The export directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Absolute location of an exported file.
    pub fn resolve(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    /// Preferred file name for a table export, before collisions are resolved.
    pub fn table_file_name(table: &str) -> String {
        format!("{}.csv", table_stem(table))
    }

    /// Preferred file name for a relationship export, before collisions are
    /// resolved.
    pub fn relationship_file_name(kind: RelationshipKind, pair: &ColumnPair) -> String {
        format!("{}.csv", relationship_stem(kind, pair))
    }

    /// Reserve the file name for a table. Repeated claims return the same name.
    pub fn claim_table(&self, table: &str) -> String {
        self.names
            .lock()
            .claim(FileOwner::Table(table.to_string()), &table_stem(table))
    }

    /// Reserve the file name for a relationship. Repeated claims return the
    /// same name.
    pub fn claim_relationship(&self, kind: RelationshipKind, pair: &ColumnPair) -> String {
        self.names.lock().claim(
            FileOwner::Relationship(kind, pair.clone()),
            &relationship_stem(kind, pair),
        )
    }

    /// Write a full table export.
    pub fn write_table(&self, table: &str, rows: &RowSet) -> ExportResult<ExportedFile> {
        let file_name = self.claim_table(table);
        self.write(&file_name, &rows.columns, &rows.rows)
    }

    /// Write a relationship correspondence file.
    pub fn write_relationship(
        &self,
        kind: RelationshipKind,
        pair: &ColumnPair,
        rows: &RowSet,
    ) -> ExportResult<ExportedFile> {
        let header = pair.header();
        let file_name = self.claim_relationship(kind, pair);
        self.write(&file_name, &header, &rows.rows)
    }

    fn write(
        &self,
        file_name: &str,
        header: &[String],
        rows: &[Vec<CellValue>],
    ) -> ExportResult<ExportedFile> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(header)?;
        for row in rows {
            writer.write_record(row.iter().map(CellValue::to_field))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| ExportError::Io {
                path: self.resolve(file_name),
                source: std::io::Error::other(e.to_string()),
            })?;

        let path = self.resolve(file_name);
        fs::write(&path, &bytes).map_err(|source| ExportError::Io { path, source })?;

        Ok(ExportedFile {
            file_name: file_name.to_string(),
            rows: rows.len(),
            digest: digest_bytes(&bytes),
        })
    }
}

/// Fetch a relationship's correspondence rows and write them out.
pub async fn export_relationship<P: CatalogProvider + ?Sized>(
    catalog: &P,
    exporter: &CsvExporter,
    kind: RelationshipKind,
    pair: &ColumnPair,
) -> ExportResult<ExportedFile> {
    let rows = catalog.correspondence_rows(pair).await?;
    exporter.write_relationship(kind, pair, &rows)
}

fn table_stem(table: &str) -> String {
    sanitize(table)
}

fn relationship_stem(kind: RelationshipKind, pair: &ColumnPair) -> String {
    format!(
        "{}_{}_{}_to_{}_{}",
        kind.prefix(),
        sanitize(&pair.from_table),
        sanitize(&pair.from_column),
        sanitize(&pair.to_table),
        sanitize(&pair.to_column),
    )
}

/// Replace characters that are unsafe in file names.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
