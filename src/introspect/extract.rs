//! The Schema Extract document.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::export::ExportError;
use crate::inference::InferredRelationship;
use crate::metadata::{ColumnInfo, ForeignKeyInfo, PrimaryKeyInfo, TableMetadata};

/// One introspected table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableEntry {
    /// Columns in catalog ordinal order.
    pub columns: Vec<ColumnInfo>,
    /// Primary key in key-sequence order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<PrimaryKeyInfo>,
    /// A few rows for downstream documentation. Not part of any contract.
    #[serde(default)]
    pub sample_rows: Vec<serde_json::Map<String, serde_json::Value>>,
    /// Exported flat file, relative to the export directory.
    pub csv_file: String,
    /// SHA-256 of the exported flat file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csv_digest: Option<String>,
    /// Data rows exported.
    #[serde(default)]
    pub row_count: usize,
}

impl TableEntry {
    /// Rebuild catalog metadata from the recorded columns.
    ///
    /// Extracts without a recorded key fall back to the columns' `pk` flags,
    /// in ordinal order.
    pub fn metadata(&self, name: &str) -> TableMetadata {
        let primary_key = self.primary_key.clone().or_else(|| {
            let pk: Vec<String> = self
                .columns
                .iter()
                .filter(|c| c.pk)
                .map(|c| c.name.clone())
                .collect();
            (!pk.is_empty()).then_some(PrimaryKeyInfo { columns: pk })
        });
        TableMetadata {
            name: name.to_string(),
            columns: self.columns.clone(),
            primary_key,
        }
    }
}

/// Aggregate output of introspection and inference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaExtract {
    /// Tables keyed by name.
    pub tables: BTreeMap<String, TableEntry>,
    /// Declared foreign keys.
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKeyInfo>,
    /// Relationships inferred from value overlap.
    #[serde(default)]
    pub implicit_relationships: Vec<InferredRelationship>,
}

impl SchemaExtract {
    /// Metadata for every table, in name order.
    pub fn table_metadata(&self) -> Vec<TableMetadata> {
        self.tables
            .iter()
            .map(|(name, entry)| entry.metadata(name))
            .collect()
    }

    /// Serialize as pretty JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Write the extract to a file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ExportError> {
        let path = path.as_ref();
        let json = self.to_json().map_err(|e| ExportError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::other(e),
        })?;
        fs::write(path, json).map_err(|source| ExportError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read an extract written by [`SchemaExtract::save`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ExportError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ExportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|e| ExportError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })
    }
}
