//! Metadata types for the catalog provider abstraction.
//!
//! These are the canonical, database-independent representations of catalog
//! metadata. `ColumnInfo` and `ForeignKeyInfo` serialize directly into the
//! schema extract document.

use serde::{Deserialize, Serialize};

use super::value::TypeHint;

/// Information about a table column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,
    /// Declared type, lowercased.
    #[serde(rename = "type")]
    pub data_type: String,
    /// Whether NULL values are allowed.
    pub nullable: bool,
    /// Whether this column is (part of) the primary key.
    pub pk: bool,
    /// Maximum length for sized string types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    /// Default value expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl ColumnInfo {
    /// Type hint used when normalizing this column's values.
    pub fn type_hint(&self) -> TypeHint {
        TypeHint::from_declared(&self.data_type)
    }
}

/// Primary key information. May span several columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryKeyInfo {
    /// Columns in the primary key, in key order.
    pub columns: Vec<String>,
}

impl PrimaryKeyInfo {
    /// Whether the key spans more than one column.
    pub fn is_composite(&self) -> bool {
        self.columns.len() > 1
    }
}

/// A declared foreign key: one source column referencing one target column.
///
/// Composite foreign keys are reported as one `ForeignKeyInfo` per column pair
/// sharing the same constraint name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyInfo {
    pub from_table: String,
    pub from_column: String,
    pub to_table: String,
    pub to_column: String,
    /// Constraint identifier.
    pub constraint_name: String,
    /// Exported correspondence file, relative to the export directory.
    #[serde(default)]
    pub csv_file: Option<String>,
}

/// Complete metadata for a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMetadata {
    /// Table name.
    pub name: String,
    /// Columns in catalog ordinal order.
    pub columns: Vec<ColumnInfo>,
    /// Primary key (if any).
    pub primary_key: Option<PrimaryKeyInfo>,
}

impl TableMetadata {
    /// Find a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Column names in ordinal order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Whether `column` is the table's only primary-key column.
    pub fn is_sole_primary_key(&self, column: &str) -> bool {
        match &self.primary_key {
            Some(pk) => pk.columns.len() == 1 && pk.columns[0] == column,
            None => false,
        }
    }
}
