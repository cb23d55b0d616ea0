//! CatalogProvider trait definition.
//!
//! The CatalogProvider trait abstracts over relational catalogs. All
//! operations are read-only: catalog metadata queries and `SELECT`s over user
//! tables. Identifiers passed in must name tables/columns the provider itself
//! reported; implementations reject anything else.

use std::collections::HashSet;

use async_trait::async_trait;

use super::error::CatalogResult;
use super::types::{ForeignKeyInfo, TableMetadata};
use super::value::CellValue;

/// A fully materialized result set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    /// Column names in result order.
    pub columns: Vec<String>,
    /// Row values, one entry per column.
    pub rows: Vec<Vec<CellValue>>,
}

impl RowSet {
    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether there are no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Endpoints of a relationship whose correspondence rows are requested.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnPair {
    pub from_table: String,
    pub from_column: String,
    pub to_table: String,
    pub to_column: String,
}

impl ColumnPair {
    pub fn new(
        from_table: impl Into<String>,
        from_column: impl Into<String>,
        to_table: impl Into<String>,
        to_column: impl Into<String>,
    ) -> Self {
        Self {
            from_table: from_table.into(),
            from_column: from_column.into(),
            to_table: to_table.into(),
            to_column: to_column.into(),
        }
    }

    /// Header row for the relationship flat file.
    pub fn header(&self) -> [String; 2] {
        [
            format!("{}.{}", self.from_table, self.from_column),
            format!("{}.{}", self.to_table, self.to_column),
        ]
    }
}

impl From<&ForeignKeyInfo> for ColumnPair {
    fn from(fk: &ForeignKeyInfo) -> Self {
        Self::new(&fk.from_table, &fk.from_column, &fk.to_table, &fk.to_column)
    }
}

/// Trait for reading a relational catalog.
///
/// # Example
///
/// ```ignore
/// use graphlift::metadata::{CatalogProvider, SqliteCatalog};
///
/// let catalog = SqliteCatalog::open("./shop.db").await?;
/// for table in catalog.list_tables().await? {
///     let meta = catalog.get_table(&table).await?;
///     println!("{} has {} columns", meta.name, meta.columns.len());
/// }
/// ```
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// List user tables, ordered by name.
    async fn list_tables(&self) -> CatalogResult<Vec<String>>;

    /// Get columns and primary key for a table.
    async fn get_table(&self, table: &str) -> CatalogResult<TableMetadata>;

    /// Get every declared foreign key, ordered by (from_table, from_column).
    async fn get_foreign_keys(&self) -> CatalogResult<Vec<ForeignKeyInfo>>;

    /// Up to `limit` randomly chosen rows.
    async fn sample_rows(&self, table: &str, limit: usize) -> CatalogResult<RowSet>;

    /// Every row of a table, columns in ordinal order.
    async fn scan_rows(&self, table: &str) -> CatalogResult<RowSet>;

    /// Distinct non-null values of a column, rendered as flat-file fields,
    /// bounded to `cap` values.
    async fn distinct_values(
        &self,
        table: &str,
        column: &str,
        cap: usize,
    ) -> CatalogResult<HashSet<String>>;

    /// Source/target value pairs for a relationship: every non-null source
    /// value joined onto the target column, ordered by source value. An
    /// unmatched source value pairs with `CellValue::Null`.
    async fn correspondence_rows(&self, pair: &ColumnPair) -> CatalogResult<RowSet>;
}
