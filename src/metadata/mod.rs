//! Catalog metadata module.
//!
//! This module provides abstractions for reading a relational catalog:
//! tables, columns, primary keys, declared foreign keys, and the row data
//! needed for flat-file export and value-overlap analysis.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      CatalogProvider                            │
//! │  ┌───────────────────────────────────────────────────────────┐  │
//! │  │  Catalog metadata          │  Row data                    │  │
//! │  │  - list_tables()           │  - sample_rows()             │  │
//! │  │  - get_table()             │  - scan_rows()               │  │
//! │  │  - get_foreign_keys()      │  - distinct_values()         │  │
//! │  │                            │  - correspondence_rows()     │  │
//! │  └───────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      SqliteCatalog                              │
//! │          (rusqlite, read-only, blocking pool)                   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use graphlift::metadata::{CatalogProvider, SqliteCatalog};
//!
//! let catalog = SqliteCatalog::open("./shop.db").await?;
//! let tables = catalog.list_tables().await?;
//! let orders = catalog.get_table("orders").await?;
//! let fks = catalog.get_foreign_keys().await?;
//! ```

mod error;
mod provider;
mod sqlite_provider;
mod types;
mod value;

pub use error::{CatalogError, CatalogResult};
pub use provider::{CatalogProvider, ColumnPair, RowSet};
pub use sqlite_provider::{quote_ident, SqliteCatalog};
pub use types::*;
pub use value::{format_float, CellValue, TypeHint};
