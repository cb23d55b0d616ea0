//! Schema introspection.
//!
//! Turns a relational catalog into the [`SchemaExtract`] document and one flat
//! file per table and declared foreign key.
//!
//! ```text
//! CatalogProvider ──► SchemaIntrospector ──► SchemaExtract { tables, foreign_keys }
//!                            │
//!                            └──► CsvExporter ──► <table>.csv, fk_*.csv
//! ```
//!
//! Failures scoped to one table are collected in [`IntrospectionReport`] and
//! that table is left out of the extract; only a lost connection stops the run.

mod extract;
mod introspector;

pub use extract::{SchemaExtract, TableEntry};
pub use introspector::{Introspection, IntrospectOptions, IntrospectionReport, SchemaIntrospector};
