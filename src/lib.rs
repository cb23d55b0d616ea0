//! # graphlift
//!
//! Migrates a relational dataset into a labeled property graph.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │           Relational catalog (CatalogProvider)          │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [introspect]
//! ┌─────────────────────────────────────────────────────────┐
//! │     SchemaExtract (tables, foreign keys) + flat files    │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [inference]
//! ┌─────────────────────────────────────────────────────────┐
//! │   + implicit relationships (value overlap) + flat files  │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [external ontology generator]
//! ┌─────────────────────────────────────────────────────────┐
//! │        Ontology (node classes, edge types, keys)         │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [materialize]
//! ┌─────────────────────────────────────────────────────────┐
//! │                GraphStore (MemoryGraph)                  │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod export;
pub mod graph;
pub mod inference;
pub mod introspect;
pub mod materialize;
pub mod metadata;
pub mod ontology;
pub mod pipeline;
pub mod report;
