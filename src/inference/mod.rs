//! Implicit relationship inference.
//!
//! Finds column pairs that behave like foreign keys without being declared as
//! such, by measuring how much of one column's value set appears in another.
//!
//! # Architecture
//!
//! The engine works in three phases:
//!
//! 1. **Candidate enumeration** - for every ordered pair of distinct tables,
//!    pair up type-compatible columns that are not covered by a declared
//!    foreign key, not denylisted, and carry at least one naming/key signal
//! 2. **Value fetch** - distinct values are read once per column, concurrently
//! 3. **Overlap scoring** - accept a candidate when the directional overlap
//!    ratio and match count clear the configured thresholds
//!
//! ```text
//! tables + foreign keys ─► candidates ─► distinct values ─► OverlapScore ─► InferredRelationship
//! ```
//!
//! # Example
//!
//! ```ignore
//! use graphlift::inference::{InferenceConfig, InferenceEngine};
//!
//! let engine = InferenceEngine::new(InferenceConfig::default());
//! let outcome = engine.infer(&catalog, &tables, &foreign_keys).await?;
//! for rel in &outcome.relationships {
//!     println!("{} ({}%)", rel.likely_direction, rel.overlap_percentage);
//! }
//! ```

mod engine;
mod exclusion;
mod naming;
mod overlap;

pub use engine::{Candidate, InferenceEngine, InferenceOutcome, InferenceStats};
pub use exclusion::{ColumnFilter, ExclusionReason};
pub use naming::{likely_signal, strip_identifier_suffix, LikelySignal};
pub use overlap::OverlapScore;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::metadata::ColumnPair;

/// Default thresholds and denylists.
pub mod defaults {
    /// Minimum overlap ratio for acceptance.
    pub const OVERLAP_THRESHOLD: f64 = 0.8;
    /// Minimum matched distinct values.
    pub const MIN_MATCH_COUNT: usize = 2;
    /// Distinct values fetched per column.
    pub const SAMPLE_CAP: usize = 1000;
    /// Concurrent value fetches.
    pub const WORKERS: usize = 4;

    pub const EXCLUDED_COLUMNS: &[&str] = &[
        "created_at",
        "updated_at",
        "deleted_at",
        "modified_at",
        "timestamp",
        "date",
        "time",
    ];

    pub const EXCLUDED_PATTERNS: &[&str] = &[
        "price",
        "amount",
        "total",
        "quantity",
        "count",
        "status",
        "name",
        "description",
        "email",
        "phone",
    ];

    pub const IDENTIFIER_SUFFIXES: &[&str] = &["_id", "_sku"];
}

/// Inference tuning, read from the `[inference]` settings section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Exact column names never considered (case-insensitive).
    pub excluded_columns: BTreeSet<String>,
    /// Substrings that exclude a column (case-insensitive).
    pub excluded_patterns: Vec<String>,
    /// Suffixes marking identifier-style column names.
    pub identifier_suffixes: Vec<String>,
    pub overlap_threshold: f64,
    pub min_match_count: usize,
    /// Distinct values fetched per column.
    pub sample_cap: usize,
    /// Concurrent value fetches.
    pub workers: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            excluded_columns: defaults::EXCLUDED_COLUMNS.iter().map(|s| s.to_string()).collect(),
            excluded_patterns: defaults::EXCLUDED_PATTERNS.iter().map(|s| s.to_string()).collect(),
            identifier_suffixes: defaults::IDENTIFIER_SUFFIXES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            overlap_threshold: defaults::OVERLAP_THRESHOLD,
            min_match_count: defaults::MIN_MATCH_COUNT,
            sample_cap: defaults::SAMPLE_CAP,
            workers: defaults::WORKERS,
        }
    }
}

/// A relationship inferred from value overlap. Always directional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferredRelationship {
    pub from_table: String,
    pub from_column: String,
    pub to_table: String,
    pub to_column: String,
    /// Overlap ratio as a percentage, two decimals.
    pub overlap_percentage: f64,
    /// Distinct source values found in the target.
    pub match_count: usize,
    /// Human-readable `from.col -> to.col`.
    pub likely_direction: String,
    /// Always `"implicit"`.
    #[serde(rename = "type", default = "implicit_kind")]
    pub kind: String,
    /// Exported correspondence file, relative to the export directory.
    #[serde(default)]
    pub csv_file: Option<String>,
}

fn implicit_kind() -> String {
    "implicit".to_string()
}

impl InferredRelationship {
    pub fn new(pair: &ColumnPair, score: &OverlapScore) -> Self {
        Self {
            from_table: pair.from_table.clone(),
            from_column: pair.from_column.clone(),
            to_table: pair.to_table.clone(),
            to_column: pair.to_column.clone(),
            overlap_percentage: score.percentage(),
            match_count: score.match_count,
            likely_direction: format!(
                "{}.{} -> {}.{}",
                pair.from_table, pair.from_column, pair.to_table, pair.to_column
            ),
            kind: implicit_kind(),
            csv_file: None,
        }
    }

    pub fn pair(&self) -> ColumnPair {
        ColumnPair::new(&self.from_table, &self.from_column, &self.to_table, &self.to_column)
    }

    pub fn key(&self) -> RelationshipKey {
        RelationshipKey::new(&self.from_table, &self.from_column, &self.to_table, &self.to_column)
    }
}

/// A relationship identified by its endpoints.
///
/// Names are lowercased so lookups are case-insensitive.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct RelationshipKey {
    pub from_table: String,
    pub from_column: String,
    pub to_table: String,
    pub to_column: String,
}

impl RelationshipKey {
    #[must_use]
    pub fn new(from_table: &str, from_column: &str, to_table: &str, to_column: &str) -> Self {
        Self {
            from_table: from_table.to_lowercase(),
            from_column: from_column.to_lowercase(),
            to_table: to_table.to_lowercase(),
            to_column: to_column.to_lowercase(),
        }
    }

    /// The same endpoints, opposite direction.
    #[must_use]
    pub fn reversed(&self) -> Self {
        Self {
            from_table: self.to_table.clone(),
            from_column: self.to_column.clone(),
            to_table: self.from_table.clone(),
            to_column: self.from_column.clone(),
        }
    }
}

impl From<&ColumnPair> for RelationshipKey {
    fn from(pair: &ColumnPair) -> Self {
        Self::new(&pair.from_table, &pair.from_column, &pair.to_table, &pair.to_column)
    }
}
