//! Column denylists.
//!
//! Identifies columns that are never considered as either end of an implicit
//! relationship: audit timestamps and columns whose names suggest business
//! values rather than references.

use std::collections::BTreeSet;

use super::InferenceConfig;

/// Why a column was excluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExclusionReason {
    /// Exact match against the audit-column list.
    AuditColumn,
    /// Name contains a value-like pattern (`price`, `status`, ...).
    ValuePattern(String),
}

impl std::fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AuditColumn => write!(f, "audit column"),
            Self::ValuePattern(p) => write!(f, "value pattern '{p}'"),
        }
    }
}

/// Matches column names against the configured denylists.
#[derive(Debug, Clone)]
pub struct ColumnFilter {
    /// Exact names (lowercase).
    excluded_columns: BTreeSet<String>,
    /// Substrings (lowercase).
    excluded_patterns: Vec<String>,
}

impl ColumnFilter {
    pub fn from_config(config: &InferenceConfig) -> Self {
        Self {
            excluded_columns: config
                .excluded_columns
                .iter()
                .map(|c| c.to_lowercase())
                .collect(),
            excluded_patterns: config
                .excluded_patterns
                .iter()
                .map(|p| p.to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// Check a column name; `None` means the column may be used.
    pub fn exclusion(&self, column: &str) -> Option<ExclusionReason> {
        let lower = column.to_lowercase();
        if self.excluded_columns.contains(&lower) {
            return Some(ExclusionReason::AuditColumn);
        }
        self.excluded_patterns
            .iter()
            .find(|p| lower.contains(p.as_str()))
            .map(|p| ExclusionReason::ValuePattern(p.clone()))
    }

    pub fn is_excluded(&self, column: &str) -> bool {
        self.exclusion(column).is_some()
    }
}
