//! Per-item failure reporting shared by every stage.
//!
//! No stage aborts on a single table, relationship, or row. Failures are
//! collected here and surfaced in aggregate once the stage finishes.

use serde::{Deserialize, Serialize};

/// Classification of a non-fatal failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A referenced table, flat file, or node class is absent.
    MissingResource,
    /// An edge row whose endpoints could not be resolved by any key.
    MatchFailure,
    /// Flat-file rows that could not be parsed.
    MalformedRow,
    /// The catalog rejected a per-table or per-column query.
    Catalog,
    /// A flat file could not be written.
    Export,
    /// The graph store rejected a write.
    Store,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::MissingResource => "missing resource",
            Self::MatchFailure => "match failure",
            Self::MalformedRow => "malformed row",
            Self::Catalog => "catalog",
            Self::Export => "export",
            Self::Store => "store",
        };
        f.write_str(s)
    }
}

/// One item that was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
    /// What failed (`table orders`, `edge PLACED`, ...).
    pub item: String,
    pub kind: FailureKind,
    pub message: String,
}

impl ItemFailure {
    pub fn new(item: impl Into<String>, kind: FailureKind, message: impl ToString) -> Self {
        Self {
            item: item.into(),
            kind,
            message: message.to_string(),
        }
    }
}

impl std::fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.item, self.kind, self.message)
    }
}
