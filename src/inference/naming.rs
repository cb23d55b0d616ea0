//! Likely-relationship signals.
//!
//! A type-compatible column pair is only worth sampling when something about
//! the names or keys suggests a reference. The first signal that holds is
//! recorded on the candidate.

use serde::Serialize;

/// Evidence that a source column might reference a target column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LikelySignal {
    /// The target column is a primary-key column.
    TargetPrimaryKey,
    /// The source column name ends with an identifier suffix (`_id`, `_sku`).
    IdentifierSuffix,
    /// Source and target columns share a name.
    SameName,
    /// The source column name, suffix stripped, names the target table.
    TableNameMatch,
}

/// Source column name with the first matching identifier suffix removed.
pub fn strip_identifier_suffix<'a>(column: &'a str, suffixes: &[String]) -> &'a str {
    suffixes
        .iter()
        .find_map(|s| column.strip_suffix(s.as_str()))
        .unwrap_or(column)
}

/// Check the likely-relationship signals in order.
pub fn likely_signal(
    source_column: &str,
    target_table: &str,
    target_column: &str,
    target_is_pk: bool,
    suffixes: &[String],
) -> Option<LikelySignal> {
    if target_is_pk {
        return Some(LikelySignal::TargetPrimaryKey);
    }

    let source = source_column.to_lowercase();
    if suffixes.iter().any(|s| source.ends_with(s.as_str())) {
        return Some(LikelySignal::IdentifierSuffix);
    }
    if source == target_column.to_lowercase() {
        return Some(LikelySignal::SameName);
    }

    let stem = strip_identifier_suffix(&source, suffixes);
    let table = target_table.to_lowercase();
    if !stem.is_empty() && table.contains(stem) {
        return Some(LikelySignal::TableNameMatch);
    }
    None
}
