//! Directional value-overlap scoring.
//!
//! The ratio is `|source ∩ target| / |source|`: how much of the source's
//! value space resolves into the target. It is not normalized by the target's
//! cardinality, so a tiny source against a huge target can score 1.0.

use std::collections::HashSet;

use serde::Serialize;

/// Overlap between a source and a target value set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OverlapScore {
    /// Distinct source values found in the target.
    pub match_count: usize,
    /// Distinct source values.
    pub source_count: usize,
    /// `match_count / source_count`.
    pub ratio: f64,
}

impl OverlapScore {
    /// Score a pair of value sets. Returns `None` when there is too little
    /// signal: fewer than two source values or no target values.
    pub fn compute(source: &HashSet<String>, target: &HashSet<String>) -> Option<Self> {
        if source.len() < 2 || target.is_empty() {
            return None;
        }
        let match_count = source.iter().filter(|v| target.contains(*v)).count();
        Some(Self {
            match_count,
            source_count: source.len(),
            ratio: match_count as f64 / source.len() as f64,
        })
    }

    /// Ratio as a percentage rounded to two decimals.
    pub fn percentage(&self) -> f64 {
        (self.ratio * 10_000.0).round() / 100.0
    }

    /// Whether the overlap is strong enough to accept.
    pub fn accepts(&self, threshold: f64, min_match_count: usize) -> bool {
        self.ratio >= threshold && self.match_count >= min_match_count
    }
}
