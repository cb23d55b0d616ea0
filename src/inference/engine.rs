//! Relationship inference engine.

use std::collections::{HashMap, HashSet};

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{
    exclusion::ColumnFilter,
    naming::{likely_signal, LikelySignal},
    overlap::OverlapScore,
    InferenceConfig, InferredRelationship,
};
use crate::export::{export_relationship, CsvExporter, ExportError, RelationshipKind};
use crate::metadata::{CatalogProvider, CatalogResult, ColumnPair, ForeignKeyInfo, TableMetadata};
use crate::report::{FailureKind, ItemFailure};

/// A column pair that passed every static filter and awaits scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub pair: ColumnPair,
    pub signal: LikelySignal,
}

/// Counters for one inference run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InferenceStats {
    /// Candidates that reached scoring.
    pub candidates: usize,
    /// Distinct columns whose values were fetched.
    pub columns_sampled: usize,
    /// Columns whose value fetch failed.
    pub fetch_failures: usize,
    /// Candidates skipped for lack of signal or low overlap.
    pub rejected: usize,
    pub accepted: usize,
}

/// Result of [`InferenceEngine::infer`].
#[derive(Debug, Clone, Default)]
pub struct InferenceOutcome {
    /// Accepted relationships in enumeration order.
    pub relationships: Vec<InferredRelationship>,
    pub stats: InferenceStats,
}

type ColumnRef = (String, String);

/// Value-overlap inference engine.
#[derive(Debug, Clone)]
pub struct InferenceEngine {
    config: InferenceConfig,
    filter: ColumnFilter,
}

impl Default for InferenceEngine {
    fn default() -> Self {
        Self::new(InferenceConfig::default())
    }
}

impl InferenceEngine {
    pub fn new(config: InferenceConfig) -> Self {
        let filter = ColumnFilter::from_config(&config);
        Self { config, filter }
    }

    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    /// Enumerate candidates without touching any data.
    ///
    /// Tables are visited in name order and columns in ordinal order; for each
    /// unordered table pair both orientations are produced independently.
    pub fn candidates(
        &self,
        tables: &[TableMetadata],
        foreign_keys: &[ForeignKeyInfo],
    ) -> Vec<Candidate> {
        let covered: HashSet<ColumnRef> = foreign_keys
            .iter()
            .flat_map(|fk| {
                [
                    (fk.from_table.clone(), fk.from_column.clone()),
                    (fk.to_table.clone(), fk.to_column.clone()),
                ]
            })
            .collect();

        let mut ordered: Vec<&TableMetadata> = tables.iter().collect();
        ordered.sort_by(|a, b| a.name.cmp(&b.name));

        let mut out = Vec::new();
        for (i, a) in ordered.iter().enumerate() {
            for b in &ordered[i + 1..] {
                self.orient(a, b, &covered, &mut out);
                self.orient(b, a, &covered, &mut out);
            }
        }
        out
    }

    fn orient(
        &self,
        source: &TableMetadata,
        target: &TableMetadata,
        covered: &HashSet<ColumnRef>,
        out: &mut Vec<Candidate>,
    ) {
        let is_covered =
            |table: &str, column: &str| covered.contains(&(table.to_string(), column.to_string()));

        for sc in &source.columns {
            if source.is_sole_primary_key(&sc.name)
                || is_covered(&source.name, &sc.name)
                || self.filter.is_excluded(&sc.name)
            {
                continue;
            }

            for tc in &target.columns {
                if is_covered(&target.name, &tc.name) || self.filter.is_excluded(&tc.name) {
                    continue;
                }
                if sc.data_type != tc.data_type {
                    continue;
                }

                let Some(signal) = likely_signal(
                    &sc.name,
                    &target.name,
                    &tc.name,
                    tc.pk,
                    &self.config.identifier_suffixes,
                ) else {
                    continue;
                };

                out.push(Candidate {
                    pair: ColumnPair::new(&source.name, &sc.name, &target.name, &tc.name),
                    signal,
                });
            }
        }
    }

    /// Run inference against a catalog.
    ///
    /// Only a lost catalog connection is an error; a failed value fetch skips
    /// the candidates that need it.
    pub async fn infer<P: CatalogProvider + ?Sized>(
        &self,
        catalog: &P,
        tables: &[TableMetadata],
        foreign_keys: &[ForeignKeyInfo],
    ) -> CatalogResult<InferenceOutcome> {
        let candidates = self.candidates(tables, foreign_keys);
        let mut stats = InferenceStats {
            candidates: candidates.len(),
            ..InferenceStats::default()
        };
        info!(candidates = candidates.len(), "analyzing implicit relationships");

        let mut columns: Vec<ColumnRef> = Vec::new();
        let mut seen = HashSet::new();
        for c in &candidates {
            for col in [
                (c.pair.from_table.clone(), c.pair.from_column.clone()),
                (c.pair.to_table.clone(), c.pair.to_column.clone()),
            ] {
                if seen.insert(col.clone()) {
                    columns.push(col);
                }
            }
        }
        stats.columns_sampled = columns.len();

        let cap = self.config.sample_cap;
        let fetched: Vec<(ColumnRef, CatalogResult<HashSet<String>>)> = stream::iter(columns)
            .map(|col| async move {
                let values = catalog.distinct_values(&col.0, &col.1, cap).await;
                (col, values)
            })
            .buffer_unordered(self.config.workers.max(1))
            .collect()
            .await;

        let mut values: HashMap<ColumnRef, HashSet<String>> = HashMap::new();
        for (col, result) in fetched {
            match result {
                Ok(set) => {
                    values.insert(col, set);
                }
                Err(e) if e.is_connection_failure() => return Err(e),
                Err(e) => {
                    debug!(table = %col.0, column = %col.1, error = %e, "value fetch failed");
                    stats.fetch_failures += 1;
                }
            }
        }

        let mut relationships = Vec::new();
        for candidate in &candidates {
            let pair = &candidate.pair;
            let source = values.get(&(pair.from_table.clone(), pair.from_column.clone()));
            let target = values.get(&(pair.to_table.clone(), pair.to_column.clone()));
            let (Some(source), Some(target)) = (source, target) else {
                stats.rejected += 1;
                continue;
            };

            match OverlapScore::compute(source, target) {
                Some(score)
                    if score.accepts(self.config.overlap_threshold, self.config.min_match_count) =>
                {
                    let rel = InferredRelationship::new(pair, &score);
                    info!(
                        relationship = %rel.likely_direction,
                        overlap = rel.overlap_percentage,
                        matches = rel.match_count,
                        signal = ?candidate.signal,
                        "found implicit relationship"
                    );
                    relationships.push(rel);
                }
                score => {
                    debug!(
                        from = %format!("{}.{}", pair.from_table, pair.from_column),
                        to = %format!("{}.{}", pair.to_table, pair.to_column),
                        ratio = score.map(|s| s.ratio),
                        "candidate rejected"
                    );
                    stats.rejected += 1;
                }
            }
        }

        stats.accepted = relationships.len();
        Ok(InferenceOutcome {
            relationships,
            stats,
        })
    }

    /// Export each accepted relationship's correspondence file and record its
    /// name on the relationship.
    pub async fn export<P: CatalogProvider + ?Sized>(
        &self,
        catalog: &P,
        exporter: &CsvExporter,
        relationships: &mut [InferredRelationship],
    ) -> CatalogResult<Vec<ItemFailure>> {
        for rel in relationships.iter() {
            exporter.claim_relationship(RelationshipKind::Implicit, &rel.pair());
        }
        let results: Vec<(usize, Result<String, ExportError>)> =
            stream::iter(relationships.iter().enumerate())
                .map(|(i, rel)| async move {
                    let pair = rel.pair();
                    let result =
                        export_relationship(catalog, exporter, RelationshipKind::Implicit, &pair)
                            .await
                            .map(|file| file.file_name);
                    (i, result)
                })
                .buffer_unordered(self.config.workers.max(1))
                .collect()
                .await;

        let mut failures = Vec::new();
        for (i, result) in results {
            let rel = &mut relationships[i];
            match result {
                Ok(file_name) => rel.csv_file = Some(file_name),
                Err(ExportError::Catalog(e)) if e.is_connection_failure() => return Err(e),
                Err(e) => {
                    warn!(relationship = %rel.likely_direction, error = %e, "implicit export failed");
                    failures.push(ItemFailure::new(
                        format!("implicit {}", rel.likely_direction),
                        FailureKind::Export,
                        &e,
                    ));
                }
            }
        }
        failures.sort_by(|a, b| a.item.cmp(&b.item));
        Ok(failures)
    }
}
