//! Edge endpoint resolution.
//!
//! An edge row carries two correspondence values. They are matched against
//! the endpoint classes' key properties first; when that finds nothing, one
//! more attempt is made with a fixed secondary key property on both ends.
//! This covers ontologies whose declared key is not the column the
//! relationship file was exported from.

use serde::Serialize;

use crate::graph::{GraphResult, GraphStore, NodeMatch};

/// Which key matched an edge's endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyVia {
    Primary,
    Secondary,
}

/// Outcome of resolving one edge row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeResolution {
    Resolved { via: KeyVia },
    Unresolved,
}

/// Endpoint class as seen by the resolver.
#[derive(Debug, Clone, Copy)]
pub struct Endpoint<'a> {
    pub label: &'a str,
    /// The class key property, if it declares one.
    pub key: Option<&'a str>,
}

/// Two-step resolution: primary keys, then the secondary key.
#[derive(Debug, Clone)]
pub struct ResolutionPolicy {
    secondary_key: Option<String>,
}

impl ResolutionPolicy {
    pub fn new(secondary_key: Option<String>) -> Self {
        Self {
            secondary_key: secondary_key.filter(|k| !k.is_empty()),
        }
    }

    pub fn secondary_key(&self) -> Option<&str> {
        self.secondary_key.as_deref()
    }

    /// Merge a `rel_type` edge for one correspondence row.
    pub async fn resolve<G: GraphStore + ?Sized>(
        &self,
        store: &G,
        rel_type: &str,
        from: Endpoint<'_>,
        to: Endpoint<'_>,
        from_value: &str,
        to_value: &str,
    ) -> GraphResult<EdgeResolution> {
        if let (Some(fk), Some(tk)) = (from.key, to.key) {
            let matched = store
                .merge_edge(
                    rel_type,
                    &NodeMatch::new(from.label, fk, from_value),
                    &NodeMatch::new(to.label, tk, to_value),
                )
                .await?;
            if matched > 0 {
                return Ok(EdgeResolution::Resolved {
                    via: KeyVia::Primary,
                });
            }
        }

        let Some(secondary) = self.secondary_key.as_deref() else {
            return Ok(EdgeResolution::Unresolved);
        };
        // Same properties as the primary attempt: retrying cannot help.
        if from.key == Some(secondary) && to.key == Some(secondary) {
            return Ok(EdgeResolution::Unresolved);
        }

        let matched = store
            .merge_edge(
                rel_type,
                &NodeMatch::new(from.label, secondary, from_value),
                &NodeMatch::new(to.label, secondary, to_value),
            )
            .await?;
        if matched > 0 {
            Ok(EdgeResolution::Resolved {
                via: KeyVia::Secondary,
            })
        } else {
            Ok(EdgeResolution::Unresolved)
        }
    }
}
