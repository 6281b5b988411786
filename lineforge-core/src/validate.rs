//! Suggestion validation and edge deduplication.
//!
//! Proposed edges are untrusted: both endpoint names must resolve against
//! the asset inventory before anything touches the catalog. Validation
//! rewrites names to canonical casing and attaches resolved identities;
//! deduplication then removes repeated identity pairs, first occurrence
//! winning.

use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::error::{LineageError, Result};
use crate::inventory::AssetInventory;
use crate::types::{InvalidEdge, InvalidReason, ProposedEdge, ValidatedEdge};

/// Outcome of validating a batch of proposals.
#[derive(Debug, Default)]
pub struct ValidationOutcome {
    pub valid: Vec<ValidatedEdge>,
    pub invalid: Vec<InvalidEdge>,
}

/// Validate proposed edges against the inventory.
///
/// Each edge is valid only if both names resolve case-insensitively; on
/// success the names are rewritten to the catalog's canonical casing. If
/// zero edges validate the whole step fails with `ValidationFailed`
/// carrying the full list of known names for diagnosis, never a silent
/// empty success.
pub fn validate_edges(
    inventory: &AssetInventory,
    proposals: Vec<ProposedEdge>,
) -> Result<ValidationOutcome> {
    let mut outcome = ValidationOutcome::default();

    for mut edge in proposals {
        let source = inventory.lookup(&edge.source_name).cloned();
        let target = inventory.lookup(&edge.target_name).cloned();

        match (source, target) {
            (Some(source), Some(target)) => {
                debug!(
                    source = %source.canonical_name,
                    target = %target.canonical_name,
                    "edge validated"
                );
                edge.source_name = source.canonical_name.clone();
                edge.target_name = target.canonical_name.clone();
                outcome.valid.push(ValidatedEdge {
                    edge,
                    source,
                    target,
                });
            }
            (source, target) => {
                let reason = match (source.is_some(), target.is_some()) {
                    (false, true) => InvalidReason::SourceNotFound,
                    (true, false) => InvalidReason::TargetNotFound,
                    _ => InvalidReason::BothNotFound,
                };
                warn!(
                    source = %edge.source_name,
                    target = %edge.target_name,
                    %reason,
                    "edge rejected"
                );
                outcome.invalid.push(InvalidEdge { edge, reason });
            }
        }
    }

    if outcome.valid.is_empty() && !outcome.invalid.is_empty() {
        return Err(LineageError::ValidationFailed {
            known_assets: inventory.known_names(),
        });
    }

    info!(
        valid = outcome.valid.len(),
        invalid = outcome.invalid.len(),
        "validation finished"
    );
    Ok(outcome)
}

/// Result of deduplicating validated edges.
#[derive(Debug)]
pub struct DedupOutcome {
    pub edges: Vec<ValidatedEdge>,
    pub dropped: usize,
}

/// Remove duplicate edges by (source guid, target guid); first occurrence wins.
///
/// Pure and order-preserving; later duplicates are only counted.
pub fn dedup_edges(edges: Vec<ValidatedEdge>) -> DedupOutcome {
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut kept = Vec::with_capacity(edges.len());
    let mut dropped = 0;

    for edge in edges {
        let key = (edge.source.guid.clone(), edge.target.guid.clone());
        if seen.insert(key) {
            kept.push(edge);
        } else {
            debug!(
                source = %edge.source.canonical_name,
                target = %edge.target.canonical_name,
                "dropping duplicate edge"
            );
            dropped += 1;
        }
    }

    if dropped > 0 {
        info!(dropped, kept = kept.len(), "deduplicated edges");
    }
    DedupOutcome {
        edges: kept,
        dropped,
    }
}
