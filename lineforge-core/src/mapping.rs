//! Column mapping completion.
//!
//! Merges an edge's externally supplied (possibly empty or partial) column
//! mappings with the authoritative source and target column lists from
//! schema lookup. Genuine auto-matches by name are preserved; every column
//! that cannot be matched becomes an explicit unmapped entry instead of
//! being silently dropped, so unmapped columns surface for manual
//! correction.

use std::collections::{HashMap, HashSet};

use crate::types::{ColumnIdentity, ColumnMapping};

/// Complete a partial column mapping against authoritative schemas.
///
/// Three phases:
/// 1. Seed with all supplied mappings whose source side is non-empty,
///    recording mapped source and target names.
/// 2. For each authoritative source column not yet mapped, try an exact
///    case-insensitive match against a still-unmapped target column; on a
///    match append (source, target), otherwise append (source, "").
/// 3. Every authoritative target column still unmapped becomes ("", target).
///
/// Invariant: every authoritative source and target column name appears in
/// exactly one completed entry, never twice in the same role.
pub fn complete_column_mappings(
    supplied: &[ColumnMapping],
    source_columns: &[ColumnIdentity],
    target_columns: &[ColumnIdentity],
) -> Vec<ColumnMapping> {
    let mut completed: Vec<ColumnMapping> = Vec::new();
    let mut mapped_sources: HashSet<String> = HashSet::new();
    let mut mapped_targets: HashSet<String> = HashSet::new();

    // Phase 1: keep supplied source-bearing entries.
    for mapping in supplied {
        if !mapping.has_source() {
            continue;
        }
        mapped_sources.insert(mapping.source_column.to_lowercase());
        if mapping.has_target() {
            mapped_targets.insert(mapping.target_column.to_lowercase());
        }
        completed.push(mapping.clone());
    }

    // Phase 2: auto-match remaining source columns by exact name.
    let target_by_lower: HashMap<String, &str> = target_columns
        .iter()
        .map(|c| (c.name.to_lowercase(), c.name.as_str()))
        .collect();

    for source in source_columns {
        let source_lower = source.name.to_lowercase();
        if mapped_sources.contains(&source_lower) {
            continue;
        }
        mapped_sources.insert(source_lower.clone());

        match target_by_lower.get(&source_lower) {
            Some(target_name) if !mapped_targets.contains(&source_lower) => {
                mapped_targets.insert(source_lower);
                completed.push(ColumnMapping::new(&source.name, *target_name));
            }
            _ => {
                completed.push(ColumnMapping::new(&source.name, ""));
            }
        }
    }

    // Phase 3: surface leftover target columns as explicit unmapped entries.
    for target in target_columns {
        if !mapped_targets.contains(&target.name.to_lowercase()) {
            completed.push(ColumnMapping::new("", &target.name));
        }
    }

    completed
}
