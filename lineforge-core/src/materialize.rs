//! Graph materialization.
//!
//! Writes validated, deduplicated, completed edges into the catalog: process
//! entities, table-level relationships, and column-level relationships. The
//! write protocol is partially idempotent: any relationship creation that
//! comes back with the "already exists" conflict signal counts as a
//! successful no-op, so re-materializing the same batch converges instead of
//! failing.
//!
//! Mediated edges are three sequential fail-fast steps (process entity,
//! has-input, produces-output). There is no rollback: a process entity left
//! behind by a mid-sequence failure is reported, not undone.

use std::collections::HashMap;
use std::sync::Arc;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::catalog::{Catalog, EndpointRef, EntityDraft, RelationshipDraft};
use crate::error::{CatalogError, EdgeError};
use crate::types::{
    AssetIdentity, ColumnIdentity, ColumnMapping, EdgeSummary, LineageKind, MaterializeMode,
    PlaceholderSide, ProcessRef, ValidatedEdge,
};

/// Entity type names on the catalog wire.
const DATASET_TYPE: &str = "DataSet";
const PROCESS_TYPE: &str = "Process";
const COLUMN_TYPE: &str = "Column";

/// Materializes edges into the catalog graph.
///
/// One materializer serves one materialization call: the placeholder column
/// cache is scoped to its lifetime, so repeated unmapped entries within a
/// call reuse one sentinel per (table, side) while separate calls may create
/// their own.
pub struct Materializer {
    catalog: Arc<dyn Catalog>,
    default_process_name: String,
    placeholders: HashMap<(String, PlaceholderSide), ColumnIdentity>,
}

impl Materializer {
    pub fn new(catalog: Arc<dyn Catalog>, default_process_name: impl Into<String>) -> Self {
        Self {
            catalog,
            default_process_name: default_process_name.into(),
            placeholders: HashMap::new(),
        }
    }

    /// Materialize one edge; never fails the batch, all outcomes land in the
    /// returned summary.
    pub async fn materialize_edge(
        &mut self,
        edge: &ValidatedEdge,
        mode: MaterializeMode,
        completed_mappings: &[ColumnMapping],
    ) -> EdgeSummary {
        let mut summary = EdgeSummary::for_edge(edge);
        info!(
            source = %edge.source.canonical_name,
            target = %edge.target.canonical_name,
            ?mode,
            "materializing edge"
        );

        let table_level_ok = match mode {
            MaterializeMode::Direct => {
                self.materialize_direct(edge, completed_mappings, &mut summary)
                    .await
            }
            MaterializeMode::ViaProcess => {
                self.materialize_via_process(edge, completed_mappings, &mut summary)
                    .await
            }
        };

        // Column-level lineage only once the table-level relationship(s) hold.
        if table_level_ok {
            self.materialize_columns(edge, completed_mappings, &mut summary)
                .await;
        }
        summary
    }

    /// Direct mode: one feeds-into relationship carrying the column-mapping
    /// list as attached metadata.
    async fn materialize_direct(
        &self,
        edge: &ValidatedEdge,
        mappings: &[ColumnMapping],
        summary: &mut EdgeSummary,
    ) -> bool {
        let mut draft = RelationshipDraft::new(
            LineageKind::FeedsInto,
            EndpointRef::guid(DATASET_TYPE, &edge.source.guid),
            EndpointRef::guid(DATASET_TYPE, &edge.target.guid),
        );
        if !mappings.is_empty() {
            draft = draft.with_attributes(json!({
                "columnMapping": flat_mapping_json(mappings),
            }));
        }
        self.create_counted(draft, summary).await
    }

    /// Mediated mode: process entity, then has-input, then produces-output,
    /// aborting on the first failure.
    async fn materialize_via_process(
        &self,
        edge: &ValidatedEdge,
        mappings: &[ColumnMapping],
        summary: &mut EdgeSummary,
    ) -> bool {
        let process_name = edge
            .edge
            .process_name
            .clone()
            .unwrap_or_else(|| self.default_process_name.clone());
        let process = ProcessRef::derive(
            &process_name,
            &edge.source.qualified_name,
            &edge.target.qualified_name,
        );

        // Step 1: the process entity. Endpoints reference assets by guid so
        // the catalog cannot mint accidental duplicate assets from
        // near-matching qualified names.
        let mut attributes = serde_json::Map::new();
        if !mappings.is_empty() {
            attributes.insert(
                "columnMapping".into(),
                json!(dataset_mapping_json(edge, mappings)),
            );
        }
        let draft = EntityDraft {
            type_name: PROCESS_TYPE.into(),
            name: process.name.clone(),
            qualified_name: process.qualified_name.clone(),
            attributes,
            inputs: vec![EndpointRef::guid(DATASET_TYPE, &edge.source.guid)],
            outputs: vec![EndpointRef::guid(DATASET_TYPE, &edge.target.guid)],
            parent_table: None,
        };

        match self.catalog.create_entity(draft).await {
            Ok(guid) => {
                debug!(process = %process.qualified_name, %guid, "created process entity");
                summary.created += 1;
                summary.process_guid = Some(guid);
            }
            Err(e) if e.is_conflict() => {
                debug!(process = %process.qualified_name, "process already exists");
                summary.already_existed += 1;
            }
            Err(e) => {
                summary.record_error(&EdgeError::PartialFailure {
                    step: "process_entity".into(),
                    process_guid: None,
                    message: e.to_string(),
                });
                return false;
            }
        }

        // Steps 2 and 3 anchor on the process qualified name, which is
        // deterministic whether or not step 1 found it already present.
        let process_ref = EndpointRef::qualified_name(PROCESS_TYPE, &process.qualified_name);

        let has_input = RelationshipDraft::new(
            LineageKind::HasInput,
            EndpointRef::guid(DATASET_TYPE, &edge.source.guid),
            process_ref.clone(),
        );
        if !self
            .create_step(has_input, "has_input", summary)
            .await
        {
            return false;
        }

        let produces_output = RelationshipDraft::new(
            LineageKind::ProducesOutput,
            process_ref,
            EndpointRef::guid(DATASET_TYPE, &edge.target.guid),
        );
        self.create_step(produces_output, "produces_output", summary)
            .await
    }

    /// Create a relationship, folding the conflict signal into the summary.
    async fn create_counted(
        &self,
        draft: RelationshipDraft,
        summary: &mut EdgeSummary,
    ) -> bool {
        let kind = draft.kind;
        match self.catalog.create_relationship(draft).await {
            Ok(_) => {
                summary.created += 1;
                true
            }
            Err(e) if e.is_conflict() => {
                debug!(kind = kind.wire_name(), "relationship already exists");
                summary.already_existed += 1;
                true
            }
            Err(e) => {
                summary.record_error(&EdgeError::Catalog(e));
                false
            }
        }
    }

    /// Like `create_counted`, but a hard failure is a mediated-sequence abort.
    async fn create_step(
        &self,
        draft: RelationshipDraft,
        step: &str,
        summary: &mut EdgeSummary,
    ) -> bool {
        let kind = draft.kind;
        match self.catalog.create_relationship(draft).await {
            Ok(_) => {
                summary.created += 1;
                true
            }
            Err(e) if e.is_conflict() => {
                debug!(kind = kind.wire_name(), "relationship already exists");
                summary.already_existed += 1;
                true
            }
            Err(e) => {
                summary.record_error(&EdgeError::PartialFailure {
                    step: step.into(),
                    process_guid: summary.process_guid.clone(),
                    message: e.to_string(),
                });
                false
            }
        }
    }

    /// Column-level pass over every completed mapping entry.
    async fn materialize_columns(
        &mut self,
        edge: &ValidatedEdge,
        mappings: &[ColumnMapping],
        summary: &mut EdgeSummary,
    ) {
        if mappings.is_empty() {
            return;
        }

        let source_columns = match self.catalog.table_columns(&edge.source.guid).await {
            Ok(columns) => columns,
            Err(e) => {
                summary.record_error(&EdgeError::Catalog(e));
                return;
            }
        };
        let target_columns = match self.catalog.table_columns(&edge.target.guid).await {
            Ok(columns) => columns,
            Err(e) => {
                summary.record_error(&EdgeError::Catalog(e));
                return;
            }
        };

        // A table without discoverable columns skips only this pass; the
        // table-level edge above stands.
        if source_columns.is_empty() || target_columns.is_empty() {
            let table = if source_columns.is_empty() {
                &edge.source
            } else {
                &edge.target
            };
            let err = EdgeError::SchemaUnavailable {
                table: table.canonical_name.clone(),
            };
            warn!(%err, "skipping column-level lineage");
            summary.errors.push(err.to_string());
            summary.skipped_columns += mappings.len();
            return;
        }

        let source_by_name: HashMap<String, &ColumnIdentity> = source_columns
            .iter()
            .map(|c| (c.name.to_lowercase(), c))
            .collect();
        let target_by_name: HashMap<String, &ColumnIdentity> = target_columns
            .iter()
            .map(|c| (c.name.to_lowercase(), c))
            .collect();

        for mapping in mappings {
            if mapping.is_empty() {
                summary.skipped_columns += 1;
                continue;
            }

            let source_col = if mapping.has_source() {
                match source_by_name.get(&mapping.source_column.to_lowercase()) {
                    Some(col) => (*col).clone(),
                    None => {
                        warn!(column = %mapping.source_column, "source column not found");
                        summary.skipped_columns += 1;
                        continue;
                    }
                }
            } else {
                match self.placeholder(&edge.source, PlaceholderSide::Source).await {
                    Ok(col) => col,
                    Err(e) => {
                        summary.errors.push(e.to_string());
                        summary.skipped_columns += 1;
                        continue;
                    }
                }
            };

            let target_col = if mapping.has_target() {
                match target_by_name.get(&mapping.target_column.to_lowercase()) {
                    Some(col) => (*col).clone(),
                    None => {
                        warn!(column = %mapping.target_column, "target column not found");
                        summary.skipped_columns += 1;
                        continue;
                    }
                }
            } else {
                match self.placeholder(&edge.target, PlaceholderSide::Target).await {
                    Ok(col) => col,
                    Err(e) => {
                        summary.errors.push(e.to_string());
                        summary.skipped_columns += 1;
                        continue;
                    }
                }
            };

            let draft = RelationshipDraft::new(
                LineageKind::ColumnFeedsInto,
                EndpointRef::guid(COLUMN_TYPE, &source_col.guid),
                EndpointRef::guid(COLUMN_TYPE, &target_col.guid),
            );
            self.create_counted(draft, summary).await;
        }
    }

    /// Resolve or lazily create the sentinel column for (table, side).
    ///
    /// Memoized for this materializer's lifetime, so one call never creates
    /// two placeholders for the same key. Failure here fails only the
    /// requesting mapping entry.
    async fn placeholder(
        &mut self,
        table: &AssetIdentity,
        side: PlaceholderSide,
    ) -> Result<ColumnIdentity, EdgeError> {
        let key = (table.guid.clone(), side);
        if let Some(cached) = self.placeholders.get(&key) {
            return Ok(cached.clone());
        }

        let qualified_name = format!("{}{}", table.qualified_name, side.qname_suffix());
        let mut attributes = serde_json::Map::new();
        attributes.insert("type".into(), json!("string"));
        let draft = EntityDraft {
            type_name: COLUMN_TYPE.into(),
            name: side.column_name().into(),
            qualified_name: qualified_name.clone(),
            attributes,
            inputs: Vec::new(),
            outputs: Vec::new(),
            parent_table: Some(EndpointRef::guid(DATASET_TYPE, &table.guid)),
        };

        let identity = match self.catalog.create_entity(draft).await {
            Ok(guid) => {
                debug!(table = %table.canonical_name, ?side, %guid, "created placeholder column");
                ColumnIdentity {
                    guid,
                    name: side.column_name().to_string(),
                    qualified_name,
                    data_type: "string".to_string(),
                }
            }
            Err(e) if e.is_conflict() => {
                // Left over from an earlier run; recover its identity from
                // the table schema instead of failing the entry.
                self.find_existing_placeholder(table, &qualified_name)
                    .await?
            }
            Err(e) => return Err(EdgeError::Catalog(e)),
        };

        self.placeholders.insert(key, identity.clone());
        Ok(identity)
    }

    async fn find_existing_placeholder(
        &self,
        table: &AssetIdentity,
        qualified_name: &str,
    ) -> Result<ColumnIdentity, EdgeError> {
        let columns = self
            .catalog
            .table_columns(&table.guid)
            .await
            .map_err(EdgeError::Catalog)?;
        columns
            .into_iter()
            .find(|c| c.qualified_name == qualified_name)
            .ok_or_else(|| {
                EdgeError::Catalog(CatalogError::NotFound {
                    what: format!("placeholder column {qualified_name}"),
                })
            })
    }
}

/// Flat `[{"Source": ..., "Sink": ...}]` mapping list carried on a direct
/// relationship.
fn flat_mapping_json(mappings: &[ColumnMapping]) -> String {
    let entries: Vec<serde_json::Value> = mappings
        .iter()
        .map(|m| json!({ "Source": m.source_column, "Sink": m.target_column }))
        .collect();
    serde_json::Value::Array(entries).to_string()
}

/// Dataset-scoped mapping attribute carried on a process entity.
fn dataset_mapping_json(edge: &ValidatedEdge, mappings: &[ColumnMapping]) -> String {
    let column_mapping: Vec<serde_json::Value> = mappings
        .iter()
        .map(|m| json!({ "Source": m.source_column, "Sink": m.target_column }))
        .collect();
    json!([{
        "DatasetMapping": {
            "Source": edge.source.qualified_name,
            "Sink": edge.target.qualified_name,
        },
        "ColumnMapping": column_mapping,
    }])
    .to_string()
}
