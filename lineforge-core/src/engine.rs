//! The reconciliation engine facade.
//!
//! Ties the pipeline together: inventory resolution, validation,
//! deduplication, mapping completion, materialization, and deletion, all
//! behind one struct holding the catalog seam and the engine settings.
//! Edge materialization stays sequential; only schema prefetch
//! fans out.

use std::collections::HashMap;
use std::sync::Arc;
use chrono::Utc;
use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::config::LineforgeConfig;
use crate::deletion::Deleter;
use crate::error::{LineageError, Result};
use crate::inventory::{fetch_schemas, AssetInventory};
use crate::mapping::complete_column_mappings;
use crate::materialize::Materializer;
use crate::rest_catalog::RestCatalog;
use crate::suggest::{DigestAsset, InventoryDigest, SuggestionSource};
use crate::types::{
    AssetKind, BatchSummary, ColumnIdentity, DeletionSummary, MaterializeMode, ProposedEdge,
};
use crate::validate::{dedup_edges, validate_edges};

/// The lineage reconciliation engine.
///
/// One engine serves one catalog; every operation scopes itself to a
/// workspace through the configured scope marker.
pub struct LineageEngine {
    catalog: Arc<dyn Catalog>,
    config: LineforgeConfig,
}

impl LineageEngine {
    /// Build an engine over an existing catalog client. Tests hand in a
    /// `MockCatalog` here.
    pub fn new(catalog: Arc<dyn Catalog>, config: LineforgeConfig) -> Self {
        Self { catalog, config }
    }

    /// Build an engine connected to the configured REST catalog.
    pub fn connect(config: LineforgeConfig) -> Result<Self> {
        let catalog = RestCatalog::from_config(&config.catalog)?;
        Ok(Self::new(Arc::new(catalog), config))
    }

    pub fn config(&self) -> &LineforgeConfig {
        &self.config
    }

    /// Validate, deduplicate, complete, and materialize a batch of proposed
    /// edges for one workspace.
    ///
    /// Fails only when the workspace has no assets at all or when every
    /// proposal is invalid; per-edge write failures are reported in the
    /// summary instead.
    pub async fn materialize_lineage(
        &self,
        workspace: &str,
        proposals: Vec<ProposedEdge>,
        mode: MaterializeMode,
    ) -> Result<BatchSummary> {
        let inventory = self.resolve_inventory(workspace).await?;
        self.run_batch(&inventory, proposals, mode).await
    }

    /// Ask a suggestion source for lineage proposals and materialize what it
    /// returns. An empty suggestion batch yields an empty summary.
    pub async fn reconcile(
        &self,
        workspace: &str,
        source: &dyn SuggestionSource,
        mode: MaterializeMode,
    ) -> Result<BatchSummary> {
        let inventory = self.resolve_inventory(workspace).await?;
        let digest = self.build_digest(workspace, &inventory).await;
        let batch = source.propose(&digest).await.map_err(LineageError::from)?;
        info!(
            workspace,
            suggestions = batch.lineage_mappings.len(),
            "suggestion source answered"
        );
        self.run_batch(&inventory, batch.into_proposals(), mode)
            .await
    }

    /// Delete every lineage relationship in the workspace, table level and
    /// column level. Assets, tables, and columns are never deleted.
    pub async fn delete_lineage(&self, workspace: &str) -> Result<DeletionSummary> {
        let inventory = self.resolve_inventory(workspace).await?;
        Ok(Deleter::new(self.catalog.clone())
            .delete_workspace_lineage(&inventory)
            .await)
    }

    /// Delete one process entity. `processes_deleted` is 0 when it was
    /// already gone; failures land in the summary's error list.
    pub async fn delete_process(&self, guid: &str) -> DeletionSummary {
        Deleter::new(self.catalog.clone()).delete_process(guid).await
    }

    /// Walk the workspace lineage graph and delete the process entities this
    /// engine created, recognized by their qualified-name scheme.
    pub async fn sweep_processes(&self, workspace: &str) -> Result<DeletionSummary> {
        let inventory = self.resolve_inventory(workspace).await?;
        Ok(Deleter::new(self.catalog.clone())
            .sweep_processes(&inventory, self.config.engine.sweep_depth)
            .await)
    }

    async fn resolve_inventory(&self, workspace: &str) -> Result<AssetInventory> {
        let scope = self.config.engine.scope_marker_for(workspace);
        AssetInventory::resolve(self.catalog.as_ref(), &scope).await
    }

    /// Compact inventory view handed to suggestion sources, with column
    /// schemas prefetched for every lineage endpoint.
    async fn build_digest(&self, workspace: &str, inventory: &AssetInventory) -> InventoryDigest {
        let schemas = self.prefetch_schemas(inventory.lineage_endpoints()).await;
        let assets = inventory
            .iter()
            .map(|asset| DigestAsset {
                name: asset.canonical_name.clone(),
                kind: asset.kind,
                qualified_name: asset.qualified_name.clone(),
                columns: schemas
                    .get(&asset.guid)
                    .map(|columns| columns.iter().map(|c| c.name.clone()).collect())
                    .unwrap_or_default(),
            })
            .collect();
        InventoryDigest {
            workspace: workspace.to_string(),
            assets,
        }
    }

    async fn prefetch_schemas(
        &self,
        tables: Vec<crate::types::AssetIdentity>,
    ) -> HashMap<String, Vec<ColumnIdentity>> {
        let tables: Vec<_> = tables
            .into_iter()
            .filter(|t| t.kind == AssetKind::Table)
            .collect();
        let fetches = fetch_schemas(
            self.catalog.clone(),
            tables,
            self.config.engine.max_concurrent_schema_fetches,
            self.config.catalog.timeout_secs,
        )
        .await;

        let mut schemas = HashMap::new();
        for fetch in fetches {
            match fetch.result {
                Ok(columns) => {
                    schemas.insert(fetch.table.guid, columns);
                }
                Err(e) => {
                    warn!(table = %fetch.table.canonical_name, error = %e, "schema prefetch failed");
                }
            }
        }
        schemas
    }

    async fn run_batch(
        &self,
        inventory: &AssetInventory,
        proposals: Vec<ProposedEdge>,
        mode: MaterializeMode,
    ) -> Result<BatchSummary> {
        let started_at = Utc::now();
        let batch_id = uuid::Uuid::new_v4();
        let proposal_count = proposals.len();

        let outcome = validate_edges(inventory, proposals)?;
        let dedup = dedup_edges(outcome.valid);
        info!(
            %batch_id,
            proposals = proposal_count,
            valid = dedup.edges.len(),
            invalid = outcome.invalid.len(),
            duplicates = dedup.dropped,
            "batch validated"
        );

        // Prefetch each distinct endpoint's schema once; the completer reads
        // these, the materializer re-reads through the catalog as needed.
        let mut endpoints: Vec<_> = dedup
            .edges
            .iter()
            .flat_map(|e| [e.source.clone(), e.target.clone()])
            .collect();
        endpoints.sort_by(|a, b| a.guid.cmp(&b.guid));
        endpoints.dedup_by(|a, b| a.guid == b.guid);
        let schemas = self.prefetch_schemas(endpoints).await;
        let empty: Vec<ColumnIdentity> = Vec::new();

        let mut materializer = Materializer::new(
            self.catalog.clone(),
            self.config.engine.default_process_name.clone(),
        );
        let mut summaries = Vec::with_capacity(dedup.edges.len());
        for edge in &dedup.edges {
            let source_columns = schemas.get(&edge.source.guid).unwrap_or(&empty);
            let target_columns = schemas.get(&edge.target.guid).unwrap_or(&empty);
            let completed = complete_column_mappings(
                &edge.edge.column_mappings,
                source_columns,
                target_columns,
            );
            // A per-edge process request overrides a direct batch mode.
            let edge_mode = if edge.edge.use_process {
                MaterializeMode::ViaProcess
            } else {
                mode
            };
            summaries.push(
                materializer
                    .materialize_edge(edge, edge_mode, &completed)
                    .await,
            );
        }

        Ok(BatchSummary {
            batch_id,
            edges: summaries,
            invalid: outcome.invalid,
            duplicates_dropped: dedup.dropped,
            started_at,
            finished_at: Utc::now(),
        })
    }
}
