//! Lineage deletion.
//!
//! Removes lineage artifacts from the catalog while never touching the
//! assets themselves: relationship deletion is filtered by type-name
//! keywords, and entity deletion is restricted to process entities
//! recognized by the deterministic qualified-name prefix. Every delete
//! treats "not found" as an idempotent success, so re-running a cleanup
//! converges.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::error::CatalogError;
use crate::inventory::AssetInventory;
use crate::types::{DeletionSummary, PROCESS_QNAME_PREFIX};

/// A relationship whose type name contains any of these fragments is a
/// lineage artifact and eligible for deletion. Everything else (containment,
/// schema, classification links) stays.
const LINEAGE_TYPE_FRAGMENTS: &[&str] = &["lineage", "input", "output", "process"];

fn is_lineage_relationship(type_name: &str) -> bool {
    let lowered = type_name.to_lowercase();
    LINEAGE_TYPE_FRAGMENTS
        .iter()
        .any(|fragment| lowered.contains(fragment))
}

/// Deletes lineage artifacts through the catalog seam.
pub struct Deleter {
    catalog: Arc<dyn Catalog>,
}

impl Deleter {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self { catalog }
    }

    /// Delete one process entity by guid.
    ///
    /// `processes_deleted` is 1 for a fresh delete and 0 when the entity was
    /// already gone; any other failure lands in `errors`. The catalog
    /// cascades the process's relationships.
    pub async fn delete_process(&self, guid: &str) -> DeletionSummary {
        let mut summary = DeletionSummary::default();
        match self.delete_process_entity(guid).await {
            Ok(true) => summary.processes_deleted = 1,
            Ok(false) => {}
            Err(e) => summary.errors.push(e.to_string()),
        }
        summary
    }

    /// Idempotent entity delete; `true` means it was deleted just now.
    async fn delete_process_entity(&self, guid: &str) -> Result<bool, CatalogError> {
        match self.catalog.delete_entity(guid).await {
            Ok(()) => {
                info!(%guid, "deleted process entity");
                Ok(true)
            }
            Err(e) if e.is_not_found() => {
                debug!(%guid, "process entity already gone");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Delete every lineage relationship attached to the inventory's assets,
    /// at both the table and the column level.
    ///
    /// Asset and table entities are never deleted here; neither are
    /// placeholder columns. Failures are collected per relationship, so one
    /// bad delete does not stop the pass.
    pub async fn delete_workspace_lineage(&self, inventory: &AssetInventory) -> DeletionSummary {
        let mut summary = DeletionSummary::default();
        // Both endpoints of a relationship can be in scope; track what has
        // been deleted so it is counted once.
        let mut deleted: HashSet<String> = HashSet::new();

        for asset in inventory.iter() {
            self.delete_entity_lineage(&asset.guid, &mut deleted, &mut summary, false)
                .await;
        }

        // Second pass over column schemas. Column-level relationships hang
        // off column entities, which the asset stream does not list.
        for table in inventory.lineage_endpoints() {
            let columns = match self.catalog.table_columns(&table.guid).await {
                Ok(columns) => columns,
                Err(e) if e.is_not_found() => continue,
                Err(e) => {
                    warn!(table = %table.canonical_name, error = %e, "schema lookup failed");
                    summary.errors.push(e.to_string());
                    continue;
                }
            };
            for column in columns {
                self.delete_entity_lineage(&column.guid, &mut deleted, &mut summary, true)
                    .await;
            }
        }

        info!(
            table_relationships = summary.table_relationships_deleted,
            column_relationships = summary.column_relationships_deleted,
            errors = summary.errors.len(),
            "workspace lineage deletion finished"
        );
        summary
    }

    /// Walk the lineage graph around every endpoint and delete the process
    /// entities this engine created, recognized by their qualified-name
    /// scheme.
    pub async fn sweep_processes(
        &self,
        inventory: &AssetInventory,
        depth: u32,
    ) -> DeletionSummary {
        let mut summary = DeletionSummary::default();
        let mut process_guids: HashSet<String> = HashSet::new();

        for asset in inventory.lineage_endpoints() {
            let graph = match self.catalog.lineage_graph(&asset.guid, depth).await {
                Ok(graph) => graph,
                Err(e) if e.is_not_found() => continue,
                Err(e) => {
                    warn!(asset = %asset.canonical_name, error = %e, "lineage walk failed");
                    summary.errors.push(e.to_string());
                    continue;
                }
            };
            for entity in graph {
                if entity.qualified_name.starts_with(PROCESS_QNAME_PREFIX) {
                    process_guids.insert(entity.guid);
                }
            }
        }

        for guid in process_guids {
            match self.delete_process_entity(&guid).await {
                Ok(true) => summary.processes_deleted += 1,
                Ok(false) => {}
                Err(e) => summary.errors.push(e.to_string()),
            }
        }

        info!(processes = summary.processes_deleted, "process sweep finished");
        summary
    }

    async fn delete_entity_lineage(
        &self,
        guid: &str,
        deleted: &mut HashSet<String>,
        summary: &mut DeletionSummary,
        column_level: bool,
    ) {
        let relationships = match self.catalog.entity_relationships(guid).await {
            Ok(relationships) => relationships,
            Err(e) if e.is_not_found() => return,
            Err(e) => {
                summary.errors.push(e.to_string());
                return;
            }
        };

        for relationship in relationships {
            if !is_lineage_relationship(&relationship.relationship_type) {
                continue;
            }
            if !deleted.insert(relationship.relationship_guid.clone()) {
                continue;
            }
            match self
                .catalog
                .delete_relationship(&relationship.relationship_guid)
                .await
            {
                // Already gone counts as deleted: someone else got there first.
                Ok(()) | Err(CatalogError::NotFound { .. }) => {
                    debug!(
                        guid = %relationship.relationship_guid,
                        kind = %relationship.relationship_type,
                        "deleted lineage relationship"
                    );
                    if column_level {
                        summary.column_relationships_deleted += 1;
                    } else {
                        summary.table_relationships_deleted += 1;
                    }
                }
                Err(e) => summary.errors.push(e.to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{EndpointRef, MockCatalog, RelationshipDraft};
    use crate::types::LineageKind;

    const WS: &str = "groups/ws-1/";

    fn qname(leaf: &str) -> String {
        format!("https://host/groups/ws-1/lakehouses/lh/tables/{leaf}")
    }

    async fn inventory(catalog: &MockCatalog) -> AssetInventory {
        AssetInventory::resolve(catalog, WS).await.unwrap()
    }

    #[tokio::test]
    async fn test_lineage_type_filter() {
        assert!(is_lineage_relationship("direct_lineage_dataset_dataset"));
        assert!(is_lineage_relationship("dataset_process_inputs"));
        assert!(is_lineage_relationship("column_lineage"));
        assert!(!is_lineage_relationship("table_columns"));
        assert!(!is_lineage_relationship("classification_assignment"));
    }

    #[tokio::test]
    async fn test_delete_process_is_idempotent() {
        let catalog = Arc::new(MockCatalog::new());
        catalog.add_asset("p1", "Load", "lineage-process://Load_a_to_b", "process");
        let deleter = Deleter::new(catalog);

        let first = deleter.delete_process("p1").await;
        assert_eq!(first.processes_deleted, 1);
        assert!(first.errors.is_empty());

        // Already gone: a summary reporting nothing deleted, not an error.
        let second = deleter.delete_process("p1").await;
        assert_eq!(second.processes_deleted, 0);
        assert!(second.errors.is_empty());
        assert_eq!(second.total_deleted(), 0);
    }

    #[tokio::test]
    async fn test_workspace_deletion_removes_relationships_not_assets() {
        let catalog = Arc::new(MockCatalog::new());
        catalog.add_table("t1", "Raw", &qname("Raw"), &["id"]);
        catalog.add_table("t2", "Clean", &qname("Clean"), &["id"]);
        catalog
            .create_relationship(RelationshipDraft::new(
                LineageKind::FeedsInto,
                EndpointRef::guid("DataSet", "t1"),
                EndpointRef::guid("DataSet", "t2"),
            ))
            .await
            .unwrap();
        catalog
            .create_relationship(RelationshipDraft::new(
                LineageKind::ColumnFeedsInto,
                EndpointRef::guid("Column", "t1-col-0"),
                EndpointRef::guid("Column", "t2-col-0"),
            ))
            .await
            .unwrap();

        let deleter = Deleter::new(catalog.clone());
        let inv = inventory(&catalog).await;
        let summary = deleter.delete_workspace_lineage(&inv).await;

        assert_eq!(summary.table_relationships_deleted, 1);
        assert_eq!(summary.column_relationships_deleted, 1);
        assert!(summary.errors.is_empty());
        assert_eq!(catalog.relationship_count(), 0);
        // The assets and their columns survive.
        assert!(catalog.get_entity("t1").await.is_ok());
        assert!(catalog.get_entity("t2").await.is_ok());
        assert_eq!(catalog.table_columns("t1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_shared_relationship_counted_once() {
        let catalog = Arc::new(MockCatalog::new());
        catalog.add_table("t1", "Raw", &qname("Raw"), &[]);
        catalog.add_table("t2", "Clean", &qname("Clean"), &[]);
        catalog
            .create_relationship(RelationshipDraft::new(
                LineageKind::FeedsInto,
                EndpointRef::guid("DataSet", "t1"),
                EndpointRef::guid("DataSet", "t2"),
            ))
            .await
            .unwrap();

        let deleter = Deleter::new(catalog.clone());
        let inv = inventory(&catalog).await;
        let summary = deleter.delete_workspace_lineage(&inv).await;
        // Both endpoints see the relationship; it is deleted and counted once.
        assert_eq!(summary.table_relationships_deleted, 1);
        assert!(summary.errors.is_empty());
    }

    #[tokio::test]
    async fn test_sweep_deletes_only_recognized_processes() {
        let catalog = Arc::new(MockCatalog::new());
        catalog.add_table("t1", "Raw", &qname("Raw"), &[]);
        catalog.add_table("t2", "Clean", &qname("Clean"), &[]);
        // One engine-created process, one foreign process wired identically.
        catalog.add_asset("p1", "Load", "lineage-process://Load_Raw_to_Clean", "process");
        catalog.add_asset("p2", "Foreign", "external://etl/job-7", "process");
        for process in ["p1", "p2"] {
            catalog
                .create_relationship(RelationshipDraft::new(
                    LineageKind::HasInput,
                    EndpointRef::guid("DataSet", "t1"),
                    EndpointRef::guid("Process", process),
                ))
                .await
                .unwrap();
            catalog
                .create_relationship(RelationshipDraft::new(
                    LineageKind::ProducesOutput,
                    EndpointRef::guid("Process", process),
                    EndpointRef::guid("DataSet", "t2"),
                ))
                .await
                .unwrap();
        }

        let deleter = Deleter::new(catalog.clone());
        let inv = inventory(&catalog).await;
        let summary = deleter.sweep_processes(&inv, 10).await;

        assert_eq!(summary.processes_deleted, 1);
        assert!(catalog.get_entity("p1").await.unwrap_err().is_not_found());
        assert!(catalog.get_entity("p2").await.is_ok());
    }
}
