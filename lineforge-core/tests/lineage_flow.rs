//! Integration tests for the Lineforge engine.
//!
//! These tests exercise the full pipeline end-to-end using MockCatalog:
//! inventory resolution, validation, mapping completion, materialization,
//! and the deletion operations.

use lineforge_core::suggest::{SuggestionBatch, SuggestionSource, UntrustedSuggestion};
use lineforge_core::{
    AssetInventory, Catalog, CatalogError, ColumnMapping, InvalidReason, InventoryDigest,
    LineageEngine, LineforgeConfig, MaterializeMode, MockCatalog, ProposedEdge,
};
use async_trait::async_trait;
use std::sync::Arc;

const WORKSPACE: &str = "ws-1";

fn qname(leaf: &str) -> String {
    format!("https://host/groups/ws-1/lakehouses/lh/tables/{leaf}")
}

/// Helper to create an engine over a seeded mock catalog.
fn create_engine() -> (Arc<MockCatalog>, LineageEngine) {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("lineforge_core=debug")
        .try_init();
    let catalog = Arc::new(MockCatalog::new());
    catalog.add_table("t-raw", "RawOrders", &qname("RawOrders"), &["id", "email"]);
    catalog.add_table(
        "t-clean",
        "CleanOrders",
        &qname("CleanOrders"),
        &["id", "email_hash"],
    );
    catalog.add_table("t-report", "Report", &qname("Report"), &["id"]);
    let engine = LineageEngine::new(catalog.clone(), LineforgeConfig::default());
    (catalog, engine)
}

/// A suggestion source that always returns the same canned batch.
struct CannedSource {
    batch: SuggestionBatch,
}

#[async_trait]
impl SuggestionSource for CannedSource {
    async fn propose(&self, _digest: &InventoryDigest) -> Result<SuggestionBatch, CatalogError> {
        Ok(self.batch.clone())
    }
}

#[tokio::test]
async fn test_direct_materialization_end_to_end() {
    let (catalog, engine) = create_engine();
    let proposals = vec![ProposedEdge::new("RawOrders", "CleanOrders")
        .with_mappings(vec![ColumnMapping::new("id", "id")])];

    let summary = engine
        .materialize_lineage(WORKSPACE, proposals, MaterializeMode::Direct)
        .await
        .unwrap();

    assert_eq!(summary.total_failed(), 0);
    assert!(summary.invalid.is_empty());
    assert_eq!(
        catalog.relationship_count_of_type("direct_lineage_dataset_dataset"),
        1
    );
    // Completion extends ("id","id") with ("email","") and ("","email_hash"),
    // so the column pass writes three edges through two placeholders.
    assert_eq!(catalog.relationship_count_of_type("column_lineage"), 3);
}

#[tokio::test]
async fn test_rerun_converges_without_new_writes() {
    let (catalog, engine) = create_engine();
    let proposals = vec![ProposedEdge::new("RawOrders", "CleanOrders")
        .with_mappings(vec![ColumnMapping::new("id", "id")])];

    let first = engine
        .materialize_lineage(WORKSPACE, proposals.clone(), MaterializeMode::Direct)
        .await
        .unwrap();
    assert!(first.total_created() > 0);
    let relationships_after_first = catalog.relationship_count();

    let second = engine
        .materialize_lineage(WORKSPACE, proposals, MaterializeMode::Direct)
        .await
        .unwrap();

    assert_eq!(second.total_created(), 0);
    assert_eq!(second.total_already_existed(), first.total_created());
    assert_eq!(second.total_failed(), 0);
    assert_eq!(catalog.relationship_count(), relationships_after_first);
}

#[tokio::test]
async fn test_case_insensitive_match_and_duplicate_drop() {
    let (catalog, engine) = create_engine();
    // Same edge three times under different casings plus one bad endpoint.
    let proposals = vec![
        ProposedEdge::new("rawORDERS", "cleanorders"),
        ProposedEdge::new("RawOrders", "CleanOrders"),
        ProposedEdge::new("RAWORDERS", "CLEANORDERS"),
        ProposedEdge::new("RawOrders", "Nowhere"),
    ];

    let summary = engine
        .materialize_lineage(WORKSPACE, proposals, MaterializeMode::Direct)
        .await
        .unwrap();

    assert_eq!(summary.edges.len(), 1);
    assert_eq!(summary.duplicates_dropped, 2);
    assert_eq!(summary.invalid.len(), 1);
    assert_eq!(summary.invalid[0].reason, InvalidReason::TargetNotFound);
    // Canonical casing was restored from the catalog.
    assert_eq!(summary.edges[0].source_name, "RawOrders");
    assert_eq!(
        catalog.relationship_count_of_type("direct_lineage_dataset_dataset"),
        1
    );
}

#[tokio::test]
async fn test_reconcile_from_suggestion_source() {
    let (catalog, engine) = create_engine();
    let source = CannedSource {
        batch: SuggestionBatch {
            lineage_mappings: vec![
                UntrustedSuggestion {
                    source_table_name: "raworders".into(),
                    target_table_name: "CleanOrders".into(),
                    // Claimed guids are ignored; names are re-resolved.
                    source_table_guid: "bogus-guid".into(),
                    column_mappings: vec![ColumnMapping::new("id", "id")],
                    ..Default::default()
                },
                UntrustedSuggestion {
                    source_table_name: "CleanOrders".into(),
                    target_table_name: "Report".into(),
                    ..Default::default()
                },
            ],
        },
    };

    let summary = engine
        .reconcile(WORKSPACE, &source, MaterializeMode::ViaProcess)
        .await
        .unwrap();

    assert_eq!(summary.edges.len(), 2);
    assert_eq!(summary.total_failed(), 0);
    assert_eq!(catalog.entity_count_of_type("Process"), 2);
    assert_eq!(
        catalog.relationship_count_of_type("dataset_process_inputs"),
        2
    );
    assert_eq!(
        catalog.relationship_count_of_type("process_dataset_outputs"),
        2
    );
}

#[tokio::test]
async fn test_reconcile_empty_batch_is_empty_success() {
    let (catalog, engine) = create_engine();
    let source = CannedSource {
        batch: SuggestionBatch::default(),
    };

    let summary = engine
        .reconcile(WORKSPACE, &source, MaterializeMode::Direct)
        .await
        .unwrap();
    assert!(summary.edges.is_empty());
    assert_eq!(catalog.relationship_count(), 0);
}

#[tokio::test]
async fn test_delete_lineage_spares_assets_and_columns() {
    let (catalog, engine) = create_engine();
    let proposals = vec![
        ProposedEdge::new("RawOrders", "CleanOrders")
            .with_mappings(vec![ColumnMapping::new("id", "id")]),
        ProposedEdge::new("CleanOrders", "Report").via_process("Publish"),
    ];
    engine
        .materialize_lineage(WORKSPACE, proposals, MaterializeMode::Direct)
        .await
        .unwrap();
    assert!(catalog.relationship_count() > 0);

    let deletion = engine.delete_lineage(WORKSPACE).await.unwrap();

    assert!(deletion.table_relationships_deleted > 0);
    assert!(deletion.column_relationships_deleted > 0);
    assert!(deletion.errors.is_empty());
    assert_eq!(catalog.relationship_count(), 0);
    // Assets, their schemas, and the placeholder columns all survive.
    for guid in ["t-raw", "t-clean", "t-report"] {
        assert!(catalog.get_entity(guid).await.is_ok());
    }
    assert!(catalog.table_columns("t-raw").await.unwrap().len() >= 2);
    // The process entity also survives this operation; sweep handles it.
    assert_eq!(catalog.entity_count_of_type("Process"), 1);
}

#[tokio::test]
async fn test_sweep_removes_engine_processes() {
    let (catalog, engine) = create_engine();
    engine
        .materialize_lineage(
            WORKSPACE,
            vec![ProposedEdge::new("RawOrders", "CleanOrders").via_process("Load")],
            MaterializeMode::Direct,
        )
        .await
        .unwrap();
    assert_eq!(catalog.entity_count_of_type("Process"), 1);

    let swept = engine.sweep_processes(WORKSPACE).await.unwrap();
    assert_eq!(swept.processes_deleted, 1);
    assert_eq!(catalog.entity_count_of_type("Process"), 0);
    // The process's relationships cascaded away with it.
    assert_eq!(
        catalog.relationship_count_of_type("dataset_process_inputs"),
        0
    );

    // A second sweep finds nothing and succeeds.
    let again = engine.sweep_processes(WORKSPACE).await.unwrap();
    assert_eq!(again.processes_deleted, 0);
}

#[tokio::test]
async fn test_delete_process_by_guid_reports_summary() {
    let (catalog, engine) = create_engine();
    let batch = engine
        .materialize_lineage(
            WORKSPACE,
            vec![ProposedEdge::new("RawOrders", "CleanOrders").via_process("Load")],
            MaterializeMode::Direct,
        )
        .await
        .unwrap();
    let guid = batch.edges[0].process_guid.clone().unwrap();

    let deleted = engine.delete_process(&guid).await;
    assert_eq!(deleted.processes_deleted, 1);
    assert!(deleted.errors.is_empty());
    assert_eq!(catalog.entity_count_of_type("Process"), 0);

    // Deleting again reports nothing removed rather than failing.
    let repeat = engine.delete_process(&guid).await;
    assert_eq!(repeat.processes_deleted, 0);
    assert!(repeat.errors.is_empty());
}

#[tokio::test]
async fn test_inventory_scope_excludes_foreign_workspaces() {
    let catalog = Arc::new(MockCatalog::new());
    catalog.add_table("t1", "Mine", &qname("Mine"), &[]);
    catalog.add_table(
        "t2",
        "Theirs",
        "https://host/groups/ws-2/lakehouses/lh/tables/Theirs",
        &[],
    );

    let inventory = AssetInventory::resolve(catalog.as_ref(), "groups/ws-1/")
        .await
        .unwrap();
    assert_eq!(inventory.len(), 1);
    assert!(inventory.lookup("mine").is_some());
    assert!(inventory.lookup("theirs").is_none());
}
