//! # Lineforge Core
//!
//! Core library for the Lineforge lineage reconciliation engine.
//! Resolves a workspace's asset inventory from a metadata catalog, validates
//! externally proposed lineage edges against it, completes their column
//! mappings, and materializes the result as a lineage graph of relationships
//! and process entities. Also provides the inverse: scoped deletion of
//! lineage artifacts without ever touching the assets themselves.

pub mod catalog;
pub mod config;
pub mod deletion;
pub mod engine;
pub mod error;
pub mod inventory;
pub mod mapping;
pub mod materialize;
pub mod qualified_name;
pub mod rest_catalog;
pub mod suggest;
pub mod types;
pub mod validate;

// Re-export commonly used types at the crate root.
pub use catalog::{
    AssetRecord, Catalog, EndpointRef, EntityDraft, EntityRecord, MockCatalog, RelationshipDraft,
    RelationshipRef,
};
pub use config::{CatalogConfig, EngineConfig, LineforgeConfig};
pub use deletion::Deleter;
pub use engine::LineageEngine;
pub use error::{CatalogError, ConfigError, EdgeError, LineageError, Result};
pub use inventory::{fetch_schemas, AssetInventory, SchemaFetch};
pub use mapping::complete_column_mappings;
pub use materialize::Materializer;
pub use qualified_name::{ParsedQualifiedName, ResourceKind};
pub use rest_catalog::RestCatalog;
pub use suggest::{
    decode_suggestion_payload, DigestAsset, InventoryDigest, SuggestionBatch, SuggestionSource,
    UntrustedSuggestion,
};
pub use types::{
    AssetIdentity, AssetKind, BatchSummary, ColumnIdentity, ColumnMapping, DeletionSummary,
    EdgeSummary, InvalidEdge, InvalidReason, LineageKind, MaterializeMode, PlaceholderSide,
    ProcessRef, ProposedEdge, ValidatedEdge, PROCESS_QNAME_PREFIX,
};
pub use validate::{dedup_edges, validate_edges, DedupOutcome, ValidationOutcome};
