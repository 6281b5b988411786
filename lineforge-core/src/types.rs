//! Core type definitions for the Lineforge engine.
//!
//! Defines the data model that flows through the reconciliation pipeline:
//! asset identities, proposed and validated edges, column mappings,
//! lineage relationship kinds, and the per-call summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EdgeError;

/// Scheme prefix of every process entity qualified name this engine creates.
///
/// Deterministic so that the process sweep can recognize its own artifacts.
pub const PROCESS_QNAME_PREFIX: &str = "lineage-process://";

/// The kind of a cataloged asset, derived from the catalog's object type
/// string and qualified-name patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Table,
    File,
    Lakehouse,
    Warehouse,
    Dataflow,
    Pipeline,
    Notebook,
    Process,
    Column,
    Other,
}

impl AssetKind {
    /// Classify an asset from its catalog object type and qualified name.
    pub fn classify(object_type: &str, qualified_name: &str) -> Self {
        let object_type = object_type.trim().to_ascii_lowercase();
        let qname = qualified_name.to_ascii_lowercase();

        if object_type.contains("table") || object_type.contains("dataset") {
            AssetKind::Table
        } else if object_type.contains("file")
            || [".csv", ".parquet", ".json", ".txt", ".avro"]
                .iter()
                .any(|ext| qname.ends_with(ext))
        {
            AssetKind::File
        } else if object_type.contains("notebook") || qname.contains("/notebooks/") {
            AssetKind::Notebook
        } else if object_type.contains("warehouse") || qname.contains("/warehouses/") {
            AssetKind::Warehouse
        } else if object_type.contains("dataflow") || qname.contains("/dataflows/") {
            AssetKind::Dataflow
        } else if object_type.contains("pipeline") || qname.contains("/pipelines/") {
            AssetKind::Pipeline
        } else if object_type.contains("process") {
            AssetKind::Process
        } else if object_type.contains("column") {
            AssetKind::Column
        } else if qname.contains("/lakehouses/") && !qname.contains("/tables/") {
            AssetKind::Lakehouse
        } else {
            AssetKind::Other
        }
    }
}

impl std::fmt::Display for AssetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AssetKind::Table => "table",
            AssetKind::File => "file",
            AssetKind::Lakehouse => "lakehouse",
            AssetKind::Warehouse => "warehouse",
            AssetKind::Dataflow => "dataflow",
            AssetKind::Pipeline => "pipeline",
            AssetKind::Notebook => "notebook",
            AssetKind::Process => "process",
            AssetKind::Column => "column",
            AssetKind::Other => "other",
        };
        write!(f, "{name}")
    }
}

/// The resolved identity of a cataloged asset. Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetIdentity {
    pub guid: String,
    /// Canonical display name as recorded in the catalog (authoritative casing).
    pub canonical_name: String,
    pub qualified_name: String,
    pub kind: AssetKind,
}

/// A column identity as returned by schema lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnIdentity {
    pub guid: String,
    pub name: String,
    pub qualified_name: String,
    #[serde(default)]
    pub data_type: String,
}

/// A single source-to-target column mapping.
///
/// An empty string on either side denotes "unmapped", wire compatible with
/// the suggestion payloads, which use `""` rather than omission.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ColumnMapping {
    #[serde(default)]
    pub source_column: String,
    #[serde(default)]
    pub target_column: String,
}

impl ColumnMapping {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source_column: source.into(),
            target_column: target.into(),
        }
    }

    pub fn has_source(&self) -> bool {
        !self.source_column.is_empty()
    }

    pub fn has_target(&self) -> bool {
        !self.target_column.is_empty()
    }

    /// Both sides empty: carries no information at all.
    pub fn is_empty(&self) -> bool {
        !self.has_source() && !self.has_target()
    }
}

/// An untrusted, externally supplied lineage proposal between two named assets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedEdge {
    pub source_name: String,
    pub target_name: String,
    #[serde(default)]
    pub column_mappings: Vec<ColumnMapping>,
    #[serde(default)]
    pub process_name: Option<String>,
    #[serde(default)]
    pub use_process: bool,
}

impl ProposedEdge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source_name: source.into(),
            target_name: target.into(),
            column_mappings: Vec::new(),
            process_name: None,
            use_process: false,
        }
    }

    pub fn with_mappings(mut self, mappings: Vec<ColumnMapping>) -> Self {
        self.column_mappings = mappings;
        self
    }

    pub fn via_process(mut self, process_name: impl Into<String>) -> Self {
        self.process_name = Some(process_name.into());
        self.use_process = true;
        self
    }
}

/// Why a proposed edge failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InvalidReason {
    SourceNotFound,
    TargetNotFound,
    BothNotFound,
}

impl std::fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidReason::SourceNotFound => write!(f, "source-not-found"),
            InvalidReason::TargetNotFound => write!(f, "target-not-found"),
            InvalidReason::BothNotFound => write!(f, "both"),
        }
    }
}

/// A proposed edge that resolved against the inventory.
///
/// Names have been rewritten to the catalog's canonical casing and both
/// endpoints carry their resolved identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedEdge {
    pub edge: ProposedEdge,
    pub source: AssetIdentity,
    pub target: AssetIdentity,
}

/// A proposed edge rejected by validation, tagged with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidEdge {
    pub edge: ProposedEdge,
    pub reason: InvalidReason,
}

/// Lineage relationship kinds and their catalog wire names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineageKind {
    /// Direct asset-to-asset flow.
    FeedsInto,
    /// Asset feeding into a process entity.
    HasInput,
    /// Process entity producing an asset.
    ProducesOutput,
    /// Column-to-column flow.
    ColumnFeedsInto,
}

impl LineageKind {
    /// The relationship type name used on the catalog wire.
    pub fn wire_name(&self) -> &'static str {
        match self {
            LineageKind::FeedsInto => "direct_lineage_dataset_dataset",
            LineageKind::HasInput => "dataset_process_inputs",
            LineageKind::ProducesOutput => "process_dataset_outputs",
            LineageKind::ColumnFeedsInto => "column_lineage",
        }
    }
}

/// How a validated edge is written into the catalog graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterializeMode {
    /// One `FeedsInto` relationship between the two assets.
    Direct,
    /// Source -> process entity -> target, three fail-fast steps.
    ViaProcess,
}

/// A reference to a process entity created (or derived) by the materializer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRef {
    /// Assigned by the catalog on creation; `None` until then.
    pub guid: Option<String>,
    pub name: String,
    pub qualified_name: String,
}

impl ProcessRef {
    /// Derive the deterministic qualified name for a process between two assets.
    ///
    /// Spaces in the process name become underscores; the last path segment of
    /// each endpoint's qualified name anchors the process to its edge, so the
    /// same (source, target, name) triple always derives the same identity.
    pub fn derive(process_name: &str, source_qname: &str, target_qname: &str) -> Self {
        let leaf = |qname: &str| {
            qname
                .trim_end_matches('/')
                .rsplit('/')
                .next()
                .unwrap_or(qname)
                .to_string()
        };
        let qualified_name = format!(
            "{}{}_{}_to_{}",
            PROCESS_QNAME_PREFIX,
            process_name.replace(' ', "_"),
            leaf(source_qname),
            leaf(target_qname),
        );
        Self {
            guid: None,
            name: process_name.to_string(),
            qualified_name,
        }
    }
}

/// Which side of a mapping a placeholder column stands in for.
///
/// Placeholder columns are sentinel entities created lazily under a table when
/// a mapping entry is missing one endpoint. They are cached per
/// materialization call and are never garbage-collected by the deletion
/// manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceholderSide {
    Source,
    Target,
}

impl PlaceholderSide {
    /// Display name of the placeholder column entity.
    pub fn column_name(&self) -> &'static str {
        match self {
            PlaceholderSide::Source => "Unmapped (Source)",
            PlaceholderSide::Target => "Unmapped (Target)",
        }
    }

    /// Suffix appended to the parent table's qualified name.
    pub fn qname_suffix(&self) -> &'static str {
        match self {
            PlaceholderSide::Source => "#Unmapped_Source",
            PlaceholderSide::Target => "#Unmapped_Target",
        }
    }
}

/// Per-edge materialization outcome.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EdgeSummary {
    pub source_name: String,
    pub target_name: String,
    /// Relationships (and process entities) newly created.
    pub created: usize,
    /// Creations answered with the "already exists" conflict signal.
    pub already_existed: usize,
    /// Operations that failed outright.
    pub failed: usize,
    /// Column-mapping entries skipped (missing column, placeholder failure).
    pub skipped_columns: usize,
    /// Guid of the process entity, when the edge was mediated.
    pub process_guid: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl EdgeSummary {
    pub fn for_edge(edge: &ValidatedEdge) -> Self {
        Self {
            source_name: edge.source.canonical_name.clone(),
            target_name: edge.target.canonical_name.clone(),
            ..Default::default()
        }
    }

    pub fn record_error(&mut self, err: &EdgeError) {
        self.failed += 1;
        self.errors.push(err.to_string());
    }
}

/// Outcome of a whole materialization request.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    /// Correlation id for logs spanning one request.
    pub batch_id: uuid::Uuid,
    pub edges: Vec<EdgeSummary>,
    pub invalid: Vec<InvalidEdge>,
    pub duplicates_dropped: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchSummary {
    pub fn total_created(&self) -> usize {
        self.edges.iter().map(|e| e.created).sum()
    }

    pub fn total_already_existed(&self) -> usize {
        self.edges.iter().map(|e| e.already_existed).sum()
    }

    pub fn total_failed(&self) -> usize {
        self.edges.iter().map(|e| e.failed).sum()
    }
}

/// Outcome of a deletion operation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeletionSummary {
    /// Process entities deleted (including idempotent "already deleted" hits).
    pub processes_deleted: usize,
    /// Table-level lineage relationships deleted.
    pub table_relationships_deleted: usize,
    /// Column-level lineage relationships deleted.
    pub column_relationships_deleted: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl DeletionSummary {
    pub fn total_deleted(&self) -> usize {
        self.processes_deleted + self.table_relationships_deleted + self.column_relationships_deleted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_by_object_type() {
        assert_eq!(AssetKind::classify("Tables", "any"), AssetKind::Table);
        assert_eq!(AssetKind::classify("dataset", "any"), AssetKind::Table);
        assert_eq!(
            AssetKind::classify("", "https://host/x/Transactions.csv"),
            AssetKind::File
        );
        assert_eq!(
            AssetKind::classify("", "https://host/groups/w/notebooks/NB1"),
            AssetKind::Notebook
        );
    }

    #[test]
    fn test_classify_lakehouse_excludes_nested_tables() {
        assert_eq!(
            AssetKind::classify("", "https://host/groups/w/lakehouses/lh1"),
            AssetKind::Lakehouse
        );
        assert_eq!(
            AssetKind::classify("", "https://host/groups/w/lakehouses/lh1/tables/orders"),
            AssetKind::Other
        );
    }

    #[test]
    fn test_process_qname_is_deterministic() {
        let a = ProcessRef::derive("Load Orders", "https://h/groups/w/tables/raw", "https://h/groups/w/tables/clean");
        let b = ProcessRef::derive("Load Orders", "https://h/groups/w/tables/raw", "https://h/groups/w/tables/clean");
        assert_eq!(a.qualified_name, b.qualified_name);
        assert_eq!(
            a.qualified_name,
            "lineage-process://Load_Orders_raw_to_clean"
        );
        assert!(a.qualified_name.starts_with(PROCESS_QNAME_PREFIX));
    }

    #[test]
    fn test_lineage_kind_wire_names() {
        assert_eq!(LineageKind::FeedsInto.wire_name(), "direct_lineage_dataset_dataset");
        assert_eq!(LineageKind::HasInput.wire_name(), "dataset_process_inputs");
        assert_eq!(LineageKind::ProducesOutput.wire_name(), "process_dataset_outputs");
        assert_eq!(LineageKind::ColumnFeedsInto.wire_name(), "column_lineage");
    }

    #[test]
    fn test_column_mapping_sides() {
        let m = ColumnMapping::new("id", "");
        assert!(m.has_source());
        assert!(!m.has_target());
        assert!(!m.is_empty());
        assert!(ColumnMapping::default().is_empty());
    }

    #[test]
    fn test_invalid_reason_display() {
        assert_eq!(InvalidReason::SourceNotFound.to_string(), "source-not-found");
        assert_eq!(InvalidReason::BothNotFound.to_string(), "both");
    }

    #[test]
    fn test_edge_summary_serialization_elides_empty_errors() {
        let mut summary = EdgeSummary {
            source_name: "Raw".into(),
            target_name: "Clean".into(),
            created: 2,
            ..Default::default()
        };
        let clean = serde_json::to_value(&summary).unwrap();
        assert!(clean.get("errors").is_none());

        summary.errors.push("boom".into());
        let failed = serde_json::to_value(&summary).unwrap();
        assert_eq!(failed["errors"][0], "boom");
    }

    #[test]
    fn test_placeholder_side_naming() {
        assert_eq!(PlaceholderSide::Source.column_name(), "Unmapped (Source)");
        assert_eq!(PlaceholderSide::Target.qname_suffix(), "#Unmapped_Target");
    }
}
