//! Typed parser for path-like qualified names.
//!
//! Catalog assets carry URL-shaped qualified names such as
//! `https://app.example.com/groups/{workspace}/lakehouses/{store}/tables/orders`.
//! This module recovers workspace/store identifiers and the trailing resource
//! from that path without any network coupling, so it can be unit tested in
//! isolation.

use serde::{Deserialize, Serialize};

/// The trailing resource segment of a qualified name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Table,
    Lakehouse,
    Warehouse,
    Notebook,
    Pipeline,
    Dataflow,
    File,
}

/// Structured view of a parsed qualified name.
///
/// Any field may be absent: qualified names outside the expected shape parse
/// into a mostly-empty result rather than an error, mirroring how the catalog
/// itself tolerates free-form paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedQualifiedName {
    /// First GUID segment in the path: the workspace.
    pub workspace_id: Option<String>,
    /// Second GUID segment: the containing store (lakehouse, warehouse, ...).
    pub store_id: Option<String>,
    pub resource_kind: Option<ResourceKind>,
    pub resource_name: Option<String>,
}

/// Whether a path segment looks like a GUID (8-4-4-4-12 hex groups).
fn is_guid(segment: &str) -> bool {
    if segment.len() != 36 {
        return false;
    }
    let dash_positions = [8, 13, 18, 23];
    segment.char_indices().all(|(i, c)| {
        if dash_positions.contains(&i) {
            c == '-'
        } else {
            c.is_ascii_hexdigit()
        }
    })
}

/// Extract the resource name following a marker segment like `tables/`.
///
/// `trailing` controls whether everything after the marker is the name
/// (tables, notebooks) or only the next segment (lakehouses, which may have
/// nested content).
fn name_after(qname: &str, marker: &str, trailing: bool) -> Option<String> {
    let lower = qname.to_ascii_lowercase();
    let idx = lower.rfind(marker)?;
    let rest = &qname[idx + marker.len()..];
    let name = if trailing {
        rest.trim_matches('/')
    } else {
        rest.split('/').next().unwrap_or("")
    };
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Parse a qualified name into its typed parts.
pub fn parse(qualified_name: &str) -> ParsedQualifiedName {
    let mut workspace_id = None;
    let mut store_id = None;

    for segment in qualified_name.split('/') {
        if is_guid(segment) {
            if workspace_id.is_none() {
                workspace_id = Some(segment.to_string());
            } else if store_id.is_none() {
                store_id = Some(segment.to_string());
                break;
            }
        }
    }

    // Most specific marker first: a table path also contains "lakehouses/".
    let (resource_kind, resource_name) =
        if let Some(name) = name_after(qualified_name, "tables/", true) {
            (Some(ResourceKind::Table), Some(name))
        } else if let Some(name) = name_after(qualified_name, "notebooks/", true) {
            (Some(ResourceKind::Notebook), Some(name))
        } else if let Some(name) = name_after(qualified_name, "pipelines/", true) {
            (Some(ResourceKind::Pipeline), Some(name))
        } else if let Some(name) = name_after(qualified_name, "dataflows/", true) {
            (Some(ResourceKind::Dataflow), Some(name))
        } else if let Some(name) = name_after(qualified_name, "warehouses/", false) {
            (Some(ResourceKind::Warehouse), Some(name))
        } else if let Some(name) = name_after(qualified_name, "lakehouses/", false) {
            (Some(ResourceKind::Lakehouse), Some(name))
        } else if let Some(name) = file_name(qualified_name) {
            (Some(ResourceKind::File), Some(name))
        } else {
            (None, None)
        };

    ParsedQualifiedName {
        workspace_id,
        store_id,
        resource_kind,
        resource_name,
    }
}

fn file_name(qname: &str) -> Option<String> {
    let leaf = qname.trim_end_matches('/').rsplit('/').next()?;
    let lower = leaf.to_ascii_lowercase();
    let is_file = [".csv", ".parquet", ".json", ".txt", ".avro"]
        .iter()
        .any(|ext| lower.ends_with(ext));
    if is_file {
        Some(leaf.to_string())
    } else {
        None
    }
}
