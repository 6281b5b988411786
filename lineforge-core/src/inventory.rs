//! Asset inventory resolution.
//!
//! Builds the scoped name -> identity lookup that validation resolves
//! against, from the flattened catalog asset stream. Also provides the
//! bounded-concurrent schema fan-out used to enrich tables with their
//! column lists.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::catalog::Catalog;
use crate::error::{CatalogError, EdgeError, LineageError, Result};
use crate::types::{AssetIdentity, AssetKind, ColumnIdentity};

/// Qualified-name fragments that never name a lineage endpoint.
const SKIP_PATH_FRAGMENTS: &[&str] = &["/columns/", "/fields/", "/meta/"];

/// A scoped lookup from case-insensitive asset name to resolved identity.
#[derive(Debug, Clone)]
pub struct AssetInventory {
    scope_marker: String,
    by_name: HashMap<String, AssetIdentity>,
}

impl AssetInventory {
    /// Resolve the inventory for one workspace scope from the asset stream.
    ///
    /// Assets qualify when their qualified name contains the scope marker.
    /// Folder objects and column/field/meta sub-paths are skipped. Two assets
    /// sharing a case-insensitive name resolve keep-last, with a warning;
    /// an accepted ambiguity rather than a silent drop.
    pub async fn resolve(catalog: &dyn Catalog, scope_marker: &str) -> Result<Self> {
        let assets = catalog.list_assets().await?;
        if assets.is_empty() {
            return Err(LineageError::NotFound {
                what: "catalog asset stream".into(),
            });
        }

        let mut by_name: HashMap<String, AssetIdentity> = HashMap::new();
        for asset in &assets {
            if !asset.qualified_name.contains(scope_marker) {
                continue;
            }
            if asset.object_type.eq_ignore_ascii_case("folders") {
                continue;
            }
            let qname_lower = asset.qualified_name.to_ascii_lowercase();
            if SKIP_PATH_FRAGMENTS.iter().any(|f| qname_lower.contains(f)) {
                continue;
            }
            if asset.name.is_empty() {
                continue;
            }

            let identity = AssetIdentity {
                guid: asset.guid.clone(),
                canonical_name: asset.name.clone(),
                qualified_name: asset.qualified_name.clone(),
                kind: AssetKind::classify(&asset.object_type, &asset.qualified_name),
            };
            let key = asset.name.to_lowercase();
            if let Some(previous) = by_name.insert(key, identity) {
                warn!(
                    name = %asset.name,
                    kept = %asset.guid,
                    dropped = %previous.guid,
                    "case-insensitive name collision in inventory, keeping last"
                );
            }
        }

        debug!(
            scope = %scope_marker,
            assets = by_name.len(),
            "resolved asset inventory"
        );
        Ok(Self {
            scope_marker: scope_marker.to_string(),
            by_name,
        })
    }

    /// Case-insensitive lookup by asset name.
    pub fn lookup(&self, name: &str) -> Option<&AssetIdentity> {
        self.by_name.get(&name.to_lowercase())
    }

    /// All canonical asset names, sorted, for diagnostics.
    pub fn known_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .by_name
            .values()
            .map(|a| a.canonical_name.clone())
            .collect();
        names.sort();
        names
    }

    /// Identities of all tables and files, the viable lineage endpoints.
    pub fn lineage_endpoints(&self) -> Vec<AssetIdentity> {
        let mut endpoints: Vec<AssetIdentity> = self
            .by_name
            .values()
            .filter(|a| matches!(a.kind, AssetKind::Table | AssetKind::File))
            .cloned()
            .collect();
        endpoints.sort_by(|a, b| a.canonical_name.cmp(&b.canonical_name));
        endpoints
    }

    pub fn scope_marker(&self) -> &str {
        &self.scope_marker
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AssetIdentity> {
        self.by_name.values()
    }
}

/// Outcome of one table's schema lookup in a fan-out.
#[derive(Debug)]
pub struct SchemaFetch {
    pub table: AssetIdentity,
    pub result: std::result::Result<Vec<ColumnIdentity>, EdgeError>,
}

/// Fetch column schemas for many tables through a bounded worker pool.
///
/// Schema lookups are independent and read-only, so they fan out
/// concurrently, unlike edge materialization, which stays sequential.
/// Each lookup carries its own timeout; a timed-out or failed item is
/// reported in its own `SchemaFetch` and never aborts the batch.
pub async fn fetch_schemas(
    catalog: Arc<dyn Catalog>,
    tables: Vec<AssetIdentity>,
    max_concurrent: usize,
    timeout_secs: u64,
) -> Vec<SchemaFetch> {
    let semaphore = Arc::new(tokio::sync::Semaphore::new(max_concurrent.max(1)));
    let mut handles = Vec::with_capacity(tables.len());

    for table in tables {
        let catalog = catalog.clone();
        let sem = semaphore.clone();

        let handle = tokio::spawn(async move {
            let _permit = match sem.acquire().await {
                Ok(permit) => permit,
                Err(_) => {
                    return SchemaFetch {
                        table,
                        result: Err(EdgeError::Catalog(CatalogError::Connection {
                            message: "schema worker pool closed".into(),
                        })),
                    }
                }
            };

            let result = match tokio::time::timeout(
                Duration::from_secs(timeout_secs),
                catalog.table_columns(&table.guid),
            )
            .await
            {
                Ok(Ok(columns)) => Ok(columns),
                Ok(Err(e)) => Err(EdgeError::Catalog(e)),
                Err(_) => Err(EdgeError::Timeout { timeout_secs }),
            };
            SchemaFetch { table, result }
        });
        handles.push(handle);
    }

    let mut fetches = Vec::with_capacity(handles.len());
    for handle in handles {
        if let Ok(fetch) = handle.await {
            fetches.push(fetch);
        }
    }
    fetches
}
