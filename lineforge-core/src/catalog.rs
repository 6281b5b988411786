//! The catalog client seam.
//!
//! Defines the `Catalog` trait through which every component talks to the
//! metadata catalog (entity CRUD, relationship CRUD, schema lookup, and the
//! flattened asset stream) plus the wire record types shared by all
//! implementations. The REST implementation lives in `rest_catalog`; a fully
//! functional in-memory `MockCatalog` is exported here for tests and
//! development.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::CatalogError;
use crate::types::{ColumnIdentity, LineageKind};

/// One record from the flattened catalog asset stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub guid: String,
    pub name: String,
    #[serde(rename = "qualifiedName")]
    pub qualified_name: String,
    #[serde(rename = "objectType", default)]
    pub object_type: String,
}

/// A stored entity as returned by point lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub guid: String,
    pub type_name: String,
    pub name: String,
    pub qualified_name: String,
}

/// A relationship reference as listed on an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipRef {
    pub relationship_guid: String,
    pub relationship_type: String,
}

/// One endpoint of a relationship or process input/output.
///
/// Guid references are preferred wherever the guid is known: unique-attribute
/// references can silently create a new entity when the qualified name does
/// not match an existing record exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum EndpointRef {
    Guid { type_name: String, guid: String },
    QualifiedName { type_name: String, qualified_name: String },
}

impl EndpointRef {
    pub fn guid(type_name: impl Into<String>, guid: impl Into<String>) -> Self {
        EndpointRef::Guid {
            type_name: type_name.into(),
            guid: guid.into(),
        }
    }

    pub fn qualified_name(type_name: impl Into<String>, qname: impl Into<String>) -> Self {
        EndpointRef::QualifiedName {
            type_name: type_name.into(),
            qualified_name: qname.into(),
        }
    }

    /// Stable key used for duplicate detection.
    pub fn key(&self) -> String {
        match self {
            EndpointRef::Guid { guid, .. } => format!("guid:{guid}"),
            EndpointRef::QualifiedName { qualified_name, .. } => format!("qname:{qualified_name}"),
        }
    }
}

/// A new entity to be created in the catalog.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EntityDraft {
    pub type_name: String,
    pub name: String,
    pub qualified_name: String,
    /// Extra flat attributes (e.g. `columnMapping`, `type`).
    pub attributes: serde_json::Map<String, serde_json::Value>,
    /// Input endpoints, for process entities.
    pub inputs: Vec<EndpointRef>,
    /// Output endpoints, for process entities.
    pub outputs: Vec<EndpointRef>,
    /// Parent table reference, for column entities.
    pub parent_table: Option<EndpointRef>,
}

/// A new relationship to be created in the catalog.
#[derive(Debug, Clone, Serialize)]
pub struct RelationshipDraft {
    pub kind: LineageKind,
    pub end1: EndpointRef,
    pub end2: EndpointRef,
    /// Optional relationship attributes (e.g. the serialized column-mapping
    /// list carried on a direct asset-to-asset edge).
    pub attributes: Option<serde_json::Value>,
}

impl RelationshipDraft {
    pub fn new(kind: LineageKind, end1: EndpointRef, end2: EndpointRef) -> Self {
        Self {
            kind,
            end1,
            end2,
            attributes: None,
        }
    }

    pub fn with_attributes(mut self, attributes: serde_json::Value) -> Self {
        self.attributes = Some(attributes);
        self
    }
}

/// Narrow interface to the metadata catalog.
///
/// All calls are fallible and bounded; `Conflict` / `NotFound` are typed
/// signals the engine relies on (see `CatalogError`).
#[async_trait]
pub trait Catalog: Send + Sync {
    /// The full flattened asset stream (pagination handled by the collaborator).
    async fn list_assets(&self) -> Result<Vec<AssetRecord>, CatalogError>;

    /// Point lookup of an entity by guid.
    async fn get_entity(&self, guid: &str) -> Result<EntityRecord, CatalogError>;

    /// Create an entity; returns the catalog-assigned guid.
    ///
    /// A duplicate qualified name yields `CatalogError::Conflict`.
    async fn create_entity(&self, draft: EntityDraft) -> Result<String, CatalogError>;

    /// Delete an entity by guid. Missing entities yield `CatalogError::NotFound`.
    async fn delete_entity(&self, guid: &str) -> Result<(), CatalogError>;

    /// Create a relationship; returns the assigned relationship guid.
    ///
    /// A duplicate (kind, end1, end2) triple yields `CatalogError::Conflict`.
    async fn create_relationship(&self, draft: RelationshipDraft) -> Result<String, CatalogError>;

    /// Delete a relationship by guid.
    async fn delete_relationship(&self, guid: &str) -> Result<(), CatalogError>;

    /// Schema lookup: the column identities of a table entity.
    async fn table_columns(&self, table_guid: &str) -> Result<Vec<ColumnIdentity>, CatalogError>;

    /// All relationship references attached to an entity.
    async fn entity_relationships(&self, guid: &str)
        -> Result<Vec<RelationshipRef>, CatalogError>;

    /// Entities reachable in the lineage graph around an asset, up to `depth`.
    async fn lineage_graph(
        &self,
        guid: &str,
        depth: u32,
    ) -> Result<Vec<EntityRecord>, CatalogError>;
}

/// An in-memory catalog for testing and development.
///
/// Implements the complete trait semantics: guid assignment on create,
/// duplicate detection by qualified name and by relationship triple, cascade
/// deletion of an entity's relationships, and a mutation log for assertions.
pub struct MockCatalog {
    state: Mutex<MockState>,
}

#[derive(Default)]
struct MockState {
    assets: Vec<AssetRecord>,
    entities: HashMap<String, EntityRecord>,
    /// table guid -> columns
    columns: HashMap<String, Vec<ColumnIdentity>>,
    relationships: HashMap<String, StoredRelationship>,
    next_id: u64,
    /// Human-readable log of mutations, in order.
    log: Vec<String>,
}

#[derive(Debug, Clone)]
struct StoredRelationship {
    guid: String,
    type_name: String,
    end1_key: String,
    end2_key: String,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
        }
    }

    fn next_guid(state: &mut MockState, prefix: &str) -> String {
        state.next_id += 1;
        format!("{prefix}-{:04}", state.next_id)
    }

    /// Register an asset in the stream and as a stored entity.
    pub fn add_asset(&self, guid: &str, name: &str, qualified_name: &str, object_type: &str) {
        let mut state = self.state.lock().unwrap();
        state.assets.push(AssetRecord {
            guid: guid.to_string(),
            name: name.to_string(),
            qualified_name: qualified_name.to_string(),
            object_type: object_type.to_string(),
        });
        state.entities.insert(
            guid.to_string(),
            EntityRecord {
                guid: guid.to_string(),
                type_name: "DataSet".to_string(),
                name: name.to_string(),
                qualified_name: qualified_name.to_string(),
            },
        );
    }

    /// Register a table asset together with its column schema.
    pub fn add_table(&self, guid: &str, name: &str, qualified_name: &str, columns: &[&str]) {
        self.add_asset(guid, name, qualified_name, "table");
        let mut state = self.state.lock().unwrap();
        let identities = columns
            .iter()
            .enumerate()
            .map(|(i, col)| ColumnIdentity {
                guid: format!("{guid}-col-{i}"),
                name: col.to_string(),
                qualified_name: format!("{qualified_name}#{col}"),
                data_type: "string".to_string(),
            })
            .collect::<Vec<_>>();
        for col in &identities {
            state.entities.insert(
                col.guid.clone(),
                EntityRecord {
                    guid: col.guid.clone(),
                    type_name: "Column".to_string(),
                    name: col.name.clone(),
                    qualified_name: col.qualified_name.clone(),
                },
            );
        }
        state.columns.insert(guid.to_string(), identities);
    }

    /// Snapshot of the mutation log.
    pub fn mutation_log(&self) -> Vec<String> {
        self.state.lock().unwrap().log.clone()
    }

    /// Count of stored entities with the given type name.
    pub fn entity_count_of_type(&self, type_name: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .entities
            .values()
            .filter(|e| e.type_name == type_name)
            .count()
    }

    /// Count of stored relationships with the given type name.
    pub fn relationship_count_of_type(&self, type_name: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .relationships
            .values()
            .filter(|r| r.type_name == type_name)
            .count()
    }

    pub fn relationship_count(&self) -> usize {
        self.state.lock().unwrap().relationships.len()
    }

    fn resolve_endpoint_key(state: &MockState, endpoint: &EndpointRef) -> String {
        // Normalize qualified-name refs to guid keys when the entity exists,
        // so guid and qname references to the same entity collide as duplicates.
        if let EndpointRef::QualifiedName { qualified_name, .. } = endpoint {
            if let Some(entity) = state
                .entities
                .values()
                .find(|e| &e.qualified_name == qualified_name)
            {
                return format!("guid:{}", entity.guid);
            }
        }
        endpoint.key()
    }
}

impl Default for MockCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Catalog for MockCatalog {
    async fn list_assets(&self) -> Result<Vec<AssetRecord>, CatalogError> {
        Ok(self.state.lock().unwrap().assets.clone())
    }

    async fn get_entity(&self, guid: &str) -> Result<EntityRecord, CatalogError> {
        self.state
            .lock()
            .unwrap()
            .entities
            .get(guid)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound {
                what: format!("entity {guid}"),
            })
    }

    async fn create_entity(&self, draft: EntityDraft) -> Result<String, CatalogError> {
        let mut state = self.state.lock().unwrap();
        if state
            .entities
            .values()
            .any(|e| e.qualified_name == draft.qualified_name)
        {
            return Err(CatalogError::Conflict {
                what: format!("entity {}", draft.qualified_name),
            });
        }
        let guid = Self::next_guid(&mut state, "ent");
        state.entities.insert(
            guid.clone(),
            EntityRecord {
                guid: guid.clone(),
                type_name: draft.type_name.clone(),
                name: draft.name.clone(),
                qualified_name: draft.qualified_name.clone(),
            },
        );
        // Column entities become part of their parent table's schema.
        if let Some(EndpointRef::Guid { guid: table_guid, .. }) = &draft.parent_table {
            let column = ColumnIdentity {
                guid: guid.clone(),
                name: draft.name.clone(),
                qualified_name: draft.qualified_name.clone(),
                data_type: "string".to_string(),
            };
            state
                .columns
                .entry(table_guid.clone())
                .or_default()
                .push(column);
        }
        state
            .log
            .push(format!("create_entity {} {}", draft.type_name, draft.qualified_name));
        Ok(guid)
    }

    async fn delete_entity(&self, guid: &str) -> Result<(), CatalogError> {
        let mut state = self.state.lock().unwrap();
        if state.entities.remove(guid).is_none() {
            return Err(CatalogError::NotFound {
                what: format!("entity {guid}"),
            });
        }
        // The catalog cascades: relationships touching a deleted entity go with it.
        let key = format!("guid:{guid}");
        state
            .relationships
            .retain(|_, rel| rel.end1_key != key && rel.end2_key != key);
        state.log.push(format!("delete_entity {guid}"));
        Ok(())
    }

    async fn create_relationship(&self, draft: RelationshipDraft) -> Result<String, CatalogError> {
        let mut state = self.state.lock().unwrap();
        for endpoint in [&draft.end1, &draft.end2] {
            if let EndpointRef::Guid { guid, .. } = endpoint {
                if !state.entities.contains_key(guid) {
                    return Err(CatalogError::NotFound {
                        what: format!("entity {guid}"),
                    });
                }
            }
        }
        let end1_key = Self::resolve_endpoint_key(&state, &draft.end1);
        let end2_key = Self::resolve_endpoint_key(&state, &draft.end2);
        let type_name = draft.kind.wire_name().to_string();

        if state.relationships.values().any(|rel| {
            rel.type_name == type_name && rel.end1_key == end1_key && rel.end2_key == end2_key
        }) {
            return Err(CatalogError::Conflict {
                what: format!("relationship {type_name} {end1_key} -> {end2_key}"),
            });
        }

        let guid = Self::next_guid(&mut state, "rel");
        state.relationships.insert(
            guid.clone(),
            StoredRelationship {
                guid: guid.clone(),
                type_name: type_name.clone(),
                end1_key: end1_key.clone(),
                end2_key,
            },
        );
        state
            .log
            .push(format!("create_relationship {type_name} from {end1_key}"));
        Ok(guid)
    }

    async fn delete_relationship(&self, guid: &str) -> Result<(), CatalogError> {
        let mut state = self.state.lock().unwrap();
        if state.relationships.remove(guid).is_none() {
            return Err(CatalogError::NotFound {
                what: format!("relationship {guid}"),
            });
        }
        state.log.push(format!("delete_relationship {guid}"));
        Ok(())
    }

    async fn table_columns(&self, table_guid: &str) -> Result<Vec<ColumnIdentity>, CatalogError> {
        let state = self.state.lock().unwrap();
        if !state.entities.contains_key(table_guid) {
            return Err(CatalogError::NotFound {
                what: format!("entity {table_guid}"),
            });
        }
        Ok(state.columns.get(table_guid).cloned().unwrap_or_default())
    }

    async fn entity_relationships(
        &self,
        guid: &str,
    ) -> Result<Vec<RelationshipRef>, CatalogError> {
        let state = self.state.lock().unwrap();
        if !state.entities.contains_key(guid) {
            return Err(CatalogError::NotFound {
                what: format!("entity {guid}"),
            });
        }
        let key = format!("guid:{guid}");
        Ok(state
            .relationships
            .values()
            .filter(|rel| rel.end1_key == key || rel.end2_key == key)
            .map(|rel| RelationshipRef {
                relationship_guid: rel.guid.clone(),
                relationship_type: rel.type_name.clone(),
            })
            .collect())
    }

    async fn lineage_graph(
        &self,
        guid: &str,
        _depth: u32,
    ) -> Result<Vec<EntityRecord>, CatalogError> {
        let state = self.state.lock().unwrap();
        if !state.entities.contains_key(guid) {
            return Err(CatalogError::NotFound {
                what: format!("entity {guid}"),
            });
        }
        // Breadth-first over stored relationships; depth is ignored because
        // the mock graph is small.
        let mut seen = vec![guid.to_string()];
        let mut frontier = vec![format!("guid:{guid}")];
        while let Some(key) = frontier.pop() {
            for rel in state.relationships.values() {
                for other in [&rel.end1_key, &rel.end2_key] {
                    if *other == key {
                        continue;
                    }
                    if rel.end1_key != key && rel.end2_key != key {
                        continue;
                    }
                    if let Some(other_guid) = other.strip_prefix("guid:") {
                        if !seen.iter().any(|g| g == other_guid) {
                            seen.push(other_guid.to_string());
                            frontier.push(other.clone());
                        }
                    }
                }
            }
        }
        Ok(seen
            .iter()
            .filter_map(|g| state.entities.get(g).cloned())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LineageKind;

    #[tokio::test]
    async fn test_entity_create_conflict_on_duplicate_qname() {
        let catalog = MockCatalog::new();
        let draft = EntityDraft {
            type_name: "Process".into(),
            name: "p".into(),
            qualified_name: "lineage-process://p_a_to_b".into(),
            ..Default::default()
        };
        catalog.create_entity(draft.clone()).await.unwrap();
        let err = catalog.create_entity(draft).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_relationship_duplicate_detected_across_ref_styles() {
        let catalog = MockCatalog::new();
        catalog.add_asset("g1", "A", "path/a", "table");
        catalog.add_asset("g2", "B", "path/b", "table");

        let by_guid = RelationshipDraft::new(
            LineageKind::FeedsInto,
            EndpointRef::guid("DataSet", "g1"),
            EndpointRef::guid("DataSet", "g2"),
        );
        catalog.create_relationship(by_guid).await.unwrap();

        // The same edge referenced by qualified name must still conflict.
        let by_qname = RelationshipDraft::new(
            LineageKind::FeedsInto,
            EndpointRef::qualified_name("DataSet", "path/a"),
            EndpointRef::qualified_name("DataSet", "path/b"),
        );
        let err = catalog.create_relationship(by_qname).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_delete_entity_cascades_relationships() {
        let catalog = MockCatalog::new();
        catalog.add_asset("g1", "A", "path/a", "table");
        catalog.add_asset("g2", "B", "path/b", "table");
        catalog
            .create_relationship(RelationshipDraft::new(
                LineageKind::FeedsInto,
                EndpointRef::guid("DataSet", "g1"),
                EndpointRef::guid("DataSet", "g2"),
            ))
            .await
            .unwrap();

        catalog.delete_entity("g1").await.unwrap();
        assert_eq!(catalog.relationship_count(), 0);
        assert!(catalog.delete_entity("g1").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_created_column_joins_parent_schema() {
        let catalog = MockCatalog::new();
        catalog.add_table("t1", "Orders", "path/orders", &["id"]);
        let draft = EntityDraft {
            type_name: "Column".into(),
            name: "Unmapped (Target)".into(),
            qualified_name: "path/orders#Unmapped_Target".into(),
            parent_table: Some(EndpointRef::guid("DataSet", "t1")),
            ..Default::default()
        };
        catalog.create_entity(draft).await.unwrap();
        let columns = catalog.table_columns("t1").await.unwrap();
        assert_eq!(columns.len(), 2);
    }

    #[tokio::test]
    async fn test_lineage_graph_walks_connected_entities() {
        let catalog = MockCatalog::new();
        catalog.add_asset("g1", "A", "path/a", "table");
        catalog.add_asset("g2", "B", "path/b", "table");
        catalog.add_asset("g3", "C", "path/c", "table");
        catalog
            .create_relationship(RelationshipDraft::new(
                LineageKind::FeedsInto,
                EndpointRef::guid("DataSet", "g1"),
                EndpointRef::guid("DataSet", "g2"),
            ))
            .await
            .unwrap();

        let graph = catalog.lineage_graph("g1", 5).await.unwrap();
        let guids: Vec<_> = graph.iter().map(|e| e.guid.as_str()).collect();
        assert!(guids.contains(&"g1"));
        assert!(guids.contains(&"g2"));
        assert!(!guids.contains(&"g3"));
    }
}
