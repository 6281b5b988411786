//! REST implementation of the `Catalog` trait.
//!
//! Talks to an Atlas-v2-style data map API: entity CRUD under
//! `/datamap/api/atlas/v2/entity`, relationships under `.../relationship`,
//! lineage under `.../lineage/{guid}`, and a basic search endpoint for the
//! flattened asset stream. Auth is a bearer token resolved at construction;
//! token acquisition is an external collaborator.
//!
//! Status mapping is part of the engine contract: HTTP 404 becomes
//! `CatalogError::NotFound` and HTTP 409 becomes `CatalogError::Conflict`,
//! which the materializer treats as an idempotent success.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::catalog::{
    AssetRecord, Catalog, EndpointRef, EntityDraft, EntityRecord, RelationshipDraft,
    RelationshipRef,
};
use crate::config::CatalogConfig;
use crate::error::{CatalogError, ConfigError};
use crate::types::ColumnIdentity;

/// Page size for the asset stream search.
const SEARCH_PAGE_LIMIT: usize = 1000;

/// REST client for an Atlas-v2-style metadata catalog.
pub struct RestCatalog {
    client: Client,
    base_url: Url,
    token: String,
    timeout_secs: u64,
}

impl RestCatalog {
    /// Build a client from configuration, resolving the bearer token from the
    /// configured environment variable.
    pub fn from_config(config: &CatalogConfig) -> Result<Self, ConfigError> {
        let token = std::env::var(&config.token_env).map_err(|_| ConfigError::EnvVarMissing {
            var: config.token_env.clone(),
        })?;
        Self::new(&config.endpoint, token, config.timeout_secs)
    }

    /// Build a client with an explicitly provided token.
    pub fn new(
        endpoint: &str,
        token: String,
        timeout_secs: u64,
    ) -> Result<Self, ConfigError> {
        let base_url = Url::parse(endpoint).map_err(|e| ConfigError::Invalid {
            message: format!("invalid catalog endpoint '{endpoint}': {e}"),
        })?;
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ConfigError::Invalid {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            base_url,
            token,
            timeout_secs,
        })
    }

    fn url(&self, path: &str) -> Result<Url, CatalogError> {
        self.base_url
            .join(path)
            .map_err(|e| CatalogError::Connection {
                message: format!("invalid request path '{path}': {e}"),
            })
    }

    fn entity_url(&self, guid: &str) -> Result<Url, CatalogError> {
        self.url(&format!(
            "/datamap/api/atlas/v2/entity/guid/{}",
            urlencoding::encode(guid)
        ))
    }

    fn map_transport(&self, err: reqwest::Error) -> CatalogError {
        if err.is_timeout() {
            CatalogError::Timeout {
                timeout_secs: self.timeout_secs,
            }
        } else {
            CatalogError::Connection {
                message: err.to_string(),
            }
        }
    }

    /// Map a non-success response into the typed error, consuming the body.
    async fn error_for(&self, what: &str, response: reqwest::Response) -> CatalogError {
        let status = response.status();
        match status {
            StatusCode::NOT_FOUND => CatalogError::NotFound { what: what.into() },
            StatusCode::CONFLICT => CatalogError::Conflict { what: what.into() },
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CatalogError::AuthFailed {
                message: format!("status {status} for {what}"),
            },
            _ => {
                let message = response.text().await.unwrap_or_default();
                CatalogError::Api {
                    status: status.as_u16(),
                    message,
                }
            }
        }
    }

    async fn get_json(&self, url: Url, what: &str) -> Result<Value, CatalogError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;
        if !response.status().is_success() {
            return Err(self.error_for(what, response).await);
        }
        response
            .json()
            .await
            .map_err(|e| CatalogError::ResponseParse {
                message: e.to_string(),
            })
    }

    async fn post_json(&self, url: Url, body: &Value, what: &str) -> Result<Value, CatalogError> {
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;
        if !response.status().is_success() {
            return Err(self.error_for(what, response).await);
        }
        response
            .json()
            .await
            .map_err(|e| CatalogError::ResponseParse {
                message: e.to_string(),
            })
    }

    fn endpoint_json(endpoint: &EndpointRef) -> Value {
        match endpoint {
            EndpointRef::Guid { type_name, guid } => json!({
                "typeName": type_name,
                "guid": guid,
            }),
            EndpointRef::QualifiedName {
                type_name,
                qualified_name,
            } => json!({
                "typeName": type_name,
                "uniqueAttributes": { "qualifiedName": qualified_name },
            }),
        }
    }

    fn relationship_guid_from(value: &Value, kind: &str) -> Result<String, CatalogError> {
        value["guid"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| CatalogError::ResponseParse {
                message: format!("no guid in created relationship {kind}"),
            })
    }

    fn entity_from_json(value: &Value) -> Result<EntityRecord, CatalogError> {
        let attributes = &value["attributes"];
        let guid = value["guid"].as_str().ok_or_else(|| {
            CatalogError::ResponseParse {
                message: "entity missing guid".into(),
            }
        })?;
        Ok(EntityRecord {
            guid: guid.to_string(),
            type_name: value["typeName"].as_str().unwrap_or_default().to_string(),
            name: attributes["name"].as_str().unwrap_or_default().to_string(),
            qualified_name: attributes["qualifiedName"]
                .as_str()
                .unwrap_or_default()
                .to_string(),
        })
    }

    /// Collect relationship refs from a `relationshipAttributes` object, where
    /// each value is either a single reference or a list of references.
    fn relationship_refs_from(rel_attrs: &Value) -> Vec<RelationshipRef> {
        let mut refs = Vec::new();
        let Some(map) = rel_attrs.as_object() else {
            return refs;
        };
        let mut push_ref = |value: &Value| {
            if let (Some(guid), Some(rel_type)) = (
                value["relationshipGuid"].as_str(),
                value["relationshipType"].as_str(),
            ) {
                refs.push(RelationshipRef {
                    relationship_guid: guid.to_string(),
                    relationship_type: rel_type.to_string(),
                });
            }
        };
        for value in map.values() {
            match value {
                Value::Array(items) => items.iter().for_each(&mut push_ref),
                Value::Object(_) => push_ref(value),
                _ => {}
            }
        }
        refs
    }
}

#[async_trait]
impl Catalog for RestCatalog {
    async fn list_assets(&self) -> Result<Vec<AssetRecord>, CatalogError> {
        let url = self.url("/datamap/api/atlas/v2/search/basic")?;
        let mut assets = Vec::new();
        let mut offset = 0usize;
        loop {
            let body = json!({
                "keywords": "*",
                "limit": SEARCH_PAGE_LIMIT,
                "offset": offset,
            });
            let page = self
                .post_json(url.clone(), &body, "asset search")
                .await?;
            let items = page["value"].as_array().cloned().unwrap_or_default();
            let count = items.len();
            for item in &items {
                let guid = item["id"]
                    .as_str()
                    .or_else(|| item["guid"].as_str())
                    .unwrap_or_default();
                if guid.is_empty() {
                    continue;
                }
                assets.push(AssetRecord {
                    guid: guid.to_string(),
                    name: item["name"].as_str().unwrap_or_default().to_string(),
                    qualified_name: item["qualifiedName"]
                        .as_str()
                        .unwrap_or_default()
                        .to_string(),
                    object_type: item["objectType"]
                        .as_str()
                        .or_else(|| item["entityType"].as_str())
                        .unwrap_or_default()
                        .to_string(),
                });
            }
            if count < SEARCH_PAGE_LIMIT {
                break;
            }
            offset += count;
        }
        debug!(total = assets.len(), "fetched asset stream");
        Ok(assets)
    }

    async fn get_entity(&self, guid: &str) -> Result<EntityRecord, CatalogError> {
        let url = self.entity_url(guid)?;
        let body = self.get_json(url, &format!("entity {guid}")).await?;
        Self::entity_from_json(&body["entity"])
    }

    async fn create_entity(&self, draft: EntityDraft) -> Result<String, CatalogError> {
        let mut attributes = serde_json::Map::new();
        attributes.insert("name".into(), json!(draft.name));
        attributes.insert("qualifiedName".into(), json!(draft.qualified_name));
        for (key, value) in &draft.attributes {
            attributes.insert(key.clone(), value.clone());
        }
        if !draft.inputs.is_empty() {
            let inputs: Vec<Value> = draft.inputs.iter().map(Self::endpoint_json).collect();
            attributes.insert("inputs".into(), Value::Array(inputs));
        }
        if !draft.outputs.is_empty() {
            let outputs: Vec<Value> = draft.outputs.iter().map(Self::endpoint_json).collect();
            attributes.insert("outputs".into(), Value::Array(outputs));
        }

        let mut entity = json!({
            "typeName": draft.type_name,
            "attributes": Value::Object(attributes),
            "guid": "-1",
        });
        if let Some(parent) = &draft.parent_table {
            entity["relationshipAttributes"] = json!({ "table": Self::endpoint_json(parent) });
        }

        let url = self.url("/datamap/api/atlas/v2/entity/bulk")?;
        let body = json!({ "entities": [entity] });
        let what = format!("entity {}", draft.qualified_name);
        let result = self.post_json(url, &body, &what).await?;

        result["guidAssignments"]["-1"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| CatalogError::ResponseParse {
                message: format!("no guid assigned for created entity {}", draft.qualified_name),
            })
    }

    async fn delete_entity(&self, guid: &str) -> Result<(), CatalogError> {
        let url = self.entity_url(guid)?;
        let response = self
            .client
            .delete(url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;
        if !response.status().is_success() {
            return Err(self.error_for(&format!("entity {guid}"), response).await);
        }
        Ok(())
    }

    async fn create_relationship(&self, draft: RelationshipDraft) -> Result<String, CatalogError> {
        let mut body = json!({
            "typeName": draft.kind.wire_name(),
            "guid": "-1",
            "end1": Self::endpoint_json(&draft.end1),
            "end2": Self::endpoint_json(&draft.end2),
        });
        if let Some(attributes) = &draft.attributes {
            body["attributes"] = attributes.clone();
        }

        let url = self.url("/datamap/api/atlas/v2/relationship")?;
        let what = format!("relationship {}", draft.kind.wire_name());
        let result = self.post_json(url, &body, &what).await?;
        Self::relationship_guid_from(&result, draft.kind.wire_name())
    }

    async fn delete_relationship(&self, guid: &str) -> Result<(), CatalogError> {
        let url = self.url(&format!(
            "/datamap/api/atlas/v2/relationship/guid/{}",
            urlencoding::encode(guid)
        ))?;
        let response = self
            .client
            .delete(url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;
        if !response.status().is_success() {
            return Err(self
                .error_for(&format!("relationship {guid}"), response)
                .await);
        }
        Ok(())
    }

    async fn table_columns(&self, table_guid: &str) -> Result<Vec<ColumnIdentity>, CatalogError> {
        let url = self.entity_url(table_guid)?;
        let body = self.get_json(url, &format!("entity {table_guid}")).await?;
        let rel_attrs = &body["entity"]["relationshipAttributes"];

        // Column references live under either `columns` or `schema`.
        let refs = rel_attrs["columns"]
            .as_array()
            .filter(|a| !a.is_empty())
            .or_else(|| rel_attrs["schema"].as_array())
            .cloned()
            .unwrap_or_default();

        let columns = refs
            .iter()
            .filter_map(|col| {
                let guid = col["guid"].as_str()?;
                let name = col["displayText"].as_str().or_else(|| col["name"].as_str())?;
                Some(ColumnIdentity {
                    guid: guid.to_string(),
                    name: name.to_string(),
                    // Column references omit the qualified name; a guid-anchored
                    // fallback keeps the identity usable for relationship ends.
                    qualified_name: col["uniqueAttributes"]["qualifiedName"]
                        .as_str()
                        .map(String::from)
                        .unwrap_or_else(|| format!("column:{guid}")),
                    data_type: col["typeName"].as_str().unwrap_or_default().to_string(),
                })
            })
            .collect();
        Ok(columns)
    }

    async fn entity_relationships(
        &self,
        guid: &str,
    ) -> Result<Vec<RelationshipRef>, CatalogError> {
        let url = self.entity_url(guid)?;
        let body = self.get_json(url, &format!("entity {guid}")).await?;
        Ok(Self::relationship_refs_from(
            &body["entity"]["relationshipAttributes"],
        ))
    }

    async fn lineage_graph(
        &self,
        guid: &str,
        depth: u32,
    ) -> Result<Vec<EntityRecord>, CatalogError> {
        let mut url = self.url(&format!(
            "/datamap/api/atlas/v2/lineage/{}",
            urlencoding::encode(guid)
        ))?;
        url.query_pairs_mut()
            .append_pair("depth", &depth.to_string())
            .append_pair("direction", "BOTH");
        let body = self.get_json(url, &format!("lineage of {guid}")).await?;

        let Some(entity_map) = body["guidEntityMap"].as_object() else {
            return Ok(Vec::new());
        };
        Ok(entity_map
            .iter()
            .filter_map(|(guid, value)| {
                let attributes = &value["attributes"];
                Some(EntityRecord {
                    guid: guid.clone(),
                    type_name: value["typeName"].as_str()?.to_string(),
                    name: attributes["name"].as_str().unwrap_or_default().to_string(),
                    qualified_name: attributes["qualifiedName"]
                        .as_str()
                        .unwrap_or_default()
                        .to_string(),
                })
            })
            .collect())
    }
}
