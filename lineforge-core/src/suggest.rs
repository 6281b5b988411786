//! Untrusted lineage suggestions.
//!
//! The suggestion source is an external collaborator (typically an AI agent)
//! that proposes lineage mappings from an inventory digest. Everything that
//! comes back is untrusted: proposals only become `ValidatedEdge`s after the
//! validator has resolved both endpoints against the inventory. Nothing in a
//! raw suggestion ever reaches an entity-creation call directly.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::types::{AssetKind, ColumnMapping, ProposedEdge};

/// A compact view of the workspace inventory handed to the suggestion source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryDigest {
    pub workspace: String,
    pub assets: Vec<DigestAsset>,
}

/// One asset in the digest: name, kind, qualified name, column schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestAsset {
    pub name: String,
    pub kind: AssetKind,
    pub qualified_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<String>,
}

/// One raw lineage mapping exactly as the suggestion source emits it.
///
/// Names and guids are the source's claims, not facts; the guid fields in
/// particular are ignored until validation has re-resolved both names.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UntrustedSuggestion {
    #[serde(default)]
    pub source_table_name: String,
    #[serde(default)]
    pub source_table_guid: String,
    #[serde(default)]
    pub target_table_name: String,
    #[serde(default)]
    pub target_table_guid: String,
    #[serde(default)]
    pub column_mappings: Vec<ColumnMapping>,
}

/// The suggestion payload: a list of mappings, possibly empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SuggestionBatch {
    #[serde(default)]
    pub lineage_mappings: Vec<UntrustedSuggestion>,
}

impl SuggestionBatch {
    pub fn is_empty(&self) -> bool {
        self.lineage_mappings.is_empty()
    }

    /// Convert raw suggestions into proposed edges for the validator.
    pub fn into_proposals(self) -> Vec<ProposedEdge> {
        self.lineage_mappings
            .into_iter()
            .map(|s| {
                ProposedEdge::new(s.source_table_name, s.target_table_name)
                    .with_mappings(s.column_mappings)
            })
            .collect()
    }
}

/// External source of lineage proposals.
#[async_trait]
pub trait SuggestionSource: Send + Sync {
    /// Propose lineage mappings for the given inventory digest.
    ///
    /// An empty batch is a valid answer, not an error.
    async fn propose(&self, digest: &InventoryDigest) -> Result<SuggestionBatch, CatalogError>;
}

/// Decode a raw suggestion-source response into a batch.
///
/// Tolerates the noise real sources produce: the JSON may be wrapped in a
/// markdown code fence, and may carry trailing commas before closing
/// brackets.
pub fn decode_suggestion_payload(raw: &str) -> Result<SuggestionBatch, serde_json::Error> {
    let stripped = strip_code_fence(raw);
    let cleaned = strip_trailing_commas(stripped);
    serde_json::from_str(&cleaned)
}

/// If the payload is wrapped in ``` fences, return only the fenced body.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(start) = trimmed.find("```") else {
        return trimmed;
    };
    let after_fence = &trimmed[start + 3..];
    // Skip an optional language tag on the fence line.
    let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_fence[body_start..];
    match body.find("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

/// Remove trailing commas before `]` or `}` outside of string literals.
fn strip_trailing_commas(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut pending_comma: Option<usize> = None;

    for c in raw.chars() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                pending_comma = None;
                in_string = true;
                out.push(c);
            }
            ',' => {
                pending_comma = Some(out.len());
                out.push(c);
            }
            ']' | '}' => {
                if let Some(idx) = pending_comma.take() {
                    out.remove(idx);
                }
                out.push(c);
            }
            c if c.is_whitespace() => out.push(c),
            _ => {
                pending_comma = None;
                out.push(c);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_plain_payload() {
        let raw = r#"{"lineage_mappings": [{"source_table_name": "Orders", "target_table_name": "OrdersClean", "column_mappings": [{"source_column": "id", "target_column": "id"}]}]}"#;
        let batch = decode_suggestion_payload(raw).unwrap();
        assert_eq!(batch.lineage_mappings.len(), 1);
        assert_eq!(batch.lineage_mappings[0].source_table_name, "Orders");
        assert_eq!(batch.lineage_mappings[0].column_mappings.len(), 1);
    }

    #[test]
    fn test_decode_fenced_payload() {
        let raw = "Here you go:\n```json\n{\"lineage_mappings\": []}\n```\nDone.";
        let batch = decode_suggestion_payload(raw).unwrap();
        assert!(batch.is_empty());
    }

    #[test]
    fn test_decode_trailing_commas() {
        let raw = r#"{"lineage_mappings": [{"source_table_name": "A", "target_table_name": "B",},],}"#;
        let batch = decode_suggestion_payload(raw).unwrap();
        assert_eq!(batch.lineage_mappings.len(), 1);
    }

    #[test]
    fn test_trailing_comma_inside_string_preserved() {
        let raw = r#"{"lineage_mappings": [{"source_table_name": "A,", "target_table_name": "B"}]}"#;
        let batch = decode_suggestion_payload(raw).unwrap();
        assert_eq!(batch.lineage_mappings[0].source_table_name, "A,");
    }

    #[test]
    fn test_decode_garbage_is_an_error() {
        assert!(decode_suggestion_payload("not json at all").is_err());
    }

    #[test]
    fn test_into_proposals_drops_claimed_guids() {
        let batch = SuggestionBatch {
            lineage_mappings: vec![UntrustedSuggestion {
                source_table_name: "Orders".into(),
                source_table_guid: "claimed-guid-ignored".into(),
                target_table_name: "OrdersClean".into(),
                ..Default::default()
            }],
        };
        let proposals = batch.into_proposals();
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].source_name, "Orders");
        assert!(!proposals[0].use_process);
    }
}
