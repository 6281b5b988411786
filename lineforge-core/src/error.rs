//! Error types for the Lineforge core library.
//!
//! Uses `thiserror` for public API error types with structured variants
//! covering catalog I/O, configuration, validation, and per-edge
//! materialization failures.

use std::path::PathBuf;

/// Top-level error type for the Lineforge core library.
///
/// Only two conditions abort a whole request: failure to resolve any asset
/// inventory at all, and a batch in which zero proposed edges validate.
/// Everything else is reported per item inside a batch summary.
#[derive(Debug, thiserror::Error)]
pub enum LineageError {
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Not found: {what}")]
    NotFound { what: String },

    #[error("No proposed edge could be validated against the inventory ({} known assets)", known_assets.len())]
    ValidationFailed { known_assets: Vec<String> },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from catalog service interactions.
///
/// `Conflict` and `NotFound` are load-bearing signals, not just diagnostics:
/// the materializer treats `Conflict` on relationship creation as an
/// idempotent success, and the deletion manager treats `NotFound` on entity
/// deletion as "already deleted".
#[derive(Debug, Clone, thiserror::Error)]
pub enum CatalogError {
    #[error("Entity not found: {what}")]
    NotFound { what: String },

    #[error("Record already exists: {what}")]
    Conflict { what: String },

    #[error("Catalog request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Catalog API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Catalog connection failed: {message}")]
    Connection { message: String },

    #[error("Catalog response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Authentication against the catalog failed: {message}")]
    AuthFailed { message: String },
}

impl CatalogError {
    /// Whether this error is the "already exists" conflict signal.
    pub fn is_conflict(&self) -> bool {
        matches!(self, CatalogError::Conflict { .. })
    }

    /// Whether this error is the "missing record" signal.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CatalogError::NotFound { .. })
    }
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Environment variable not set: {var}")]
    EnvVarMissing { var: String },
}

/// A per-edge (or per-mapping) failure collected into a batch summary.
///
/// These never abort the batch; they are surfaced so the caller can retry
/// individual edges.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EdgeError {
    #[error("Mediated edge aborted at step '{step}': {message}")]
    PartialFailure {
        step: String,
        /// Guid of a process entity already created before the abort.
        /// It is left orphaned; `sweep_processes` is the cleanup path.
        process_guid: Option<String>,
        message: String,
    },

    #[error("Operation timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("No discoverable columns for table '{table}'; column-level pass skipped")]
    SchemaUnavailable { table: String },

    #[error("Catalog call failed: {0}")]
    Catalog(CatalogError),
}

/// A type alias for results using the top-level `LineageError`.
pub type Result<T> = std::result::Result<T, LineageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_signal() {
        let err = CatalogError::Conflict {
            what: "relationship".into(),
        };
        assert!(err.is_conflict());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_validation_failed_display() {
        let err = LineageError::ValidationFailed {
            known_assets: vec!["Orders".into(), "OrdersClean".into()],
        };
        assert_eq!(
            err.to_string(),
            "No proposed edge could be validated against the inventory (2 known assets)"
        );
    }

    #[test]
    fn test_partial_failure_display_names_orphan() {
        let err = EdgeError::PartialFailure {
            step: "has_input".into(),
            process_guid: Some("abc-123".into()),
            message: "boom".into(),
        };
        let text = err.to_string();
        assert!(text.contains("has_input"));
        assert!(matches!(
            err,
            EdgeError::PartialFailure {
                process_guid: Some(_),
                ..
            }
        ));
    }

    #[test]
    fn test_error_from_catalog() {
        let err: LineageError = CatalogError::NotFound {
            what: "asset stream".into(),
        }
        .into();
        assert!(matches!(err, LineageError::Catalog(_)));
    }
}
