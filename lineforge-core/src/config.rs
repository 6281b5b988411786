//! Configuration system for Lineforge.
//!
//! Uses `figment` for layered configuration: defaults -> config file ->
//! `LINEFORGE_`-prefixed environment variables. A local `.env` file is
//! honored for development via `dotenvy`.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

/// Top-level configuration for the lineage engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LineforgeConfig {
    pub catalog: CatalogConfig,
    pub engine: EngineConfig,
}

/// Connection settings for the REST catalog client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Base endpoint of the catalog service, e.g. `https://catalog.example.com`.
    pub endpoint: String,
    /// Environment variable holding the bearer token for catalog calls.
    ///
    /// Token acquisition itself is an external collaborator; the engine only
    /// consumes an already-issued token.
    pub token_env: String,
    /// Timeout applied to every individual catalog call, in seconds.
    pub timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            token_env: "LINEFORGE_CATALOG_TOKEN".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Behavioral settings for the reconciliation pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Template for the workspace scope marker; `{workspace}` is substituted
    /// with the workspace identifier. Assets whose qualified name contains
    /// the rendered marker are in scope.
    pub scope_marker: String,
    /// Maximum concurrent schema lookups while enriching the inventory.
    pub max_concurrent_schema_fetches: usize,
    /// Default process name used when a mediated edge supplies none.
    pub default_process_name: String,
    /// Lineage graph walk depth for the process sweep.
    pub sweep_depth: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scope_marker: "groups/{workspace}/".to_string(),
            max_concurrent_schema_fetches: 8,
            default_process_name: "Data Flow".to_string(),
            sweep_depth: 20,
        }
    }
}

impl EngineConfig {
    /// Render the scope marker for a concrete workspace identifier.
    pub fn scope_marker_for(&self, workspace: &str) -> String {
        self.scope_marker.replace("{workspace}", workspace)
    }
}

impl LineforgeConfig {
    /// Load configuration with layering: defaults -> optional TOML file ->
    /// `LINEFORGE_`-prefixed environment variables.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        // Best-effort .env for local development; absence is not an error.
        let _ = dotenvy::dotenv();

        let mut figment = Figment::from(Serialized::defaults(LineforgeConfig::default()));

        if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::FileNotFound {
                    path: path.to_path_buf(),
                });
            }
            figment = figment.merge(Toml::file(path));
        }

        let config: LineforgeConfig = figment
            .merge(Env::prefixed("LINEFORGE_").split("__"))
            .extract()
            .map_err(|e| ConfigError::Invalid {
                message: e.to_string(),
            })?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.max_concurrent_schema_fetches == 0 {
            return Err(ConfigError::Invalid {
                message: "engine.max_concurrent_schema_fetches must be at least 1".into(),
            });
        }
        if self.catalog.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                message: "catalog.timeout_secs must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Resolve the catalog bearer token from the configured environment variable.
    pub fn resolve_token(&self) -> Result<String, ConfigError> {
        std::env::var(&self.catalog.token_env).map_err(|_| ConfigError::EnvVarMissing {
            var: self.catalog.token_env.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = LineforgeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.catalog.timeout_secs, 30);
        assert_eq!(config.engine.max_concurrent_schema_fetches, 8);
    }

    #[test]
    fn test_scope_marker_rendering() {
        let engine = EngineConfig::default();
        assert_eq!(
            engine.scope_marker_for("11111111-2222-3333-4444-555555555555"),
            "groups/11111111-2222-3333-4444-555555555555/"
        );
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let err = LineforgeConfig::load(Some(Path::new("/nonexistent/lineforge.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = LineforgeConfig::default();
        config.engine.max_concurrent_schema_fetches = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { .. })
        ));
    }
}
