//! Loading configuration from TOML files and the environment

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::{ConfigError, KnowflowConfig};

/// Environment variables that override file values
pub mod env {
    pub const LLM_API_KEY: &str = "KNOWFLOW_LLM_API_KEY";
    pub const EMBEDDING_API_KEY: &str = "KNOWFLOW_EMBEDDING_API_KEY";
    pub const NEO4J_URI: &str = "NEO4J_URI";
    pub const NEO4J_USER: &str = "NEO4J_USER";
    pub const NEO4J_PASSWORD: &str = "NEO4J_PASSWORD";
    pub const DB_PATH: &str = "KNOWFLOW_DB_PATH";
    pub const LOG_LEVEL: &str = "KNOWFLOW_LOG_LEVEL";
}

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// `~/.config/knowflow/config.toml`
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("knowflow").join("config.toml"))
    }

    pub fn from_toml_str(contents: &str) -> Result<KnowflowConfig, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub async fn load_from_file(path: impl AsRef<Path>) -> Result<KnowflowConfig, ConfigError> {
        let path = path.as_ref();
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        debug!(path = %path.display(), "Loaded config file");
        Self::from_toml_str(&contents)
    }

    /// Load, apply environment overrides and validate
    ///
    /// An explicit path must exist. Without one, the default location is used when
    /// present and built-in defaults otherwise.
    pub async fn load(path: Option<&Path>) -> Result<KnowflowConfig, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path).await?,
            None => match Self::default_config_path() {
                Some(default) if tokio::fs::try_exists(&default).await.unwrap_or(false) => {
                    Self::load_from_file(&default).await?
                }
                _ => {
                    info!("No config file found, using defaults");
                    KnowflowConfig::default()
                }
            },
        };

        Self::apply_env_overrides(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(config: &mut KnowflowConfig) {
        Self::apply_overrides_from(config, |key| std::env::var(key).ok());
    }

    /// Apply overrides from any variable source
    pub fn apply_overrides_from<F>(config: &mut KnowflowConfig, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(key) = get(env::LLM_API_KEY) {
            config.llm.api_key = Some(key);
        }
        if let Some(key) = get(env::EMBEDDING_API_KEY) {
            config.embedding.api_key = Some(key);
        }
        if let Some(uri) = get(env::NEO4J_URI) {
            debug!(uri = %uri, "Graph URI overridden from environment");
            config.graph.uri = Some(uri);
        }
        if let Some(user) = get(env::NEO4J_USER) {
            config.graph.user = Some(user);
        }
        if let Some(password) = get(env::NEO4J_PASSWORD) {
            config.graph.password = Some(password);
        }
        if let Some(path) = get(env::DB_PATH) {
            config.storage.database_path = Some(PathBuf::from(path));
        }
        if let Some(level) = get(env::LOG_LEVEL) {
            config.logging.level = Some(level);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_overrides_apply_and_ignore_blank() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (env::NEO4J_URI, "http://graph:7474"),
            (env::NEO4J_PASSWORD, "pw"),
            (env::LLM_API_KEY, "  "),
            (env::DB_PATH, "/tmp/k.db"),
        ]);
        let mut config = KnowflowConfig::default();
        ConfigLoader::apply_overrides_from(&mut config, |k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.graph.uri(), "http://graph:7474");
        assert_eq!(config.graph.password.as_deref(), Some("pw"));
        assert!(config.llm.api_key.is_none());
        assert_eq!(config.storage.database_path(), PathBuf::from("/tmp/k.db"));
    }

    #[test]
    fn test_parse_error_is_reported() {
        let err = ConfigLoader::from_toml_str("[retrieval\ntop_k = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
