use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::embedding::{EmbeddingProvider, IndexConfig};
use crate::error::StoreError;
use crate::store::Store;
use crate::store::types::DEFAULT_SEARCH_LIMIT;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct MemstoreConfig {
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub search: SearchConfig,
    pub index: IndexConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SearchConfig {
    pub default_limit: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_memstore_dir()
            .join("store.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_SEARCH_LIMIT,
        }
    }
}

/// Returns `~/.memstore/`, or `./.memstore/` when no home directory is known.
pub fn default_memstore_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".memstore")
}

/// Returns the default config file path: `~/.memstore/config.toml`
pub fn default_config_path() -> PathBuf {
    default_memstore_dir().join("config.toml")
}

impl MemstoreConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            MemstoreConfig::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides (MEMSTORE_DB, MEMSTORE_LOG_LEVEL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("MEMSTORE_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("MEMSTORE_LOG_LEVEL") {
            self.logging.level = val;
        }
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        if self.storage.db_path.trim().is_empty() {
            return Err(StoreError::Config("storage.db_path is empty".into()));
        }
        if self.search.default_limit == 0 {
            return Err(StoreError::Config(
                "search.default_limit must be at least 1".into(),
            ));
        }
        if self.index.fields.iter().any(|f| f.trim().is_empty()) {
            return Err(StoreError::Config(
                "index.fields contains an empty path".into(),
            ));
        }
        Ok(())
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    /// Open the configured store file. Searches are unscored.
    pub fn open_store(&self) -> crate::error::Result<Store> {
        Store::open(self.resolved_db_path())
    }

    /// Open the configured store file and embed the `[index]` fields of every
    /// put through `provider`.
    pub fn open_store_with(
        &self,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> crate::error::Result<Store> {
        Ok(self.open_store()?.with_embeddings(provider, self.index.clone()))
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = MemstoreConfig::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.search.default_limit, 10);
        assert_eq!(config.index.fields, vec!["$".to_string()]);
        assert!(config.storage.db_path.ends_with("store.db"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[storage]
db_path = "/tmp/test.db"

[search]
default_limit = 25

[index]
fields = ["text", "notes[*]"]
"#;
        let config: MemstoreConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.storage.db_path, "/tmp/test.db");
        assert_eq!(config.search.default_limit, 25);
        assert_eq!(config.index.fields, vec!["text", "notes[*]"]);
        // defaults still apply for unset sections
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn zero_limit_is_rejected() {
        let config: MemstoreConfig = toml::from_str("[search]\ndefault_limit = 0\n").unwrap();
        assert!(matches!(config.validate(), Err(StoreError::Config(_))));
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = MemstoreConfig::default();
        std::env::set_var("MEMSTORE_DB", "/tmp/override.db");
        std::env::set_var("MEMSTORE_LOG_LEVEL", "trace");

        config.apply_env_overrides();

        assert_eq!(config.storage.db_path, "/tmp/override.db");
        assert_eq!(config.logging.level, "trace");

        // Clean up
        std::env::remove_var("MEMSTORE_DB");
        std::env::remove_var("MEMSTORE_LOG_LEVEL");
    }

    struct TextLength;

    impl EmbeddingProvider for TextLength {
        fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
            Ok(vec![text.len() as f32, 1.0])
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

    #[test]
    fn open_store_with_embeds_configured_fields() {
        let tmp = tempfile::TempDir::new().unwrap();
        let toml_str = format!(
            "[storage]\ndb_path = {:?}\n\n[index]\nfields = [\"text\"]\n",
            tmp.path().join("store.db").to_string_lossy()
        );
        let config: MemstoreConfig = toml::from_str(&toml_str).unwrap();
        let mut store = config.open_store_with(Arc::new(TextLength)).unwrap();

        let ns = crate::store::types::namespace(["docs"]);
        let with_text = serde_json::json!({"text": "hello"});
        let without_text = serde_json::json!({"title": "hello"});
        store
            .put(ns.clone(), "a", with_text.as_object().cloned().unwrap())
            .unwrap();
        store
            .put(ns.clone(), "b", without_text.as_object().cloned().unwrap())
            .unwrap();

        let results = store
            .search(crate::store::types::SearchOp::new(ns).with_query("hi"))
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].item.key, "a");
        assert!(results[0].score.is_some());
        // Only `text` is embedded, so "b" carries no vectors.
        assert!(results[1].score.is_none());
    }

    #[test]
    fn tilde_expands_to_home() {
        let expanded = expand_tilde("~/x/store.db");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expanded, home.join("x/store.db"));
        }
        assert_eq!(expand_tilde("/abs/store.db"), PathBuf::from("/abs/store.db"));
    }
}
