//! Configuration loading and management.
//!
//! Configuration is loaded from multiple sources with the following precedence
//! (highest to lowest):
//!
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. `.schema-guard.toml` in current directory
//! 4. `~/.config/schema-guard/config.toml`
//! 5. Default values
//!
//! A file layer only overrides the keys it sets.
//!
//! # Configuration File Format
//!
//! ```toml
//! [llm]
//! provider = "openai"          # openai, anthropic, ollama
//! model = "gpt-4o-mini"
//! api_key = "sk-..."           # or use LLM_API_KEY env var
//! ollama_url = "http://localhost:11434"
//! temperature = 0.1
//! top_p = 0.9
//!
//! [retry]
//! max_retries = 3
//! initial_delay_ms = 1000
//! max_delay_ms = 30000
//! backoff_factor = 2.0
//!
//! [guard]
//! danger_action = "block"      # block, warn, wrap
//! reject_unknown_references = true
//! dangerous_keywords = ["DROP", "TRUNCATE", "DELETE"]
//! savepoint_name = "ai_guard"
//!
//! [storage]
//! root = "/var/lib/schema-guard"
//!
//! [introspect]
//! schema = "public"
//! max_tables = 200
//! enforce_catalog_only = true
//! statement_timeout_secs = 5
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Description |
//! |----------|-------------|
//! | `LLM_API_KEY` | API key for OpenAI/Anthropic (falls back to `OPENAI_API_KEY`) |
//! | `LLM_PROVIDER` | Provider name |
//! | `LLM_MODEL` | Model identifier |
//! | `OLLAMA_URL` | Ollama base URL |
//! | `SCHEMA_GUARD_STORE` | Snapshot store directory |
//! | `ENFORCE_CATALOG_ONLY` | `false` lets introspection run with a data-reading role |

use std::{
    env, fs,
    path::{Path, PathBuf}
};

use serde::{Deserialize, Serialize};

use crate::{
    error::{AppResult, config_error},
    guard::{DEFAULT_SAVEPOINT, DangerAction},
    introspect::{DEFAULT_MAX_TABLES, IntrospectOptions}
};

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub llm:        LlmConfig,
    pub retry:      RetryConfig,
    pub guard:      GuardConfig,
    pub storage:    StorageConfig,
    pub introspect: IntrospectConfig
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider:    Option<String>,
    pub api_key:     Option<String>,
    pub model:       Option<String>,
    pub ollama_url:  Option<String>,
    pub temperature: f32,
    pub top_p:       f32
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider:    None,
            api_key:     None,
            model:       None,
            ollama_url:  Some(String::from("http://localhost:11434")),
            temperature: 0.1,
            top_p:       0.9
        }
    }
}

/// Retry configuration for LLM requests
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries:      u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms:     u64,
    pub backoff_factor:   f64
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries:      3,
            initial_delay_ms: 1000,
            max_delay_ms:     30000,
            backoff_factor:   2.0
        }
    }
}

/// Gatekeeping policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    pub danger_action:             DangerAction,
    pub reject_unknown_references: bool,
    /// Replaces the default keyword list when set
    pub dangerous_keywords:        Option<Vec<String>>,
    pub savepoint_name:            String
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            danger_action:             DangerAction::default(),
            reject_unknown_references: true,
            dangerous_keywords:        None,
            savepoint_name:            DEFAULT_SAVEPOINT.to_string()
        }
    }
}

/// Snapshot storage location
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StorageConfig {
    pub root: Option<PathBuf>
}

impl StorageConfig {
    /// Configured root, else `$HOME/.local/share/schema-guard/snapshots`, else
    /// `./.schema-guard/snapshots`
    pub fn resolved_root(&self) -> PathBuf {
        if let Some(root) = &self.root {
            return root.clone();
        }
        match env::var_os("HOME") {
            Some(home) => PathBuf::from(home)
                .join(".local")
                .join("share")
                .join("schema-guard")
                .join("snapshots"),
            None => PathBuf::from(".schema-guard").join("snapshots")
        }
    }
}

/// Catalog introspection defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntrospectConfig {
    pub schema:                 String,
    pub max_tables:             u32,
    pub enforce_catalog_only:   bool,
    pub statement_timeout_secs: u64
}

impl Default for IntrospectConfig {
    fn default() -> Self {
        Self {
            schema:                 String::from("public"),
            max_tables:             DEFAULT_MAX_TABLES,
            enforce_catalog_only:   true,
            statement_timeout_secs: 5
        }
    }
}

impl From<&IntrospectConfig> for IntrospectOptions {
    fn from(config: &IntrospectConfig) -> Self {
        Self {
            schema:                 config.schema.clone(),
            max_tables:             config.max_tables,
            enforce_catalog_only:   config.enforce_catalog_only,
            statement_timeout_secs: config.statement_timeout_secs
        }
    }
}

impl Config {
    /// Load configuration from files and environment
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(home) = env::var_os("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("schema-guard")
                .join("config.toml");
            config.merge_file(&home_config)?;
        }

        config.merge_file(Path::new(".schema-guard.toml"))?;

        config.apply_env_vars(|name| env::var(name).ok());
        Ok(config)
    }

    /// Parse a single configuration layer
    ///
    /// # Errors
    ///
    /// Returns a config error for invalid TOML or unknown enum values
    pub fn from_toml_str(content: &str) -> AppResult<Self> {
        toml::from_str(content).map_err(|e| config_error(format!("Invalid config file: {}", e)))
    }

    /// Apply environment overrides read through `lookup`
    pub fn apply_env_vars<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>
    {
        if let Some(api_key) = lookup("LLM_API_KEY").or_else(|| lookup("OPENAI_API_KEY")) {
            self.llm.api_key = Some(api_key);
        }
        if let Some(provider) = lookup("LLM_PROVIDER") {
            self.llm.provider = Some(provider);
        }
        if let Some(model) = lookup("LLM_MODEL") {
            self.llm.model = Some(model);
        }
        if let Some(url) = lookup("OLLAMA_URL") {
            self.llm.ollama_url = Some(url);
        }
        if let Some(root) = lookup("SCHEMA_GUARD_STORE") {
            self.storage.root = Some(PathBuf::from(root));
        }
        if let Some(flag) = lookup("ENFORCE_CATALOG_ONLY") {
            self.introspect.enforce_catalog_only = flag.trim() != "false";
        }
    }

    fn merge_file(&mut self, path: &Path) -> AppResult<()> {
        if !path.exists() {
            return Ok(());
        }
        let content = fs::read_to_string(path)
            .map_err(|e| config_error(format!("Failed to read config file: {}", e)))?;
        let layer: toml::Table = toml::from_str(&content)
            .map_err(|e| config_error(format!("Invalid config file: {}", e)))?;
        tracing::debug!(path = %path.display(), "loaded config file");
        self.merge_table(layer)
    }

    /// Overlay the keys present in `layer`
    fn merge_table(&mut self, layer: toml::Table) -> AppResult<()> {
        let current = toml::Table::try_from(&*self)
            .map_err(|e| config_error(format!("Invalid config: {}", e)))?;
        let merged = merge_tables(current, layer);
        *self = merged
            .try_into()
            .map_err(|e| config_error(format!("Invalid config file: {}", e)))?;
        Ok(())
    }
}

fn merge_tables(mut base: toml::Table, layer: toml::Table) -> toml::Table {
    for (key, value) in layer {
        let merged = match (base.remove(&key), value) {
            (Some(toml::Value::Table(old)), toml::Value::Table(new)) => {
                toml::Value::Table(merge_tables(old, new))
            }
            (_, value) => value
        };
        base.insert(key, merged);
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_layer_overrides_only_its_keys() {
        let mut config = Config::default();
        config.llm.model = Some(String::from("from-home"));
        config.llm.provider = Some(String::from("anthropic"));

        let layer: toml::Table = toml::from_str("[llm]\nmodel = \"from-project\"\n").unwrap();
        config.merge_table(layer).unwrap();

        assert_eq!(config.llm.model.as_deref(), Some("from-project"));
        assert_eq!(config.llm.provider.as_deref(), Some("anthropic"));
        assert_eq!(config.retry.max_retries, 3);
    }

    #[test]
    fn nested_tables_merge_recursively() {
        let base: toml::Table = toml::from_str("[guard]\nsavepoint_name = \"a\"\nreject_unknown_references = false\n").unwrap();
        let layer: toml::Table = toml::from_str("[guard]\nsavepoint_name = \"b\"\n").unwrap();
        let merged = merge_tables(base, layer);
        let guard = merged["guard"].as_table().unwrap();
        assert_eq!(guard["savepoint_name"].as_str(), Some("b"));
        assert_eq!(guard["reject_unknown_references"].as_bool(), Some(false));
    }

    #[test]
    fn invalid_layer_is_rejected() {
        let mut config = Config::default();
        let layer: toml::Table = toml::from_str("[guard]\ndanger_action = \"explode\"\n").unwrap();
        assert!(config.merge_table(layer).is_err());
    }
}
