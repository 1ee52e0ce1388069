//! Configuration types for ragfusion.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{FusionError, Result};
use crate::types::IndexService;

/// Placeholder shown instead of secrets.
const REDACTED: &str = "***";

/// Main configuration, built once at startup and passed by reference.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FusionConfig {
    /// Embedding and chat completion API.
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// Vector index service.
    #[serde(default)]
    pub pinecone: PineconeConfig,

    /// Search and fusion tuning.
    #[serde(default)]
    pub search: SearchConfig,
}

/// OpenAI-compatible API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// API key (`OPENAI_API_KEY`).
    #[serde(default)]
    pub api_key: String,

    /// Base URL including the version prefix.
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    /// Model used for embeddings.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Model used for query generation.
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_openai_base_url(),
            embedding_model: default_embedding_model(),
            chat_model: default_chat_model(),
        }
    }
}

/// Pinecone configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PineconeConfig {
    /// API key (`PINECONE_API_KEY`).
    #[serde(default)]
    pub api_key: String,

    /// Primary index name (`PINECONE_INDEX`).
    #[serde(default)]
    pub index_name: String,

    /// Optional secondary index name (`PINECONE_INDEX_TWO`).
    #[serde(default)]
    pub secondary_index_name: Option<String>,

    /// Control plane URL used to resolve index hosts.
    #[serde(default = "default_controller_url")]
    pub controller_url: String,

    /// Data plane host; skips host resolution when set.
    #[serde(default)]
    pub host: Option<String>,

    /// Namespace within the index.
    #[serde(default)]
    pub namespace: Option<String>,
}

impl Default for PineconeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            index_name: String::new(),
            secondary_index_name: None,
            controller_url: default_controller_url(),
            host: None,
            namespace: None,
        }
    }
}

/// Search configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Results fetched from the index per query variant.
    #[serde(default = "default_top_k")]
    pub top_k: u32,

    /// Number of generated query variants.
    #[serde(default = "default_num_queries")]
    pub num_queries: usize,

    /// RRF constant k.
    #[serde(default = "default_rrf_k")]
    pub rrf_k: u32,

    /// Sampling temperature for query generation.
    #[serde(default)]
    pub temperature: f32,

    /// Maximum number of fused results returned.
    #[serde(default = "default_result_limit")]
    pub result_limit: usize,

    /// Timeout applied to each remote call, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            num_queries: 4,
            rrf_k: 60,
            temperature: 0.0,
            result_limit: 10,
            timeout_secs: 30,
        }
    }
}

impl SearchConfig {
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}

// Default value functions

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-ada-002".to_string()
}

fn default_chat_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_controller_url() -> String {
    "https://api.pinecone.io".to_string()
}

fn default_top_k() -> u32 {
    5
}

fn default_num_queries() -> usize {
    4
}

fn default_rrf_k() -> u32 {
    60
}

fn default_result_limit() -> usize {
    10
}

fn default_timeout_secs() -> u64 {
    30
}

impl FusionConfig {
    /// Load configuration from file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| FusionError::config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load configuration from default paths.
    pub fn load_default() -> Result<Self> {
        // Try user config first
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("ragfusion").join("config.toml");
            if user_config.exists() {
                return Self::load(&user_config);
            }
        }

        // Try local config
        let local_config = PathBuf::from("ragfusion.toml");
        if local_config.exists() {
            return Self::load(&local_config);
        }

        Ok(Self::default())
    }

    /// Load from `path` (or the default locations), apply environment
    /// overrides and validate.
    pub fn from_env(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::load_default()?,
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Override settings from environment variables read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(v) = get("OPENAI_API_KEY") {
            self.openai.api_key = v;
        }
        if let Some(v) = get("OPENAI_BASE_URL") {
            self.openai.base_url = v;
        }
        if let Some(v) = get("PINECONE_API_KEY") {
            self.pinecone.api_key = v;
        }
        if let Some(v) = get("PINECONE_INDEX") {
            self.pinecone.index_name = v;
        }
        if let Some(v) = get("PINECONE_INDEX_TWO") {
            self.pinecone.secondary_index_name = Some(v);
        }
        if let Some(v) = get("PINECONE_HOST") {
            self.pinecone.host = Some(v);
        }
        if let Some(v) = get("PINECONE_NAMESPACE") {
            self.pinecone.namespace = Some(v);
        }
    }

    /// Check that required credentials are present.
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.openai.api_key.is_empty() {
            missing.push("OPENAI_API_KEY");
        }
        if self.pinecone.api_key.is_empty() {
            missing.push("PINECONE_API_KEY");
        }
        if self.pinecone.index_name.is_empty() {
            missing.push("PINECONE_INDEX");
        }

        if !missing.is_empty() {
            return Err(FusionError::config(format!(
                "Missing required environment variables: {}",
                missing.join(", ")
            )));
        }

        if self.search.rrf_k == 0 {
            return Err(FusionError::config("search.rrf_k must be positive"));
        }
        if self.search.timeout_secs == 0 {
            return Err(FusionError::config("search.timeout_secs must be positive"));
        }

        Ok(())
    }

    /// Resolve the index name for a service.
    pub fn index_name(&self, service: IndexService) -> Result<&str> {
        match service {
            IndexService::Primary => Ok(&self.pinecone.index_name),
            IndexService::Secondary => self
                .pinecone
                .secondary_index_name
                .as_deref()
                .ok_or_else(|| {
                    FusionError::config(
                        "secondary index requested but PINECONE_INDEX_TWO is not set",
                    )
                }),
        }
    }

    /// Copy of the configuration with secrets masked, for display.
    pub fn redacted(&self) -> Self {
        let mask = |s: &str| {
            if s.is_empty() {
                String::new()
            } else {
                REDACTED.to_string()
            }
        };

        let mut config = self.clone();
        config.openai.api_key = mask(&self.openai.api_key);
        config.pinecone.api_key = mask(&self.pinecone.api_key);
        config
    }
}
