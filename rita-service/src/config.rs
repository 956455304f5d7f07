use arc_swap::ArcSwap;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use crate::db::Database;
use crate::error::ServiceResult;

// ==================== Static Configuration (startup-only) ====================

/// Static configuration that cannot be changed at runtime
/// These settings affect server binding or require restart to change
#[derive(Debug, Clone, Deserialize)]
pub struct StaticConfig {
    #[serde(default = "default_server")]
    pub server: ServerConfig,

    #[serde(default = "default_storage")]
    pub storage: StorageConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

// ==================== Dynamic Configuration (hot-reloadable) ====================

/// Dynamic configuration that can be updated at runtime via API
/// DB values override config file/env defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DynamicConfig {
    #[serde(default = "default_openai")]
    pub openai: OpenAiConfig,

    #[serde(default = "default_embeddings")]
    pub embeddings: EmbeddingsConfig,

    #[serde(default = "default_retrieval")]
    pub retrieval: RetrievalConfig,

    #[serde(default = "default_limits")]
    pub limits: LimitsConfig,

    #[serde(default = "default_auth")]
    pub auth: AuthConfig,
}

/// OpenAI-compatible API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    #[serde(default = "default_openai_url")]
    pub base_url: String,

    /// API key is secret material: loaded from env/file only, never
    /// exposed or settable through the settings API
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Embedding generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingsConfig {
    /// Maximum estimated tokens per chunk (1 token ~ 4 chars)
    #[serde(default = "default_chunk_max_tokens")]
    pub chunk_max_tokens: usize,
}

/// Semantic search and chat retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f32,

    #[serde(default = "default_match_count")]
    pub match_count: usize,

    #[serde(default = "default_chat_match_threshold")]
    pub chat_match_threshold: f32,

    #[serde(default = "default_chat_match_count")]
    pub chat_match_count: usize,
}

/// Size limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_max_file_size")]
    pub max_file_size_bytes: u64,
}

/// External auth service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_auth_url")]
    pub base_url: String,

    #[serde(default = "default_auth_timeout_secs")]
    pub request_timeout_secs: u64,
}

// ==================== DynamicConfig Settings Keys ====================

/// All valid setting keys for DynamicConfig
pub const VALID_SETTING_KEYS: &[&str] = &[
    "openai.base_url",
    "openai.embedding_model",
    "openai.chat_model",
    "openai.temperature",
    "openai.max_tokens",
    "openai.request_timeout_secs",
    "embeddings.chunk_max_tokens",
    "retrieval.match_threshold",
    "retrieval.match_count",
    "retrieval.chat_match_threshold",
    "retrieval.chat_match_count",
    "limits.max_file_size_bytes",
    "auth.base_url",
    "auth.request_timeout_secs",
];

impl DynamicConfig {
    /// Get all valid setting keys
    pub fn valid_keys() -> HashSet<&'static str> {
        VALID_SETTING_KEYS.iter().copied().collect()
    }

    /// Convert config to key-value map for API response
    pub fn to_key_value_map(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();

        // OpenAI settings (api_key intentionally omitted)
        map.insert(
            "openai.base_url".to_string(),
            serde_json::Value::String(self.openai.base_url.clone()),
        );
        map.insert(
            "openai.embedding_model".to_string(),
            serde_json::Value::String(self.openai.embedding_model.clone()),
        );
        map.insert(
            "openai.chat_model".to_string(),
            serde_json::Value::String(self.openai.chat_model.clone()),
        );
        map.insert(
            "openai.temperature".to_string(),
            serde_json::json!(self.openai.temperature),
        );
        map.insert(
            "openai.max_tokens".to_string(),
            serde_json::json!(self.openai.max_tokens),
        );
        map.insert(
            "openai.request_timeout_secs".to_string(),
            serde_json::json!(self.openai.request_timeout_secs),
        );

        // Embedding settings
        map.insert(
            "embeddings.chunk_max_tokens".to_string(),
            serde_json::json!(self.embeddings.chunk_max_tokens),
        );

        // Retrieval settings
        map.insert(
            "retrieval.match_threshold".to_string(),
            serde_json::json!(self.retrieval.match_threshold),
        );
        map.insert(
            "retrieval.match_count".to_string(),
            serde_json::json!(self.retrieval.match_count),
        );
        map.insert(
            "retrieval.chat_match_threshold".to_string(),
            serde_json::json!(self.retrieval.chat_match_threshold),
        );
        map.insert(
            "retrieval.chat_match_count".to_string(),
            serde_json::json!(self.retrieval.chat_match_count),
        );

        // Limits settings
        map.insert(
            "limits.max_file_size_bytes".to_string(),
            serde_json::json!(self.limits.max_file_size_bytes),
        );

        // Auth settings
        map.insert(
            "auth.base_url".to_string(),
            serde_json::Value::String(self.auth.base_url.clone()),
        );
        map.insert(
            "auth.request_timeout_secs".to_string(),
            serde_json::json!(self.auth.request_timeout_secs),
        );

        map
    }

    /// Apply DB settings as overrides to this config
    pub fn merge_from_db(&mut self, db_settings: &HashMap<String, serde_json::Value>) {
        for (key, value) in db_settings {
            self.apply_setting(key, value);
        }
    }

    /// Apply a single setting value
    fn apply_setting(&mut self, key: &str, value: &serde_json::Value) {
        match key {
            // OpenAI settings
            "openai.base_url" => {
                if let Some(v) = value.as_str() {
                    self.openai.base_url = v.to_string();
                }
            }
            "openai.embedding_model" => {
                if let Some(v) = value.as_str() {
                    self.openai.embedding_model = v.to_string();
                }
            }
            "openai.chat_model" => {
                if let Some(v) = value.as_str() {
                    self.openai.chat_model = v.to_string();
                }
            }
            "openai.temperature" => {
                if let Some(v) = value.as_f64() {
                    self.openai.temperature = v as f32;
                }
            }
            "openai.max_tokens" => {
                if let Some(v) = value.as_u64() {
                    self.openai.max_tokens = v as u32;
                }
            }
            "openai.request_timeout_secs" => {
                if let Some(v) = value.as_u64() {
                    self.openai.request_timeout_secs = v;
                }
            }

            // Embedding settings
            "embeddings.chunk_max_tokens" => {
                if let Some(v) = value.as_u64() {
                    self.embeddings.chunk_max_tokens = v as usize;
                }
            }

            // Retrieval settings
            "retrieval.match_threshold" => {
                if let Some(v) = value.as_f64() {
                    self.retrieval.match_threshold = v as f32;
                }
            }
            "retrieval.match_count" => {
                if let Some(v) = value.as_u64() {
                    self.retrieval.match_count = v as usize;
                }
            }
            "retrieval.chat_match_threshold" => {
                if let Some(v) = value.as_f64() {
                    self.retrieval.chat_match_threshold = v as f32;
                }
            }
            "retrieval.chat_match_count" => {
                if let Some(v) = value.as_u64() {
                    self.retrieval.chat_match_count = v as usize;
                }
            }

            // Limits settings
            "limits.max_file_size_bytes" => {
                if let Some(v) = value.as_u64() {
                    self.limits.max_file_size_bytes = v;
                }
            }

            // Auth settings
            "auth.base_url" => {
                if let Some(v) = value.as_str() {
                    self.auth.base_url = v.to_string();
                }
            }
            "auth.request_timeout_secs" => {
                if let Some(v) = value.as_u64() {
                    self.auth.request_timeout_secs = v;
                }
            }

            _ => {
                tracing::warn!(key = %key, "Unknown setting key in merge_from_db");
            }
        }
    }
}

// ==================== RuntimeConfig (combines static + dynamic) ====================

/// Runtime configuration manager
/// Combines static config (startup-only) with dynamic config (hot-reloadable via ArcSwap)
pub struct RuntimeConfig {
    /// Static configuration (never changes after startup)
    pub static_config: StaticConfig,
    /// Dynamic configuration (can be hot-reloaded)
    dynamic: ArcSwap<DynamicConfig>,
}

impl RuntimeConfig {
    /// Get current dynamic config snapshot (lock-free read)
    pub fn dynamic(&self) -> arc_swap::Guard<Arc<DynamicConfig>> {
        self.dynamic.load()
    }

    /// Update dynamic config (atomic swap)
    pub fn update_dynamic(&self, new_config: DynamicConfig) {
        self.dynamic.store(Arc::new(new_config));
    }

    /// Load config from all sources with DB overrides
    pub fn load(db: &Database) -> ServiceResult<Self> {
        let static_config = load_static_config()?;

        let mut dynamic = load_dynamic_config()?;
        let db_settings = db.get_all_settings()?;
        dynamic.merge_from_db(&db_settings);

        Ok(Self {
            static_config,
            dynamic: ArcSwap::from_pointee(dynamic),
        })
    }

    /// Rebuild dynamic config from file/env defaults + DB and swap atomically
    pub fn reload_from_db(&self, db: &Database) -> ServiceResult<()> {
        let mut dynamic = load_dynamic_config()?;
        let db_settings = db.get_all_settings()?;
        dynamic.merge_from_db(&db_settings);
        self.update_dynamic(dynamic);
        Ok(())
    }

    #[cfg(test)]
    pub fn for_tests(data_dir: PathBuf) -> Self {
        Self {
            static_config: StaticConfig {
                server: default_server(),
                storage: StorageConfig { data_dir },
            },
            dynamic: ArcSwap::from_pointee(DynamicConfig {
                openai: default_openai(),
                embeddings: default_embeddings(),
                retrieval: default_retrieval(),
                limits: default_limits(),
                auth: default_auth(),
            }),
        }
    }
}

// ==================== Config Loading Functions ====================

/// Load static configuration from file and env vars
fn load_static_config() -> ServiceResult<StaticConfig> {
    Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(
            Environment::with_prefix("RITA")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .map_err(|e| crate::error::ServiceError::Config {
            message: format!("Failed to build config: {}", e),
        })?
        .try_deserialize()
        .map_err(|e| crate::error::ServiceError::Config {
            message: format!("Failed to deserialize static config: {}", e),
        })
}

/// Load dynamic configuration from file and env vars (without DB overrides)
fn load_dynamic_config() -> ServiceResult<DynamicConfig> {
    Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(
            Environment::with_prefix("RITA")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .map_err(|e| crate::error::ServiceError::Config {
            message: format!("Failed to build config: {}", e),
        })?
        .try_deserialize()
        .map_err(|e| crate::error::ServiceError::Config {
            message: format!("Failed to deserialize dynamic config: {}", e),
        })
}

// ==================== Default Value Functions ====================

fn default_server() -> ServerConfig {
    ServerConfig {
        host: default_host(),
        port: default_port(),
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_storage() -> StorageConfig {
    StorageConfig {
        data_dir: default_data_dir(),
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_openai() -> OpenAiConfig {
    OpenAiConfig {
        base_url: default_openai_url(),
        api_key: String::new(),
        embedding_model: default_embedding_model(),
        chat_model: default_chat_model(),
        temperature: default_temperature(),
        max_tokens: default_max_tokens(),
        request_timeout_secs: default_request_timeout_secs(),
    }
}

fn default_openai_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-ada-002".to_string()
}

fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_embeddings() -> EmbeddingsConfig {
    EmbeddingsConfig {
        chunk_max_tokens: default_chunk_max_tokens(),
    }
}

fn default_chunk_max_tokens() -> usize {
    1500
}

fn default_retrieval() -> RetrievalConfig {
    RetrievalConfig {
        match_threshold: default_match_threshold(),
        match_count: default_match_count(),
        chat_match_threshold: default_chat_match_threshold(),
        chat_match_count: default_chat_match_count(),
    }
}

fn default_match_threshold() -> f32 {
    0.7
}

fn default_match_count() -> usize {
    10
}

fn default_chat_match_threshold() -> f32 {
    0.75
}

fn default_chat_match_count() -> usize {
    5
}

fn default_limits() -> LimitsConfig {
    LimitsConfig {
        max_file_size_bytes: default_max_file_size(),
    }
}

fn default_max_file_size() -> u64 {
    52_428_800 // 50MB
}

fn default_auth() -> AuthConfig {
    AuthConfig {
        base_url: default_auth_url(),
        request_timeout_secs: default_auth_timeout_secs(),
    }
}

fn default_auth_url() -> String {
    "http://localhost:9999".to_string()
}

fn default_auth_timeout_secs() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> DynamicConfig {
        DynamicConfig {
            openai: default_openai(),
            embeddings: default_embeddings(),
            retrieval: default_retrieval(),
            limits: default_limits(),
            auth: default_auth(),
        }
    }

    #[test]
    fn db_override_wins_over_default() {
        let mut config = base_config();
        let mut overrides = HashMap::new();
        overrides.insert(
            "retrieval.match_threshold".to_string(),
            serde_json::json!(0.85),
        );
        config.merge_from_db(&overrides);
        assert!((config.retrieval.match_threshold - 0.85).abs() < f32::EPSILON);
    }

    #[test]
    fn unknown_key_is_ignored() {
        let mut config = base_config();
        let mut overrides = HashMap::new();
        overrides.insert("nonsense.key".to_string(), serde_json::json!(42));
        config.merge_from_db(&overrides);
        assert_eq!(config.embeddings.chunk_max_tokens, 1500);
    }

    #[test]
    fn api_key_is_not_in_key_value_map() {
        let config = base_config();
        let map = config.to_key_value_map();
        assert!(!map.contains_key("openai.api_key"));
        for key in map.keys() {
            assert!(DynamicConfig::valid_keys().contains(key.as_str()));
        }
    }
}
