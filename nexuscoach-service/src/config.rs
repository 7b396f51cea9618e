//! Service configuration loaded from `config.toml` and `NEXUSCOACH__*` env vars.

use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ServiceError, ServiceResult};

const ENV_PREFIX: &str = "NEXUSCOACH";

/// Full service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_server")]
    pub server: ServerConfig,

    #[serde(default = "default_storage")]
    pub storage: StorageConfig,

    #[serde(default = "default_session")]
    pub session: SessionConfig,

    #[serde(default = "default_llm")]
    pub llm: LlmConfig,

    #[serde(default = "default_stt")]
    pub stt: SttConfig,

    #[serde(default)]
    pub knowledge: KnowledgeConfig,
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

    /// Write turn logs, session logs and advice feedback to SQLite
    #[serde(default = "default_true")]
    pub persist_logs: bool,
}

impl StorageConfig {
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("nexuscoach.db")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionBackend {
    #[default]
    Memory,
    Sqlite,
}

/// Session store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub backend: SessionBackend,

    /// History entries kept per session
    #[serde(default = "default_max_history")]
    pub max_history: usize,

    /// Inactivity after which a session is gone
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    /// Localized templates only
    #[default]
    Rules,
    Gemini,
    Ollama,
}

/// Text generation configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProvider,

    #[serde(default = "default_llm_model")]
    pub model: String,

    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

impl LlmConfig {
    /// Configured base URL, or the provider's public endpoint
    pub fn base_url(&self) -> String {
        let url = match (&self.base_url, self.provider) {
            (Some(url), _) => url.clone(),
            (None, LlmProvider::Ollama) => "http://localhost:11434".to_string(),
            (None, _) => "https://generativelanguage.googleapis.com".to_string(),
        };
        url.trim_end_matches('/').to_string()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Non-empty API key
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SttProvider {
    #[default]
    #[serde(alias = "open_ai")]
    Openai,
    Disabled,
}

/// Speech-to-text configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SttConfig {
    #[serde(default)]
    pub provider: SttProvider,

    #[serde(default = "default_stt_model")]
    pub model: String,

    #[serde(default = "default_stt_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_stt_timeout")]
    pub timeout_secs: u64,
}

impl SttConfig {
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }
}

/// Game catalog sources
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KnowledgeConfig {
    /// Local catalog JSON (same schema as the embedded one)
    #[serde(default)]
    pub data_path: Option<PathBuf>,

    /// Remote catalog JSON, takes precedence over `data_path`
    #[serde(default)]
    pub sync_url: Option<String>,
}

impl AppConfig {
    /// Load from `config.toml` (optional) and environment
    pub fn load() -> ServiceResult<Self> {
        Self::from_builder(
            Config::builder()
                .add_source(File::with_name("config").required(false))
                .add_source(env_source()),
        )
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> ServiceResult<Self> {
        builder
            .build()
            .map_err(|e| ServiceError::Config {
                message: format!("Failed to build config: {}", e),
            })?
            .try_deserialize()
            .map_err(|e| ServiceError::Config {
                message: format!("Failed to deserialize config: {}", e),
            })
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
}

// Default value functions
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
    8000
}

fn default_storage() -> StorageConfig {
    StorageConfig {
        data_dir: default_data_dir(),
        persist_logs: true,
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_true() -> bool {
    true
}

fn default_session() -> SessionConfig {
    SessionConfig {
        backend: SessionBackend::default(),
        max_history: default_max_history(),
        ttl_secs: default_ttl_secs(),
    }
}

fn default_max_history() -> usize {
    20
}

fn default_ttl_secs() -> u64 {
    6 * 60 * 60
}

fn default_llm() -> LlmConfig {
    LlmConfig {
        provider: LlmProvider::default(),
        model: default_llm_model(),
        base_url: None,
        api_key: None,
        temperature: default_temperature(),
        top_p: default_top_p(),
        max_output_tokens: default_max_output_tokens(),
        timeout_secs: default_llm_timeout(),
    }
}

fn default_llm_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_temperature() -> f32 {
    0.5
}

fn default_top_p() -> f32 {
    0.9
}

fn default_max_output_tokens() -> u32 {
    180
}

fn default_llm_timeout() -> u64 {
    20
}

fn default_stt() -> SttConfig {
    SttConfig {
        provider: SttProvider::default(),
        model: default_stt_model(),
        base_url: default_stt_base_url(),
        api_key: None,
        timeout_secs: default_stt_timeout(),
    }
}

fn default_stt_model() -> String {
    "whisper-1".to_string()
}

fn default_stt_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_stt_timeout() -> u64 {
    30
}
