use config::{Config, ConfigError, Environment, File};
use notechat_sdk::{ApiKey, MemoryConfig, Provider, ProviderConfig, ProviderOptions};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

use crate::core::note_update::NoteHistoryMode;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub providers: ProvidersConfig,
    pub memory: MemorySettings,
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AuthConfig {
    pub enabled: bool,
    pub secret_key: String,
    /// Identity provider's RS256 public key; takes precedence over `secret_key`
    #[serde(default)]
    pub public_key_pem: Option<String>,
    pub token_expiry_hours: i64,
    /// Subject assigned to every request when authentication is disabled
    pub dev_subject: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProviderEndpoint {
    pub base_url: String,
    pub default_model: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub timeout_seconds: u64,
    pub max_tokens: u32,
    pub temperature: f32,
    pub openai: ProviderEndpoint,
    pub gemini: ProviderEndpoint,
}

impl ProvidersConfig {
    fn endpoint(&self, provider: Provider) -> &ProviderEndpoint {
        match provider {
            Provider::OpenAi => &self.openai,
            Provider::Gemini => &self.gemini,
        }
    }

    pub fn default_model(&self, provider: Provider) -> &str {
        &self.endpoint(provider).default_model
    }

    /// Requested model id, or the provider's default when none was given
    pub fn resolve_model(&self, provider: Provider, requested: Option<&str>) -> String {
        requested
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| self.default_model(provider))
            .to_string()
    }

    pub fn client_config(&self) -> ProviderConfig {
        ProviderConfig {
            openai_base_url: self.openai.base_url.clone(),
            gemini_base_url: self.gemini.base_url.clone(),
            timeout: Duration::from_secs(self.timeout_seconds),
            options: ProviderOptions {
                max_tokens: self.max_tokens,
                temperature: self.temperature,
            },
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MemorySettings {
    pub base_url: String,
    pub api_key: String,
    pub timeout_seconds: u64,
    pub chat_top_k: usize,
    pub note_history_limit: usize,
    pub note_history: NoteHistoryMode,
    /// Capacity of the background write queue
    pub writer_queue: usize,
}

impl MemorySettings {
    pub fn client_config(&self) -> MemoryConfig {
        MemoryConfig {
            base_url: self.base_url.clone(),
            api_key: ApiKey::new(self.api_key.clone()),
            timeout: Duration::from_secs(self.timeout_seconds),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Neo4j,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Neo4jSettings {
    pub uri: String,
    pub user: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub neo4j: Neo4jSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
        Self::load(Path::new("config"), &run_mode)
    }

    /// Defaults, then `{dir}/{run_mode}`, then `{dir}/local`, then
    /// `NOTECHAT__*` environment variables.
    pub fn load(dir: &Path, run_mode: &str) -> Result<Self, ConfigError> {
        let mode_file = dir.join(run_mode);
        let local_file = dir.join("local");

        let s = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("auth.enabled", true)?
            .set_default("auth.secret_key", "change-me-in-production")?
            .set_default("auth.token_expiry_hours", 24)?
            .set_default("auth.dev_subject", "local-dev-user")?
            .set_default("providers.timeout_seconds", 60)?
            .set_default("providers.max_tokens", 1000)?
            .set_default("providers.temperature", 0.7)?
            .set_default("providers.openai.base_url", "https://api.openai.com")?
            .set_default("providers.openai.default_model", "gpt-4o-mini")?
            .set_default(
                "providers.gemini.base_url",
                "https://generativelanguage.googleapis.com",
            )?
            .set_default("providers.gemini.default_model", "gemini-1.5-flash")?
            .set_default("memory.base_url", "https://api.mem0.ai")?
            .set_default("memory.api_key", "")?
            .set_default("memory.timeout_seconds", 30)?
            .set_default("memory.chat_top_k", 5)?
            .set_default("memory.note_history_limit", 10)?
            .set_default("memory.note_history", "session_filter")?
            .set_default("memory.writer_queue", 256)?
            .set_default("storage.backend", "memory")?
            .set_default("storage.neo4j.uri", "bolt://localhost:7687")?
            .set_default("storage.neo4j.user", "neo4j")?
            .set_default("storage.neo4j.password", "password")?
            .add_source(File::with_name(&mode_file.to_string_lossy()).required(false))
            .add_source(File::with_name(&local_file.to_string_lossy()).required(false))
            .add_source(Environment::with_prefix("NOTECHAT").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
