//! Layered service configuration.
//!
//! Sources, lowest to highest priority: built-in defaults, `salescoach.toml`
//! (or the file named by `SALESCOACH_CONFIG`), then `SALESCOACH_*`
//! environment variables with `__` separating sections, e.g.
//! `SALESCOACH_LLM__API_KEY` -> `llm.api_key`.

use crate::application::use_cases::exchange::ExchangeSettings;
use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::{LLMConfig, LLMProvider};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const CONFIG_PATH_ENV: &str = "SALESCOACH_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "salescoach.toml";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub log_filter: String,
    pub database_url: String,
    pub database_max_connections: u32,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmSettings,
    #[serde(default)]
    pub voice: VoiceConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            database_url: "sqlite://salescoach.db".to_string(),
            database_max_connections: 4,
            server: ServerConfig::default(),
            llm: LlmSettings::default(),
            voice: VoiceConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmSettings {
    pub provider: LLMProvider,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub persona_temperature: f32,
    pub scoring_temperature: f32,
    pub request_timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        let exchange = ExchangeSettings::default();
        let llm = LLMConfig::default();
        Self {
            provider: llm.provider,
            base_url: llm.base_url,
            model: llm.model,
            api_key: None,
            max_tokens: exchange.max_tokens,
            persona_temperature: exchange.persona_temperature,
            scoring_temperature: exchange.scoring_temperature,
            request_timeout_secs: exchange.request_timeout.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VoiceConfig {
    pub base_url: String,
    pub agent_id: Option<String>,
    pub api_key: Option<String>,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.elevenlabs.io/v1".to_string(),
            agent_id: None,
            api_key: None,
        }
    }
}

impl AppConfig {
    /// Loads `.env` first, then the figment chain.
    pub fn load_with_dotenv() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::load()
    }

    pub fn load() -> Result<Self> {
        let config: Self = Self::figment()
            .extract()
            .map_err(|e| AppError::ValidationError(format!("Invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn figment() -> Figment {
        let path = std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));

        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("SALESCOACH_").ignore(&["config"]).split("__"))
    }

    fn validate(&self) -> Result<()> {
        if self.llm.model.trim().is_empty() {
            return Err(AppError::ValidationError("llm.model is empty".to_string()));
        }
        if self.llm.base_url.trim().is_empty() {
            return Err(AppError::ValidationError("llm.base_url is empty".to_string()));
        }
        if self.llm.max_tokens == 0 {
            return Err(AppError::ValidationError(
                "llm.max_tokens must be positive".to_string(),
            ));
        }
        if self.llm.request_timeout_secs == 0 {
            return Err(AppError::ValidationError(
                "llm.request_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn llm_config(&self) -> LLMConfig {
        LLMConfig {
            provider: self.llm.provider.clone(),
            base_url: self.llm.base_url.clone(),
            model: self.llm.model.clone(),
            api_key: self.llm.api_key.clone().filter(|key| !key.trim().is_empty()),
            max_tokens: Some(self.llm.max_tokens),
            temperature: None,
        }
    }

    pub fn exchange_settings(&self) -> ExchangeSettings {
        ExchangeSettings {
            persona_temperature: self.llm.persona_temperature,
            scoring_temperature: self.llm.scoring_temperature,
            max_tokens: self.llm.max_tokens,
            request_timeout: self.request_timeout(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.llm.request_timeout_secs)
    }
}
