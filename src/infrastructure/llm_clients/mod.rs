pub mod gemini;
pub mod openai;

use crate::domain::error::Result;
use crate::domain::llm_config::{ChatMessage, LLMConfig, LLMProvider};
use async_trait::async_trait;
use gemini::GeminiClient;
use openai::OpenAIClient;

#[async_trait]
pub trait LLMClient {
    /// Runs a chat completion over role-tagged messages. Returns an empty
    /// string when the provider answers without content.
    async fn chat(&self, config: &LLMConfig, messages: &[ChatMessage]) -> Result<String>;

    async fn list_models(&self, config: &LLMConfig) -> Result<Vec<String>>;
}

pub struct RouterClient {
    openai: OpenAIClient,
    gemini: GeminiClient,
}

impl RouterClient {
    pub fn new(request_timeout: std::time::Duration) -> Self {
        Self {
            openai: OpenAIClient::new(request_timeout),
            gemini: GeminiClient::new(request_timeout),
        }
    }
}

#[async_trait]
impl LLMClient for RouterClient {
    async fn chat(&self, config: &LLMConfig, messages: &[ChatMessage]) -> Result<String> {
        match config.provider {
            LLMProvider::Gemini => self.gemini.chat(config, messages).await,
            _ => self.openai.chat(config, messages).await,
        }
    }

    async fn list_models(&self, config: &LLMConfig) -> Result<Vec<String>> {
        match config.provider {
            LLMProvider::Gemini => self.gemini.list_models(config).await,
            _ => self.openai.list_models(config).await,
        }
    }
}
