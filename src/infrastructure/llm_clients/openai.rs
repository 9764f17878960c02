use super::LLMClient;
use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::{ChatMessage, LLMConfig, LLMProvider};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

/// Chat-completions client for OpenAI and API-compatible servers
/// (OpenRouter, local inference servers).
pub struct OpenAIClient {
    client: reqwest::Client,
}

impl OpenAIClient {
    pub fn new(request_timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(request_timeout)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    fn api_key(config: &LLMConfig) -> Result<Option<String>> {
        match (&config.provider, &config.api_key) {
            (_, Some(key)) if !key.trim().is_empty() => Ok(Some(key.clone())),
            (LLMProvider::Local, _) => Ok(None),
            (provider, _) => Err(AppError::LLMError(format!(
                "Missing API key for {:?} provider",
                provider
            ))),
        }
    }

    fn endpoint(config: &LLMConfig, path: &str) -> String {
        if config.base_url.ends_with('/') {
            format!("{}{}", config.base_url, path)
        } else {
            format!("{}/{}", config.base_url, path)
        }
    }
}

pub(crate) fn build_chat_body(config: &LLMConfig, messages: &[ChatMessage]) -> Value {
    json!({
        "model": config.model,
        "messages": messages,
        "max_tokens": config.max_tokens,
        "temperature": config.temperature,
    })
}

/// Pulls the first choice's content out of a chat-completions payload.
/// A missing `choices` array is a protocol error; a null content is an
/// empty answer.
pub(crate) fn extract_content(json: &Value) -> Result<String> {
    let first = json["choices"]
        .as_array()
        .and_then(|choices| choices.first())
        .ok_or_else(|| AppError::LLMError("Invalid response format: no choices".to_string()))?;

    Ok(first["message"]["content"]
        .as_str()
        .map(|s| s.to_string())
        .unwrap_or_default())
}

#[async_trait]
impl LLMClient for OpenAIClient {
    async fn chat(&self, config: &LLMConfig, messages: &[ChatMessage]) -> Result<String> {
        let api_key = Self::api_key(config)?;
        let url = Self::endpoint(config, "chat/completions");

        let mut request = self.client.post(&url);
        if let Some(api_key) = api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .json(&build_chat_body(config, messages))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Timeout(format!("Chat completion timed out: {}", e))
                } else {
                    AppError::LLMError(format!("Request failed: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::LLMError(format!(
                "API error ({}): {}",
                status, text
            )));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| AppError::LLMError(format!("Failed to parse JSON: {}", e)))?;

        extract_content(&json)
    }

    async fn list_models(&self, config: &LLMConfig) -> Result<Vec<String>> {
        let api_key = Self::api_key(config)?;
        let url = Self::endpoint(config, "models");

        let mut request = self.client.get(&url);
        if let Some(api_key) = api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::LLMError(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::LLMError(format!(
                "API error ({}): {}",
                status, text
            )));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| AppError::LLMError(format!("Failed to parse JSON: {}", e)))?;

        let models = json["data"]
            .as_array()
            .ok_or_else(|| {
                AppError::LLMError("Invalid response format: missing data array".to_string())
            })?
            .iter()
            .filter_map(|m| m["id"].as_str())
            .map(|id| id.to_string())
            .collect();

        Ok(models)
    }
}
