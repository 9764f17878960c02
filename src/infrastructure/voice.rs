use crate::domain::error::{AppError, Result};
use crate::infrastructure::config::VoiceConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SignedUrl {
    pub signed_url: String,
}

/// Fetches short-lived conversation URLs for the browser voice widget so
/// the agent key never leaves the server.
pub struct VoiceClient {
    client: reqwest::Client,
    config: VoiceConfig,
}

impl VoiceClient {
    pub fn new(config: VoiceConfig, request_timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(request_timeout)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            config,
        }
    }

    fn credentials(&self) -> Result<(&str, &str)> {
        let agent_id = self
            .config
            .agent_id
            .as_deref()
            .filter(|id| !id.trim().is_empty());
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty());
        match (agent_id, api_key) {
            (Some(agent_id), Some(api_key)) => Ok((agent_id, api_key)),
            _ => Err(AppError::Internal(
                "Voice agent is not configured (voice.agent_id and voice.api_key are required)"
                    .to_string(),
            )),
        }
    }

    pub(crate) fn endpoint(&self) -> String {
        format!(
            "{}/convai/conversation/get_signed_url",
            self.config.base_url.trim_end_matches('/')
        )
    }

    pub async fn signed_url(&self) -> Result<SignedUrl> {
        let (agent_id, api_key) = self.credentials()?;

        let response = self
            .client
            .get(self.endpoint())
            .query(&[("agent_id", agent_id)])
            .header("xi-api-key", api_key)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Timeout(format!("Signed URL request timed out: {}", e))
                } else {
                    AppError::LLMError(format!("Signed URL request failed: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::LLMError(format!(
                "Voice API error ({}): {}",
                status, text
            )));
        }

        response
            .json::<SignedUrl>()
            .await
            .map_err(|e| AppError::LLMError(format!("Failed to parse signed URL: {}", e)))
    }
}
