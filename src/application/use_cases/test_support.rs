use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::{ChatMessage, LLMConfig};
use crate::infrastructure::llm_clients::LLMClient;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

use super::scoring::SCORING_SYSTEM_PROMPT;

#[derive(Clone, Debug)]
pub enum Reply {
    Text(String),
    Fail(String),
    Hang,
    /// Waits until the test releases the gate, then answers with the text.
    Gate(Arc<Notify>, String),
}

#[derive(Clone, Debug)]
pub struct RecordedCall {
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// LLM stand-in that answers persona and scoring requests from a script.
/// Scoring requests are recognised by their system prompt.
pub struct ScriptedClient {
    persona: Reply,
    scoring: Reply,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedClient {
    pub fn new(persona: Reply, scoring: Reply) -> Self {
        Self {
            persona,
            scoring,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn scoring_calls(&self) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|call| is_scoring(&call.messages))
            .collect()
    }
}

fn is_scoring(messages: &[ChatMessage]) -> bool {
    messages
        .first()
        .map(|m| m.content == SCORING_SYSTEM_PROMPT)
        .unwrap_or(false)
}

#[async_trait]
impl LLMClient for ScriptedClient {
    async fn chat(&self, config: &LLMConfig, messages: &[ChatMessage]) -> Result<String> {
        self.calls.lock().unwrap().push(RecordedCall {
            messages: messages.to_vec(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        });

        let reply = if is_scoring(messages) {
            self.scoring.clone()
        } else {
            self.persona.clone()
        };

        match reply {
            Reply::Text(text) => Ok(text),
            Reply::Fail(message) => Err(AppError::LLMError(message)),
            Reply::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(String::new())
            }
            Reply::Gate(gate, text) => {
                gate.notified().await;
                Ok(text)
            }
        }
    }

    async fn list_models(&self, _config: &LLMConfig) -> Result<Vec<String>> {
        Ok(vec!["scripted".to_string()])
    }
}
