use crate::application::use_cases::persona::PersonaResponder;
use crate::application::use_cases::scenario_context::ScenarioContext;
use crate::application::use_cases::scoring::ResponseScorer;
use crate::domain::chat::{Analysis, Message, Turn};
use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::LLMConfig;
use crate::domain::scenario::Scenario;
use crate::infrastructure::llm_clients::LLMClient;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Sampling and time bounds for the two calls of a turn.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeSettings {
    pub persona_temperature: f32,
    pub scoring_temperature: f32,
    pub max_tokens: u32,
    pub request_timeout: Duration,
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self {
            persona_temperature: 0.7,
            scoring_temperature: 0.3,
            max_tokens: 500,
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// Runs one trainee turn: the persona reply over the full history and the
/// score of the newest message, concurrently, published together or not
/// at all.
pub struct ExchangeUseCase {
    persona: PersonaResponder,
    scorer: ResponseScorer,
    request_timeout: Duration,
}

impl ExchangeUseCase {
    pub fn new(
        llm_client: Arc<dyn LLMClient + Send + Sync>,
        llm_config: &LLMConfig,
        settings: &ExchangeSettings,
    ) -> Self {
        Self {
            persona: PersonaResponder::new(
                llm_client.clone(),
                llm_config,
                settings.persona_temperature,
                settings.max_tokens,
            ),
            scorer: ResponseScorer::new(
                llm_client,
                llm_config,
                settings.scoring_temperature,
                settings.max_tokens,
            ),
            request_timeout: settings.request_timeout,
        }
    }

    pub async fn execute(
        &self,
        scenario: &Scenario,
        history: &[Message],
        content: String,
    ) -> Result<Turn> {
        if content.trim().is_empty() {
            return Err(AppError::ValidationError("Message is empty.".to_string()));
        }

        let context = ScenarioContext::build(scenario);
        let user_message = Message::user(content);

        let mut updated = history.to_vec();
        updated.push(user_message.clone());

        let (reply, analysis) = tokio::join!(
            self.reply(&updated, &context),
            self.scorer
                .score_within(self.request_timeout, &user_message.content, &context),
        );

        let reply = match reply.and_then(non_empty_reply) {
            Ok(reply) => reply,
            Err(err) => {
                warn!(scenario_id = %scenario.id, error = %err, "Turn aborted; nothing published");
                return Err(err);
            }
        };

        info!(
            scenario_id = %scenario.id,
            history_len = updated.len(),
            score = %analysis.score,
            fallback = analysis.is_fallback(),
            "Turn completed"
        );

        Ok(Turn {
            user_message,
            reply: Message::assistant(reply),
            analysis,
        })
    }

    /// Scores a single message without a persona reply.
    pub async fn analyze(&self, scenario: &Scenario, message: &str) -> Analysis {
        let context = ScenarioContext::build(scenario);
        self.scorer
            .score_within(self.request_timeout, message, &context)
            .await
    }

    /// Persona reply over `history` with the timeout applied. Content is
    /// returned as the provider gave it, empty included.
    pub async fn reply(&self, history: &[Message], context: &ScenarioContext) -> Result<String> {
        tokio::time::timeout(self.request_timeout, self.persona.respond(history, context))
            .await
            .map_err(|_| {
                AppError::Timeout(format!(
                    "Persona reply not received within {}s; please resend your message",
                    self.request_timeout.as_secs()
                ))
            })?
    }
}

/// A turn cannot be published without persona content.
fn non_empty_reply(reply: String) -> Result<String> {
    if reply.trim().is_empty() {
        return Err(AppError::LLMError(
            "Provider returned an empty persona reply".to_string(),
        ));
    }
    Ok(reply)
}
