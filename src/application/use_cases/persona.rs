use crate::application::use_cases::scenario_context::ScenarioContext;
use crate::domain::chat::Message;
use crate::domain::error::Result;
use crate::domain::llm_config::{ChatMessage, LLMConfig};
use crate::infrastructure::llm_clients::LLMClient;
use std::sync::Arc;
use tracing::debug;

pub fn build_persona_prompt(context: &ScenarioContext) -> String {
    format!(
        "You are the CEO of a company in a sales meeting. Here's your context:

You are:
- The CEO of a company with the following background:
{}

Current Situation:
{}

Your role:
- Stay in character as the CEO throughout the conversation
- Be realistic, busy, and appropriately skeptical
- Ask challenging questions about their solution
- Show interest if they make compelling points
- Express concerns if they don't address your needs
- Don't evaluate or analyze their responses directly - that's handled separately
- Keep responses concise and focused

Remember: You are the CEO making a buying decision, not an evaluator. Respond naturally as a CEO would in this situation.",
        context.background, context.situation
    )
}

pub fn build_persona_messages(history: &[Message], context: &ScenarioContext) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(ChatMessage::system(build_persona_prompt(context)));
    messages.extend(history.iter().map(Message::to_chat_message));
    messages
}

/// Produces the simulated executive's next reply. Provider errors are
/// returned to the caller untouched.
pub struct PersonaResponder {
    llm_client: Arc<dyn LLMClient + Send + Sync>,
    config: LLMConfig,
}

impl PersonaResponder {
    pub fn new(
        llm_client: Arc<dyn LLMClient + Send + Sync>,
        base_config: &LLMConfig,
        temperature: f32,
        max_tokens: u32,
    ) -> Self {
        Self {
            llm_client,
            config: base_config.with_sampling(temperature, max_tokens),
        }
    }

    pub async fn respond(&self, history: &[Message], context: &ScenarioContext) -> Result<String> {
        let messages = build_persona_messages(history, context);
        debug!(history_len = history.len(), "Requesting persona reply");
        self.llm_client.chat(&self.config, &messages).await
    }
}
