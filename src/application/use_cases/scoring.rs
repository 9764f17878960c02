use crate::application::use_cases::scenario_context::ScenarioContext;
use crate::domain::chat::Analysis;
use crate::domain::llm_config::{ChatMessage, LLMConfig};
use crate::infrastructure::llm_clients::LLMClient;
use crate::infrastructure::response::{clean_llm_response, strip_code_fence};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub const SCORING_SYSTEM_PROMPT: &str =
    "You are a sales coach providing concise, actionable feedback.";

pub fn build_scoring_prompt(message: &str, context: &ScenarioContext) -> String {
    format!(
        r#"Analyze my response in 3 clear sentences and provide a score out of 100.

My Message: "{}"

{}

Provide your analysis as a JSON object with two fields:
1. "feedback": An array of exactly 3 sentences analyzing the response
2. "score": A number from 0-100 representing overall effectiveness

Example format:
{{
  "feedback": [
    "First observation about the response.",
    "Second point about effectiveness.",
    "Third point with suggestion for improvement."
  ],
  "score": 75
}}"#,
        message,
        context.render()
    )
}

/// Reads a scoring payload. `None` means the output is unusable: not JSON,
/// `feedback` missing or not an array of strings, or `score` not a number.
pub fn parse_analysis(raw: &str) -> Option<Analysis> {
    let payload = strip_code_fence(&clean_llm_response(raw));
    let value: Value = serde_json::from_str(&payload).ok()?;

    let feedback = value
        .get("feedback")?
        .as_array()?
        .iter()
        .map(|item| item.as_str().map(str::to_string))
        .collect::<Option<Vec<_>>>()?;
    let score = match value.get("score")? {
        Value::Number(score) => score.clone(),
        _ => return None,
    };

    Some(Analysis { feedback, score })
}

/// Scores one trainee utterance. Never fails: provider errors, timeouts and
/// malformed output all degrade to `Analysis::fallback()`.
pub struct ResponseScorer {
    llm_client: Arc<dyn LLMClient + Send + Sync>,
    config: LLMConfig,
}

impl ResponseScorer {
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

    pub async fn score(&self, message: &str, context: &ScenarioContext) -> Analysis {
        let messages = [
            ChatMessage::system(SCORING_SYSTEM_PROMPT),
            ChatMessage::user(build_scoring_prompt(message, context)),
        ];

        let raw = match self.llm_client.chat(&self.config, &messages).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!(error = %err, "Scoring call failed; using fallback analysis");
                return Analysis::fallback();
            }
        };

        parse_analysis(&raw).unwrap_or_else(|| {
            warn!(
                output_len = raw.len(),
                "Scoring output was not valid analysis JSON; using fallback analysis"
            );
            Analysis::fallback()
        })
    }

    /// Like `score`, but a call that outlives `limit` also yields the fallback.
    pub async fn score_within(
        &self,
        limit: Duration,
        message: &str,
        context: &ScenarioContext,
    ) -> Analysis {
        match tokio::time::timeout(limit, self.score(message, context)).await {
            Ok(analysis) => analysis,
            Err(_) => {
                warn!(timeout_ms = limit.as_millis() as u64, "Scoring call timed out");
                Analysis::fallback()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::use_cases::test_support::{Reply, ScriptedClient};
    use pretty_assertions::assert_eq;
    use serde_json::Number;

    fn context() -> ScenarioContext {
        ScenarioContext {
            background: "B".to_string(),
            situation: "S".to_string(),
            metrics: "Clarity (Weight: 3):\nD".to_string(),
        }
    }

    fn scorer(scoring: Reply) -> (Arc<ScriptedClient>, ResponseScorer) {
        let client = Arc::new(ScriptedClient::new(Reply::Text(String::new()), scoring));
        let scorer = ResponseScorer::new(client.clone(), &LLMConfig::default(), 0.3, 500);
        (client, scorer)
    }

    #[test]
    fn test_well_formed_payload_is_returned_unchanged() {
        let raw = r#"{"feedback":["Good opening.","Lacks specifics.","Add a number."],"score":62}"#;
        assert_eq!(
            parse_analysis(raw),
            Some(Analysis {
                feedback: vec![
                    "Good opening.".to_string(),
                    "Lacks specifics.".to_string(),
                    "Add a number.".to_string(),
                ],
                score: Number::from(62),
            })
        );
    }

    #[test]
    fn test_score_bounds_pass_through() {
        for score in [0, 1, 50, 99, 100] {
            let raw = format!(r#"{{"feedback":["a","b","c"],"score":{}}}"#, score);
            assert_eq!(parse_analysis(&raw).unwrap().score, Number::from(score));
        }
    }

    #[test]
    fn test_fenced_payload_parses_like_bare_json() {
        let bare = r#"{"feedback":["a","b","c"],"score":50}"#;
        let fenced = format!("```json\n{}\n```", bare);
        let plain_fenced = format!("```\n{}\n```", bare);

        assert_eq!(parse_analysis(&fenced), parse_analysis(bare));
        assert_eq!(parse_analysis(&plain_fenced), parse_analysis(bare));
        assert!(parse_analysis(bare).is_some());
    }

    #[test]
    fn test_malformed_payloads_are_rejected() {
        let cases = [
            "Great pitch, I'd give it 80.",
            "{\"feedback\": [\"a\", \"b\", \"c\"], \"score\": 5",
            r#"{"score": 50}"#,
            r#"{"feedback": "all good", "score": 50}"#,
            r#"{"feedback": ["a", "b", "c"], "score": "fifty"}"#,
            r#"{"feedback": ["a", "b", "c"]}"#,
            r#"{"feedback": [1, 2, 3], "score": 50}"#,
            "",
        ];
        for raw in cases {
            assert_eq!(parse_analysis(raw), None, "accepted: {}", raw);
        }
    }

    #[test]
    fn test_prompt_embeds_message_and_context() {
        let prompt = build_scoring_prompt("I think our product saves you 20% on costs", &context());
        assert!(prompt.contains("My Message: \"I think our product saves you 20% on costs\""));
        assert!(prompt.contains("Clarity (Weight: 3):\nD"));
        assert!(prompt.contains("\"score\": 75"));
    }

    #[tokio::test]
    async fn test_score_returns_provider_analysis() {
        let (client, scorer) = scorer(Reply::Text(
            r#"{"feedback":["Good opening.","Lacks specifics.","Add a number."],"score":62}"#.into(),
        ));

        let analysis = scorer
            .score("I think our product saves you 20% on costs", &context())
            .await;

        assert_eq!(analysis.score, Number::from(62));
        assert_eq!(
            analysis.feedback,
            vec!["Good opening.", "Lacks specifics.", "Add a number."]
        );
        let calls = client.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].temperature, Some(0.3));
    }

    #[tokio::test]
    async fn test_non_json_output_falls_back() {
        let (_, scorer) = scorer(Reply::Text("Solid pitch overall!".into()));
        let analysis = scorer
            .score("I think our product saves you 20% on costs", &context())
            .await;
        assert_eq!(analysis, Analysis::fallback());
        assert_eq!(analysis.score, Number::from(0));
    }

    #[tokio::test]
    async fn test_provider_error_falls_back() {
        let (_, scorer) = scorer(Reply::Fail("rate limited".into()));
        assert_eq!(scorer.score("hello", &context()).await, Analysis::fallback());
    }

    #[tokio::test]
    async fn test_timeout_falls_back() {
        let (_, scorer) = scorer(Reply::Hang);
        let analysis = scorer
            .score_within(Duration::from_millis(20), "hello", &context())
            .await;
        assert!(analysis.is_fallback());
    }
}
