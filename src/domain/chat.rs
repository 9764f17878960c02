use crate::domain::llm_config::ChatMessage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Number;

pub const FALLBACK_FEEDBACK: [&str; 3] = [
    "Unable to analyze the response.",
    "Please try being more specific in your pitch.",
    "Focus on addressing the company's needs directly.",
];

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Trainee turns go out as `user`, persona turns as `assistant`.
    pub fn to_chat_message(&self) -> ChatMessage {
        match self.role {
            MessageRole::User => ChatMessage::user(self.content.clone()),
            MessageRole::Assistant => ChatMessage::assistant(self.content.clone()),
        }
    }
}

/// Score and feedback for a single trainee message. The score keeps the
/// provider's number exactly as written.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Analysis {
    pub feedback: Vec<String>,
    pub score: Number,
}

impl Analysis {
    pub fn fallback() -> Self {
        Self {
            feedback: FALLBACK_FEEDBACK.iter().map(|s| s.to_string()).collect(),
            score: Number::from(0),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self == &Self::fallback()
    }
}

/// One completed exchange: the trainee message, the persona reply and the
/// analysis of the trainee message.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Turn {
    pub user_message: Message,
    pub reply: Message,
    pub analysis: Analysis,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_keeps_provider_number_form() {
        let analysis: Analysis =
            serde_json::from_str(r#"{"feedback":["a"],"score":62}"#).unwrap();
        assert_eq!(
            serde_json::to_string(&analysis).unwrap(),
            r#"{"feedback":["a"],"score":62}"#
        );

        let fractional: Analysis =
            serde_json::from_str(r#"{"feedback":["a"],"score":62.5}"#).unwrap();
        assert_eq!(fractional.score.as_f64(), Some(62.5));
    }

    #[test]
    fn test_fallback_is_recognised() {
        assert!(Analysis::fallback().is_fallback());
        assert_eq!(Analysis::fallback().score, Number::from(0));
    }
}
