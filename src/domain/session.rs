use crate::domain::chat::{Analysis, Message, Turn};
use crate::domain::error::{AppError, Result};
use crate::domain::scenario::Scenario;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub const OPENING_LINE: &str = "Hello, it's a pleasure to have you. I'm interested in hearing how your solution can help us. Please proceed with your pitch.";

/// Per-trainee conversation state. Each session is an independent value;
/// nothing here is shared between sessions.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TrainingSession {
    pub id: String,
    pub user_id: String,
    pub scenario_id: String,
    pub time_limit_minutes: i64,
    pub max_questions: i64,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub question_count: i64,
    pub messages: Vec<Message>,
    pub current_analysis: Option<Analysis>,
    #[serde(skip)]
    turn_in_flight: bool,
}

impl TrainingSession {
    pub fn start(id: String, user_id: String, scenario: &Scenario) -> Self {
        Self {
            id,
            user_id,
            scenario_id: scenario.id.clone(),
            time_limit_minutes: scenario.time_limit,
            max_questions: scenario.max_questions,
            started_at: Utc::now(),
            ended_at: None,
            question_count: 0,
            messages: vec![Message::assistant(OPENING_LINE)],
            current_analysis: None,
            turn_in_flight: false,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.ended_at.is_some()
    }

    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> i64 {
        let end = self.ended_at.unwrap_or(now);
        (end - self.started_at).num_seconds().max(0)
    }

    /// When the session stopped accepting turns: its end, or the close of
    /// its time window.
    pub fn closes_at(&self) -> DateTime<Utc> {
        self.ended_at
            .unwrap_or(self.started_at + Duration::minutes(self.time_limit_minutes))
    }

    pub fn is_turn_in_flight(&self) -> bool {
        self.turn_in_flight
    }

    /// Checks that a new trainee turn may start and marks it in flight.
    /// Returns the history the exchange should run against.
    pub fn begin_turn(&mut self, now: DateTime<Utc>) -> Result<Vec<Message>> {
        if self.is_complete() {
            return Err(AppError::ValidationError(
                "Training session has already ended.".to_string(),
            ));
        }
        if now - self.started_at > Duration::minutes(self.time_limit_minutes) {
            self.ended_at = Some(now);
            return Err(AppError::ValidationError(
                "Time limit reached; the session has ended.".to_string(),
            ));
        }
        if self.question_count >= self.max_questions {
            return Err(AppError::ValidationError(format!(
                "Question limit of {} reached.",
                self.max_questions
            )));
        }
        if self.turn_in_flight {
            return Err(AppError::ValidationError(
                "A message is already being processed for this session.".to_string(),
            ));
        }
        self.turn_in_flight = true;
        Ok(self.messages.clone())
    }

    /// Publishes a completed turn: both messages and the analysis land together.
    /// A session ended while the turn ran keeps its final transcript.
    pub fn apply_turn(&mut self, turn: Turn) -> Result<()> {
        self.turn_in_flight = false;
        if self.is_complete() {
            return Err(AppError::ValidationError(
                "Training session ended before the reply arrived.".to_string(),
            ));
        }
        self.messages.push(turn.user_message);
        self.messages.push(turn.reply);
        self.current_analysis = Some(turn.analysis);
        self.question_count += 1;
        Ok(())
    }

    /// Releases the in-flight marker after a failed turn without touching
    /// the transcript.
    pub fn abort_turn(&mut self) {
        self.turn_in_flight = false;
    }

    pub fn end(&mut self, now: DateTime<Utc>) {
        if self.ended_at.is_none() {
            self.ended_at = Some(now);
        }
    }

    pub fn reset(&mut self, now: DateTime<Utc>) {
        self.started_at = now;
        self.ended_at = None;
        self.question_count = 0;
        self.messages = vec![Message::assistant(OPENING_LINE)];
        self.current_analysis = None;
        self.turn_in_flight = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::scenario::{ScenarioDraft, ScenarioMeta};
    use serde_json::Number;

    fn scenario(max_questions: i64) -> Scenario {
        ScenarioDraft {
            title: "Pitch".to_string(),
            max_questions: Some(max_questions),
            time_limit: Some(10),
            ..Default::default()
        }
        .into_scenario(ScenarioMeta {
            id: "scn".to_string(),
            created_by: None,
            created_at: 0,
            updated_at: 0,
        })
    }

    fn turn(text: &str) -> Turn {
        Turn {
            user_message: Message::user(text),
            reply: Message::assistant("Go on."),
            analysis: Analysis {
                feedback: vec!["a".into(), "b".into(), "c".into()],
                score: Number::from(40),
            },
        }
    }

    #[test]
    fn test_start_opens_with_greeting() {
        let session = TrainingSession::start("s1".into(), "u1".into(), &scenario(3));
        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.messages[0].content, OPENING_LINE);
        assert_eq!(session.question_count, 0);
        assert!(session.current_analysis.is_none());
    }

    #[test]
    fn test_apply_turn_publishes_both() {
        let mut session = TrainingSession::start("s1".into(), "u1".into(), &scenario(3));
        let history = session.begin_turn(Utc::now()).unwrap();
        assert_eq!(history.len(), 1);

        session.apply_turn(turn("hello")).unwrap();
        assert_eq!(session.messages.len(), 3);
        assert_eq!(session.question_count, 1);
        assert_eq!(session.current_analysis.as_ref().unwrap().score, Number::from(40));
        assert!(!session.is_turn_in_flight());
    }

    #[test]
    fn test_second_turn_rejected_while_in_flight() {
        let mut session = TrainingSession::start("s1".into(), "u1".into(), &scenario(3));
        session.begin_turn(Utc::now()).unwrap();
        assert!(session.begin_turn(Utc::now()).is_err());

        session.abort_turn();
        assert!(session.begin_turn(Utc::now()).is_ok());
        assert_eq!(session.messages.len(), 1);
    }

    #[test]
    fn test_question_limit() {
        let mut session = TrainingSession::start("s1".into(), "u1".into(), &scenario(1));
        session.begin_turn(Utc::now()).unwrap();
        session.apply_turn(turn("one")).unwrap();
        assert!(matches!(
            session.begin_turn(Utc::now()),
            Err(AppError::ValidationError(_))
        ));
    }

    #[test]
    fn test_time_limit_ends_session() {
        let mut session = TrainingSession::start("s1".into(), "u1".into(), &scenario(3));
        let later = session.started_at + Duration::minutes(11);
        assert!(session.begin_turn(later).is_err());
        assert!(session.is_complete());
    }

    #[test]
    fn test_turn_landing_after_end_is_dropped() {
        let mut session = TrainingSession::start("s1".into(), "u1".into(), &scenario(3));
        session.begin_turn(Utc::now()).unwrap();
        session.end(Utc::now());

        assert!(matches!(
            session.apply_turn(turn("late")),
            Err(AppError::ValidationError(_))
        ));
        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.question_count, 0);
        assert!(session.current_analysis.is_none());
        assert!(!session.is_turn_in_flight());
    }

    #[test]
    fn test_closes_at_follows_end_or_time_window() {
        let mut session = TrainingSession::start("s1".into(), "u1".into(), &scenario(3));
        assert_eq!(session.closes_at(), session.started_at + Duration::minutes(10));

        let ended = session.started_at + Duration::minutes(2);
        session.end(ended);
        assert_eq!(session.closes_at(), ended);
    }

    #[test]
    fn test_reset_clears_transcript() {
        let mut session = TrainingSession::start("s1".into(), "u1".into(), &scenario(3));
        session.begin_turn(Utc::now()).unwrap();
        session.apply_turn(turn("one")).unwrap();
        session.end(Utc::now());

        session.reset(Utc::now());
        assert!(!session.is_complete());
        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.question_count, 0);
        assert!(session.current_analysis.is_none());
    }
}
