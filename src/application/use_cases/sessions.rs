use crate::application::use_cases::exchange::ExchangeUseCase;
use crate::application::use_cases::scenario_context::ScenarioContext;
use crate::application::use_cases::scenarios::ScenarioUseCase;
use crate::domain::chat::{Analysis, Message, MessageRole};
use crate::domain::error::{AppError, Result};
use crate::domain::session::TrainingSession;
use crate::domain::user::User;
use crate::infrastructure::db::ScenarioRepository;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Sessions stay readable this long after they close.
const SESSION_RETENTION_MINUTES: i64 = 30;
/// Sessions kept per trainee; starting another drops the oldest.
const MAX_SESSIONS_PER_USER: usize = 5;

/// Live training sessions, keyed by id. The registry lock is never held
/// across an LLM call; a turn marks its session in flight instead.
pub struct SessionUseCase {
    sessions: Mutex<HashMap<String, TrainingSession>>,
    scenario_use_case: Arc<ScenarioUseCase>,
    scenarios: Arc<ScenarioRepository>,
    exchange: Arc<ExchangeUseCase>,
}

impl SessionUseCase {
    pub fn new(
        scenario_use_case: Arc<ScenarioUseCase>,
        scenarios: Arc<ScenarioRepository>,
        exchange: Arc<ExchangeUseCase>,
    ) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            scenario_use_case,
            scenarios,
            exchange,
        }
    }

    pub async fn start(&self, caller: &User, scenario_id: &str) -> Result<TrainingSession> {
        let scenario = self.scenario_use_case.get_visible(caller, scenario_id).await?;
        let session = TrainingSession::start(Uuid::new_v4().to_string(), caller.id.clone(), &scenario);

        let mut sessions = self.sessions.lock().await;
        let evicted = evict_stale(&mut sessions, &caller.id, Utc::now());
        if evicted > 0 {
            debug!(evicted, "Dropped stale training sessions");
        }
        sessions.insert(session.id.clone(), session.clone());
        drop(sessions);
        info!(session_id = %session.id, scenario_id, user_id = %caller.id, "Training session started");
        Ok(session)
    }

    pub async fn get(&self, caller: &User, session_id: &str) -> Result<TrainingSession> {
        let sessions = self.sessions.lock().await;
        owned(&sessions, caller, session_id).cloned()
    }

    /// Runs one trainee turn. On success the session holds both new messages
    /// and the fresh analysis; on failure it is left exactly as before.
    pub async fn send(&self, caller: &User, session_id: &str, content: String) -> Result<TrainingSession> {
        if content.trim().is_empty() {
            return Err(AppError::ValidationError("Message is empty.".to_string()));
        }

        let (history, scenario_id) = {
            let mut sessions = self.sessions.lock().await;
            let session = owned_mut(&mut sessions, caller, session_id)?;
            let history = session.begin_turn(Utc::now())?;
            (history, session.scenario_id.clone())
        };

        let outcome = match self.scenarios.get(&scenario_id).await {
            Ok(scenario) => self.exchange.execute(&scenario, &history, content).await,
            Err(err) => Err(err),
        };

        let mut sessions = self.sessions.lock().await;
        let session = sessions.get_mut(session_id).ok_or_else(|| {
            AppError::NotFound(format!("Training session not found: {}", session_id))
        })?;
        match outcome {
            Ok(turn) => match session.apply_turn(turn) {
                Ok(()) => Ok(session.clone()),
                Err(err) => {
                    warn!(session_id, "Session ended during the turn; reply discarded");
                    Err(err)
                }
            },
            Err(err) => {
                session.abort_turn();
                warn!(session_id, error = %err, "Turn failed; session unchanged");
                Err(err)
            }
        }
    }

    pub async fn end(&self, caller: &User, session_id: &str) -> Result<TrainingSession> {
        let mut sessions = self.sessions.lock().await;
        let session = owned_mut(&mut sessions, caller, session_id)?;
        session.end(Utc::now());
        info!(
            session_id,
            questions = session.question_count,
            "Training session ended"
        );
        Ok(session.clone())
    }

    pub async fn reset(&self, caller: &User, session_id: &str) -> Result<TrainingSession> {
        let mut sessions = self.sessions.lock().await;
        let session = owned_mut(&mut sessions, caller, session_id)?;
        if session.is_turn_in_flight() {
            return Err(AppError::ValidationError(
                "A message is still being processed; try again shortly.".to_string(),
            ));
        }
        session.reset(Utc::now());
        Ok(session.clone())
    }

    /// Stateless persona reply over a caller-supplied transcript.
    pub async fn chat_reply(&self, caller: &User, scenario_id: &str, messages: &[Message]) -> Result<String> {
        let scenario = self.scenario_use_case.get_visible(caller, scenario_id).await?;
        let context = ScenarioContext::build(&scenario);
        self.exchange.reply(messages, &context).await
    }

    /// Scores the last message of a caller-supplied transcript, which must
    /// come from the trainee.
    pub async fn analyze_last(&self, caller: &User, scenario_id: &str, messages: &[Message]) -> Result<Analysis> {
        let last = match messages.last() {
            Some(message) if message.role == MessageRole::User => message,
            _ => {
                return Err(AppError::ValidationError(
                    "No user message to analyze".to_string(),
                ))
            }
        };
        let scenario = self.scenario_use_case.get_visible(caller, scenario_id).await?;
        Ok(self.exchange.analyze(&scenario, &last.content).await)
    }
}

/// Drops sessions closed for longer than the retention window, then the
/// caller's oldest sessions so a new one fits under the per-user cap.
/// Sessions with a turn in flight are never dropped.
fn evict_stale(
    sessions: &mut HashMap<String, TrainingSession>,
    user_id: &str,
    now: DateTime<Utc>,
) -> usize {
    let before = sessions.len();
    let retention = Duration::minutes(SESSION_RETENTION_MINUTES);
    sessions.retain(|_, s| s.is_turn_in_flight() || s.closes_at() + retention > now);

    let mut own: Vec<(DateTime<Utc>, String)> = sessions
        .values()
        .filter(|s| s.user_id == user_id && !s.is_turn_in_flight())
        .map(|s| (s.started_at, s.id.clone()))
        .collect();
    if own.len() >= MAX_SESSIONS_PER_USER {
        own.sort();
        let excess = own.len() + 1 - MAX_SESSIONS_PER_USER;
        for (_, id) in own.into_iter().take(excess) {
            sessions.remove(&id);
        }
    }
    before - sessions.len()
}

fn owned<'a>(
    sessions: &'a HashMap<String, TrainingSession>,
    caller: &User,
    session_id: &str,
) -> Result<&'a TrainingSession> {
    sessions
        .get(session_id)
        .filter(|s| s.user_id == caller.id)
        .ok_or_else(|| AppError::NotFound(format!("Training session not found: {}", session_id)))
}

fn owned_mut<'a>(
    sessions: &'a mut HashMap<String, TrainingSession>,
    caller: &User,
    session_id: &str,
) -> Result<&'a mut TrainingSession> {
    sessions
        .get_mut(session_id)
        .filter(|s| s.user_id == caller.id)
        .ok_or_else(|| AppError::NotFound(format!("Training session not found: {}", session_id)))
}
