use crate::application::use_cases::scenarios::ScenarioUseCase;
use crate::application::use_cases::sessions::SessionUseCase;
use crate::application::use_cases::teams::TeamUseCase;
use crate::application::use_cases::users::UserUseCase;
use crate::domain::llm_config::LLMConfig;
use crate::infrastructure::llm_clients::LLMClient;
use crate::infrastructure::voice::VoiceClient;
use crate::interfaces::http::LogEntry;
use std::sync::{Arc, Mutex};

pub struct AppState {
    pub user_use_case: UserUseCase,
    pub scenario_use_case: Arc<ScenarioUseCase>,
    pub team_use_case: TeamUseCase,
    pub session_use_case: SessionUseCase,
    pub voice_client: VoiceClient,
    pub llm_client: Arc<dyn LLMClient + Send + Sync>,
    /// Provider settings shared by every persona and scoring call.
    pub llm_config: LLMConfig,
    pub logs: Arc<Mutex<Vec<LogEntry>>>,
}
