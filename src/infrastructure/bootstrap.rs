use std::sync::{Arc, Mutex};

use sqlx::sqlite::SqlitePool;
use tracing::{error, info};

use crate::application::use_cases::exchange::ExchangeUseCase;
use crate::application::use_cases::scenarios::ScenarioUseCase;
use crate::application::use_cases::sessions::SessionUseCase;
use crate::application::use_cases::teams::TeamUseCase;
use crate::application::use_cases::users::UserUseCase;
use crate::domain::error::Result;
use crate::domain::llm_config::LLMProvider;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::db::{init_db, ScenarioRepository, TeamRepository, UserRepository};
use crate::infrastructure::llm_clients::{LLMClient, RouterClient};
use crate::infrastructure::voice::VoiceClient;
use crate::interfaces::http::{add_log, LogEntry};
use crate::interfaces::AppState;

/// Opens the database and wires every use case behind the HTTP layer.
pub async fn setup(config: &AppConfig, logs: Arc<Mutex<Vec<LogEntry>>>) -> Result<Arc<AppState>> {
    let pool = init_db(&config.database_url, config.database_max_connections)
        .await
        .map_err(|err| {
            error!(error = %err, database_url = %config.database_url, "Failed to initialize database");
            err
        })?;
    info!(database_url = %config.database_url, "Database ready");

    let llm_client: Arc<dyn LLMClient + Send + Sync> =
        Arc::new(RouterClient::new(config.request_timeout()));
    let state = build_state(config, pool, llm_client, logs.clone());

    if state.llm_config.api_key.is_none() && state.llm_config.provider != LLMProvider::Local {
        add_log(
            &logs,
            "WARN",
            "System",
            "No LLM API key configured; persona and scoring calls will fail until llm.api_key is set",
        );
    }
    add_log(
        &logs,
        "INFO",
        "System",
        &format!(
            "Backend initialized (provider={:?} model={})",
            state.llm_config.provider, state.llm_config.model
        ),
    );

    Ok(state)
}

pub fn build_state(
    config: &AppConfig,
    pool: SqlitePool,
    llm_client: Arc<dyn LLMClient + Send + Sync>,
    logs: Arc<Mutex<Vec<LogEntry>>>,
) -> Arc<AppState> {
    let user_repo = Arc::new(UserRepository::new(pool.clone()));
    let team_repo = Arc::new(TeamRepository::new(pool.clone()));
    let scenario_repo = Arc::new(ScenarioRepository::new(pool));

    let llm_config = config.llm_config();
    let exchange_use_case = Arc::new(ExchangeUseCase::new(
        llm_client.clone(),
        &llm_config,
        &config.exchange_settings(),
    ));
    let scenario_use_case = Arc::new(ScenarioUseCase::new(
        scenario_repo.clone(),
        team_repo.clone(),
    ));
    let session_use_case = SessionUseCase::new(
        scenario_use_case.clone(),
        scenario_repo,
        exchange_use_case,
    );

    Arc::new(AppState {
        user_use_case: UserUseCase::new(user_repo.clone()),
        scenario_use_case,
        team_use_case: TeamUseCase::new(team_repo, user_repo),
        session_use_case,
        voice_client: VoiceClient::new(config.voice.clone(), config.request_timeout()),
        llm_client,
        llm_config,
        logs,
    })
}
