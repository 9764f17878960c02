use std::sync::{Arc, Mutex};

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::domain::error::{AppError, Result};
use crate::infrastructure::config::AppConfig;
use crate::interfaces::http::{add_log, start_server, LogEntry};

pub async fn run() -> Result<()> {
    let config = AppConfig::load_with_dotenv()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_filter.clone()));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let logs: Arc<Mutex<Vec<LogEntry>>> = Arc::new(Mutex::new(Vec::new()));
    let state = crate::infrastructure::bootstrap::setup(&config, logs.clone()).await?;

    let server = start_server(state, logs.clone(), &config.server.host, config.server.port)
        .map_err(|err| {
            error!(error = %err, host = %config.server.host, port = config.server.port, "Failed to bind HTTP server");
            AppError::from(err)
        })?;

    info!(host = %config.server.host, port = config.server.port, "HTTP server started");
    add_log(
        &logs,
        "INFO",
        "System",
        &format!(
            "HTTP server started on {}:{}",
            config.server.host, config.server.port
        ),
    );

    server.await.map_err(AppError::from)
}
