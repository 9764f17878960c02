use crate::domain::chat::Message;
use crate::domain::error::{AppError, Result};
use crate::domain::scenario::{ScenarioDraft, ScenarioPatch};
use crate::domain::session::TrainingSession;
use crate::domain::team::{NewGroup, NewTeam, TeamRole};
use crate::domain::user::{RegisterUser, User, UserRole};
use crate::application::use_cases::users::require_admin;
use crate::interfaces::AppState;
use actix_cors::Cors;
use actix_web::{
    delete, dev::Server, get, http::StatusCode, post, put, web, App, HttpRequest, HttpResponse,
    HttpServer,
};
use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::{Arc, Mutex};

pub const USER_ID_HEADER: &str = "X-User-Id";
const MAX_LOG_ENTRIES: usize = 100;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogEntry {
    pub time: String,
    pub level: String,
    pub source: String,
    pub message: String,
}

pub struct HttpState {
    pub app_state: Arc<AppState>,
    pub logs: Arc<Mutex<Vec<LogEntry>>>,
}

#[derive(Deserialize)]
pub struct UpdateRoleRequest {
    pub role: UserRole,
}

#[derive(Deserialize)]
pub struct AddMemberRequest {
    pub user_id: String,
    #[serde(default = "default_member_role")]
    pub role: TeamRole,
}

fn default_member_role() -> TeamRole {
    TeamRole::Member
}

#[derive(Deserialize)]
pub struct MemberGroupsRequest {
    pub group_ids: Vec<String>,
}

#[derive(Deserialize)]
pub struct MemberRoleRequest {
    pub role: TeamRole,
}

#[derive(Deserialize)]
pub struct StartSessionRequest {
    #[serde(alias = "scenarioId")]
    pub scenario_id: String,
}

#[derive(Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

#[derive(Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(alias = "scenarioId")]
    pub scenario_id: String,
    pub action: String,
}

/// Session as sent to the client, with the timer and question budget
/// already worked out.
#[derive(Serialize)]
pub struct SessionView {
    #[serde(flatten)]
    pub session: TrainingSession,
    pub elapsed_seconds: i64,
    pub remaining_questions: i64,
}

impl From<TrainingSession> for SessionView {
    fn from(session: TrainingSession) -> Self {
        Self {
            elapsed_seconds: session.elapsed_seconds(Utc::now()),
            remaining_questions: (session.max_questions - session.question_count).max(0),
            session,
        }
    }
}

pub fn status_for(err: &AppError) -> StatusCode {
    match err {
        AppError::NotFound(_) => StatusCode::NOT_FOUND,
        AppError::ValidationError(_) | AppError::ParseError(_) => StatusCode::BAD_REQUEST,
        AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        AppError::Forbidden(_) => StatusCode::FORBIDDEN,
        AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        AppError::LLMError(_) => StatusCode::BAD_GATEWAY,
        AppError::Internal(_) | AppError::DatabaseError(_) | AppError::IoError(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

pub fn error_response(err: &AppError) -> HttpResponse {
    HttpResponse::build(status_for(err)).json(json!({ "error": err.to_string() }))
}

fn respond<T: Serialize>(data: &HttpState, context: &str, result: Result<T>) -> HttpResponse {
    match result {
        Ok(value) => HttpResponse::Ok().json(value),
        Err(e) => {
            let level = if status_for(&e).is_server_error() {
                "ERROR"
            } else {
                "WARN"
            };
            add_log(&data.logs, level, "HttpApi", &format!("{} failed: {}", context, e));
            error_response(&e)
        }
    }
}

/// Resolves the caller from the identity header set by the auth proxy.
async fn caller(data: &HttpState, req: &HttpRequest) -> Result<User> {
    let user_id = header_user_id(req)?;
    data.app_state.user_use_case.authenticate(&user_id).await
}

fn header_user_id(req: &HttpRequest) -> Result<String> {
    req.headers()
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::Unauthorized(format!("Missing {} header", USER_ID_HEADER)))
}

macro_rules! authenticated {
    ($data:expr, $req:expr) => {
        match caller(&$data, &$req).await {
            Ok(user) => user,
            Err(e) => return error_response(&e),
        }
    };
}

#[post("/users/register")]
async fn register(
    data: web::Data<HttpState>,
    req: HttpRequest,
    body: web::Json<RegisterUser>,
) -> HttpResponse {
    let user_id = match header_user_id(&req) {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };
    let result = data
        .app_state
        .user_use_case
        .register(&user_id, body.into_inner())
        .await;
    respond(&data, "Registration", result)
}

#[get("/me")]
async fn me(data: web::Data<HttpState>, req: HttpRequest) -> HttpResponse {
    let user = authenticated!(data, req);
    HttpResponse::Ok().json(user)
}

#[get("/admin/users")]
async fn list_users(data: web::Data<HttpState>, req: HttpRequest) -> HttpResponse {
    let user = authenticated!(data, req);
    let result = data.app_state.user_use_case.list(&user).await;
    respond(&data, "Listing users", result)
}

#[put("/admin/users/{id}/role")]
async fn update_user_role(
    data: web::Data<HttpState>,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<UpdateRoleRequest>,
) -> HttpResponse {
    let user = authenticated!(data, req);
    let result = data
        .app_state
        .user_use_case
        .set_role(&user, &path, body.role)
        .await;
    respond(&data, "Updating user role", result)
}

#[get("/scenarios")]
async fn list_scenarios(data: web::Data<HttpState>, req: HttpRequest) -> HttpResponse {
    let user = authenticated!(data, req);
    let result = data.app_state.scenario_use_case.list_visible(&user).await;
    respond(&data, "Listing scenarios", result)
}

#[get("/scenarios/{id}")]
async fn get_scenario(
    data: web::Data<HttpState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> HttpResponse {
    let user = authenticated!(data, req);
    let result = data.app_state.scenario_use_case.get_visible(&user, &path).await;
    respond(&data, "Fetching scenario", result)
}

#[get("/admin/scenarios")]
async fn admin_list_scenarios(data: web::Data<HttpState>, req: HttpRequest) -> HttpResponse {
    let user = authenticated!(data, req);
    let result = data.app_state.scenario_use_case.list_all(&user).await;
    respond(&data, "Listing all scenarios", result)
}

#[post("/admin/scenarios")]
async fn create_scenario(
    data: web::Data<HttpState>,
    req: HttpRequest,
    body: web::Json<ScenarioDraft>,
) -> HttpResponse {
    let user = authenticated!(data, req);
    let result = data
        .app_state
        .scenario_use_case
        .create(&user, body.into_inner())
        .await;
    if let Ok(scenario) = &result {
        add_log(
            &data.logs,
            "INFO",
            "HttpApi",
            &format!("Scenario created: {} ({})", scenario.title, scenario.id),
        );
    }
    respond(&data, "Creating scenario", result)
}

#[put("/admin/scenarios/{id}")]
async fn update_scenario(
    data: web::Data<HttpState>,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<ScenarioPatch>,
) -> HttpResponse {
    let user = authenticated!(data, req);
    let result = data
        .app_state
        .scenario_use_case
        .update(&user, &path, body.into_inner())
        .await;
    respond(&data, "Updating scenario", result)
}

#[delete("/admin/scenarios/{id}")]
async fn delete_scenario(
    data: web::Data<HttpState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> HttpResponse {
    let user = authenticated!(data, req);
    match data.app_state.scenario_use_case.delete(&user, &path).await {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e) => respond::<()>(&data, "Deleting scenario", Err(e)),
    }
}

#[post("/admin/scenarios/{id}/toggle")]
async fn toggle_scenario(
    data: web::Data<HttpState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> HttpResponse {
    let user = authenticated!(data, req);
    let result = data.app_state.scenario_use_case.toggle(&user, &path).await;
    respond(&data, "Toggling scenario", result)
}

#[post("/teams")]
async fn create_team(
    data: web::Data<HttpState>,
    req: HttpRequest,
    body: web::Json<NewTeam>,
) -> HttpResponse {
    let user = authenticated!(data, req);
    let result = data
        .app_state
        .team_use_case
        .create_team(&user, body.into_inner())
        .await;
    respond(&data, "Creating team", result)
}

#[get("/teams")]
async fn my_teams(data: web::Data<HttpState>, req: HttpRequest) -> HttpResponse {
    let user = authenticated!(data, req);
    let result = data.app_state.team_use_case.my_teams(&user).await;
    respond(&data, "Listing teams", result)
}

#[post("/teams/{id}/groups")]
async fn create_group(
    data: web::Data<HttpState>,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<NewGroup>,
) -> HttpResponse {
    let user = authenticated!(data, req);
    let result = data
        .app_state
        .team_use_case
        .create_group(&user, &path, body.into_inner())
        .await;
    respond(&data, "Creating group", result)
}

#[get("/teams/{id}/groups")]
async fn team_groups(
    data: web::Data<HttpState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> HttpResponse {
    let user = authenticated!(data, req);
    let result = data.app_state.team_use_case.groups(&user, &path).await;
    respond(&data, "Listing groups", result)
}

#[post("/teams/{id}/members")]
async fn add_member(
    data: web::Data<HttpState>,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<AddMemberRequest>,
) -> HttpResponse {
    let user = authenticated!(data, req);
    let result = data
        .app_state
        .team_use_case
        .add_member(&user, &path, &body.user_id, body.role)
        .await;
    respond(&data, "Adding team member", result)
}

#[get("/teams/{id}/members")]
async fn team_members(
    data: web::Data<HttpState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> HttpResponse {
    let user = authenticated!(data, req);
    let result = data.app_state.team_use_case.members(&user, &path).await;
    respond(&data, "Listing team members", result)
}

#[put("/teams/{id}/members/{user_id}/groups")]
async fn update_member_groups(
    data: web::Data<HttpState>,
    req: HttpRequest,
    path: web::Path<(String, String)>,
    body: web::Json<MemberGroupsRequest>,
) -> HttpResponse {
    let user = authenticated!(data, req);
    let (team_id, member_id) = path.into_inner();
    let result = data
        .app_state
        .team_use_case
        .set_member_groups(&user, &team_id, &member_id, body.into_inner().group_ids)
        .await;
    respond(&data, "Updating member groups", result.map(|()| json!({ "ok": true })))
}

#[put("/teams/{id}/members/{user_id}/role")]
async fn update_member_role(
    data: web::Data<HttpState>,
    req: HttpRequest,
    path: web::Path<(String, String)>,
    body: web::Json<MemberRoleRequest>,
) -> HttpResponse {
    let user = authenticated!(data, req);
    let (team_id, member_id) = path.into_inner();
    let result = data
        .app_state
        .team_use_case
        .set_member_role(&user, &team_id, &member_id, body.role)
        .await;
    respond(&data, "Updating member role", result.map(|()| json!({ "ok": true })))
}

#[post("/sessions")]
async fn start_session(
    data: web::Data<HttpState>,
    req: HttpRequest,
    body: web::Json<StartSessionRequest>,
) -> HttpResponse {
    let user = authenticated!(data, req);
    let result = data
        .app_state
        .session_use_case
        .start(&user, &body.scenario_id)
        .await;
    if let Ok(session) = &result {
        add_log(
            &data.logs,
            "INFO",
            "Training",
            &format!("Session {} started on scenario {}", session.id, session.scenario_id),
        );
    }
    respond(&data, "Starting session", result.map(SessionView::from))
}

#[get("/sessions/{id}")]
async fn get_session(
    data: web::Data<HttpState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> HttpResponse {
    let user = authenticated!(data, req);
    let result = data.app_state.session_use_case.get(&user, &path).await;
    respond(&data, "Fetching session", result.map(SessionView::from))
}

#[post("/sessions/{id}/messages")]
async fn send_message(
    data: web::Data<HttpState>,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<SendMessageRequest>,
) -> HttpResponse {
    let user = authenticated!(data, req);
    let result = data
        .app_state
        .session_use_case
        .send(&user, &path, body.into_inner().content)
        .await;
    if let Ok(session) = &result {
        let score = session
            .current_analysis
            .as_ref()
            .map(|a| a.score.to_string())
            .unwrap_or_default();
        add_log(
            &data.logs,
            "INFO",
            "Training",
            &format!(
                "Session {} turn {} scored {}",
                session.id, session.question_count, score
            ),
        );
    }
    respond(&data, "Sending message", result.map(SessionView::from))
}

#[post("/sessions/{id}/end")]
async fn end_session(
    data: web::Data<HttpState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> HttpResponse {
    let user = authenticated!(data, req);
    let result = data.app_state.session_use_case.end(&user, &path).await;
    respond(&data, "Ending session", result.map(SessionView::from))
}

#[post("/sessions/{id}/reset")]
async fn reset_session(
    data: web::Data<HttpState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> HttpResponse {
    let user = authenticated!(data, req);
    let result = data.app_state.session_use_case.reset(&user, &path).await;
    respond(&data, "Resetting session", result.map(SessionView::from))
}

/// Stateless exchange over a client-held transcript.
#[post("/chat")]
async fn chat(
    data: web::Data<HttpState>,
    req: HttpRequest,
    body: web::Json<ChatRequest>,
) -> HttpResponse {
    let user = authenticated!(data, req);
    let sessions = &data.app_state.session_use_case;
    match body.action.as_str() {
        "chat" => {
            let result = sessions
                .chat_reply(&user, &body.scenario_id, &body.messages)
                .await;
            respond(&data, "Chat", result.map(|response| json!({ "response": response })))
        }
        "analyze" => {
            let result = sessions
                .analyze_last(&user, &body.scenario_id, &body.messages)
                .await;
            respond(
                &data,
                "Analysis",
                result.map(|analysis| json!({ "analysis": analysis, "success": true })),
            )
        }
        _ => error_response(&AppError::ValidationError("Invalid action".to_string())),
    }
}

#[get("/voice/signed-url")]
async fn voice_signed_url(data: web::Data<HttpState>, req: HttpRequest) -> HttpResponse {
    let _user = authenticated!(data, req);
    let result = data.app_state.voice_client.signed_url().await;
    respond(&data, "Fetching voice signed URL", result)
}

#[get("/admin/models")]
async fn list_models(data: web::Data<HttpState>, req: HttpRequest) -> HttpResponse {
    let user = authenticated!(data, req);
    if let Err(e) = require_admin(&user) {
        return error_response(&e);
    }
    add_log(
        &data.logs,
        "INFO",
        "HttpApi",
        &format!(
            "Fetching models (provider={:?} base_url={})",
            data.app_state.llm_config.provider, data.app_state.llm_config.base_url
        ),
    );
    let result = data
        .app_state
        .llm_client
        .list_models(&data.app_state.llm_config)
        .await;
    respond(&data, "Listing models", result)
}

#[get("/logs")]
async fn get_logs(data: web::Data<HttpState>, req: HttpRequest) -> HttpResponse {
    let user = authenticated!(data, req);
    if let Err(e) = require_admin(&user) {
        return error_response(&e);
    }
    let logs = match data.logs.lock() {
        Ok(logs) => logs.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    };
    HttpResponse::Ok().json(logs)
}

pub fn add_log_entry(
    logs: &Mutex<Vec<LogEntry>>,
    level: &str,
    source: &str,
    message: &str,
) -> LogEntry {
    let entry = LogEntry {
        time: Local::now().format("%H:%M:%S").to_string(),
        level: level.to_string(),
        source: source.to_string(),
        message: message.to_string(),
    };
    let mut logs = match logs.lock() {
        Ok(logs) => logs,
        Err(poisoned) => poisoned.into_inner(),
    };
    logs.push(entry.clone());
    if logs.len() > MAX_LOG_ENTRIES {
        logs.remove(0);
    }
    entry
}

pub fn add_log(logs: &Mutex<Vec<LogEntry>>, level: &str, source: &str, message: &str) {
    add_log_entry(logs, level, source, message);
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(register)
            .service(me)
            .service(list_users)
            .service(update_user_role)
            .service(list_scenarios)
            .service(get_scenario)
            .service(admin_list_scenarios)
            .service(create_scenario)
            .service(update_scenario)
            .service(delete_scenario)
            .service(toggle_scenario)
            .service(create_team)
            .service(my_teams)
            .service(create_group)
            .service(team_groups)
            .service(add_member)
            .service(team_members)
            .service(update_member_groups)
            .service(update_member_role)
            .service(start_session)
            .service(get_session)
            .service(send_message)
            .service(end_session)
            .service(reset_session)
            .service(chat)
            .service(voice_signed_url)
            .service(list_models)
            .service(get_logs),
    );
}

pub fn start_server(
    app_state: Arc<AppState>,
    logs: Arc<Mutex<Vec<LogEntry>>>,
    host: &str,
    port: u16,
) -> std::io::Result<Server> {
    let state = web::Data::new(HttpState { app_state, logs });

    let server = HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((host, port))?
    .run();

    Ok(server)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::use_cases::test_support::{Reply, ScriptedClient};
    use crate::infrastructure::bootstrap::build_state;
    use crate::infrastructure::config::AppConfig;
    use crate::infrastructure::db::connection::memory_pool;
    use actix_web::test as actix_test;
    use serde_json::Value;

    const SCORE_JSON: &str =
        r#"{"feedback":["Good opening.","Lacks specifics.","Add a number."],"score":62}"#;

    async fn http_state() -> web::Data<HttpState> {
        let logs = Arc::new(Mutex::new(Vec::new()));
        let client = Arc::new(ScriptedClient::new(
            Reply::Text("What does it cost?".into()),
            Reply::Text(SCORE_JSON.into()),
        ));
        let app_state = build_state(&AppConfig::default(), memory_pool().await, client, logs.clone());
        web::Data::new(HttpState { app_state, logs })
    }

    fn register_req(user_id: &str, email: &str) -> actix_test::TestRequest {
        actix_test::TestRequest::post()
            .uri("/api/users/register")
            .insert_header((USER_ID_HEADER, user_id))
            .set_json(json!({ "email": email, "name": "Sam" }))
    }

    #[actix_web::test]
    async fn test_missing_identity_is_unauthorized() {
        let app = actix_test::init_service(App::new().app_data(http_state().await).configure(configure)).await;

        let resp = actix_test::call_service(&app, actix_test::TestRequest::get().uri("/api/me").to_request()).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = actix_test::call_service(
            &app,
            actix_test::TestRequest::get()
                .uri("/api/me")
                .insert_header((USER_ID_HEADER, "stranger"))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_admin_routes_are_forbidden_to_trainees() {
        let app = actix_test::init_service(App::new().app_data(http_state().await).configure(configure)).await;
        actix_test::call_service(&app, register_req("admin", "admin@example.com").to_request()).await;
        actix_test::call_service(&app, register_req("rep", "rep@example.com").to_request()).await;

        for uri in ["/api/admin/users", "/api/admin/scenarios", "/api/logs"] {
            let resp = actix_test::call_service(
                &app,
                actix_test::TestRequest::get()
                    .uri(uri)
                    .insert_header((USER_ID_HEADER, "rep"))
                    .to_request(),
            )
            .await;
            assert_eq!(resp.status(), StatusCode::FORBIDDEN, "{}", uri);
        }
    }

    #[actix_web::test]
    async fn test_training_flow_over_http() {
        let app = actix_test::init_service(App::new().app_data(http_state().await).configure(configure)).await;
        actix_test::call_service(&app, register_req("admin", "admin@example.com").to_request()).await;
        actix_test::call_service(&app, register_req("rep", "rep@example.com").to_request()).await;

        let created: Value = actix_test::call_and_read_body_json(
            &app,
            actix_test::TestRequest::post()
                .uri("/api/admin/scenarios")
                .insert_header((USER_ID_HEADER, "admin"))
                .set_json(json!({
                    "title": "Fleet renewal",
                    "customer_background": "Logistics company",
                    "success_metrics": ["Discovery", {"name": "Closing", "weight": 3}],
                    "is_active": true
                }))
                .to_request(),
        )
        .await;
        let scenario_id = created["id"].as_str().unwrap().to_string();
        assert_eq!(created["success_metrics"][1]["weight"], 3);

        let session: Value = actix_test::call_and_read_body_json(
            &app,
            actix_test::TestRequest::post()
                .uri("/api/sessions")
                .insert_header((USER_ID_HEADER, "rep"))
                .set_json(json!({ "scenario_id": scenario_id }))
                .to_request(),
        )
        .await;
        let session_id = session["id"].as_str().unwrap().to_string();
        assert_eq!(session["messages"].as_array().unwrap().len(), 1);
        assert_eq!(session["remaining_questions"], 10);

        let after: Value = actix_test::call_and_read_body_json(
            &app,
            actix_test::TestRequest::post()
                .uri(&format!("/api/sessions/{}/messages", session_id))
                .insert_header((USER_ID_HEADER, "rep"))
                .set_json(json!({ "content": "We cut fuel spend by 8%" }))
                .to_request(),
        )
        .await;
        assert_eq!(after["messages"].as_array().unwrap().len(), 3);
        assert_eq!(after["messages"][2]["content"], "What does it cost?");
        assert_eq!(after["current_analysis"]["score"], json!(62));
        assert_eq!(after["question_count"], 1);

        let resp = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri(&format!("/api/sessions/{}/messages", session_id))
                .insert_header((USER_ID_HEADER, "rep"))
                .set_json(json!({ "content": "   " }))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_stateless_chat_actions() {
        let app = actix_test::init_service(App::new().app_data(http_state().await).configure(configure)).await;
        actix_test::call_service(&app, register_req("admin", "admin@example.com").to_request()).await;
        let created: Value = actix_test::call_and_read_body_json(
            &app,
            actix_test::TestRequest::post()
                .uri("/api/admin/scenarios")
                .insert_header((USER_ID_HEADER, "admin"))
                .set_json(json!({ "title": "Cold call", "is_active": true }))
                .to_request(),
        )
        .await;
        let scenario_id = created["id"].as_str().unwrap();

        let resp = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri("/api/chat")
                .insert_header((USER_ID_HEADER, "admin"))
                .set_json(json!({
                    "scenarioId": scenario_id,
                    "action": "analyze",
                    "messages": [{"role": "assistant", "content": "Hello."}]
                }))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let analyzed: Value = actix_test::call_and_read_body_json(
            &app,
            actix_test::TestRequest::post()
                .uri("/api/chat")
                .insert_header((USER_ID_HEADER, "admin"))
                .set_json(json!({
                    "scenarioId": scenario_id,
                    "action": "analyze",
                    "messages": [{"role": "user", "content": "Our pitch"}]
                }))
                .to_request(),
        )
        .await;
        assert_eq!(analyzed["success"], true);
        assert_eq!(analyzed["analysis"]["feedback"].as_array().unwrap().len(), 3);

        let resp = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri("/api/chat")
                .insert_header((USER_ID_HEADER, "admin"))
                .set_json(json!({ "scenarioId": scenario_id, "action": "dance" }))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_unconfigured_voice_is_server_error() {
        let app = actix_test::init_service(App::new().app_data(http_state().await).configure(configure)).await;
        actix_test::call_service(&app, register_req("rep", "rep@example.com").to_request()).await;

        let resp = actix_test::call_service(
            &app,
            actix_test::TestRequest::get()
                .uri("/api/voice/signed-url")
                .insert_header((USER_ID_HEADER, "rep"))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_log_ring_is_bounded() {
        let logs = Mutex::new(Vec::new());
        for i in 0..(MAX_LOG_ENTRIES + 5) {
            add_log(&logs, "INFO", "Test", &format!("entry {}", i));
        }
        let logs = logs.lock().unwrap();
        assert_eq!(logs.len(), MAX_LOG_ENTRIES);
        assert_eq!(logs[0].message, "entry 5");
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(&AppError::Timeout("t".into())), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(status_for(&AppError::LLMError("x".into())), StatusCode::BAD_GATEWAY);
        assert_eq!(status_for(&AppError::ParseError("x".into())), StatusCode::BAD_REQUEST);
    }
}
