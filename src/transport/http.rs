//! HTTP chat API
//!
//! Each chat session is a resource under `/sessions`. Creating one runs chat
//! start; messages and actions are posted to it; deleting it runs chat end.

use crate::session::{
    ActionReply, BackendTools, ChatAction, ChatMessage, SessionError, SessionHandle,
    SessionRegistry, SessionServices, SessionStatus,
};
use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

/// Delay between answering an exit action and terminating the process
const EXIT_FLUSH_DELAY: Duration = Duration::from_millis(100);

/// Sessions not used for this long are ended and dropped
pub const SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

const IDLE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Shared application state
pub struct AppState {
    registry: SessionRegistry,
    exit_on_terminate: bool,
}

impl AppState {
    pub fn new(services: SessionServices) -> Self {
        Self {
            registry: SessionRegistry::new(services),
            exit_on_terminate: true,
        }
    }

    /// Whether an exit action terminates the process (on by default)
    pub fn exit_on_terminate(mut self, exit: bool) -> Self {
        self.exit_on_terminate = exit;
        self
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    git_hash: String,
    sessions: usize,
}

#[derive(Debug, Serialize)]
struct SessionResponse {
    id: Uuid,
    state: SessionStatus,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct SessionStatusResponse {
    id: Uuid,
    state: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    agent_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bucket: Option<String>,
    backends: Vec<BackendTools>,
    tools: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct MessageRequest {
    content: String,
}

#[derive(Debug, Serialize)]
struct MessagesResponse {
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Session lookup and action parsing failures
struct ApiError(SessionError);

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            SessionError::NotFound(_) => StatusCode::NOT_FOUND,
            SessionError::UnknownAction(_) => StatusCode::BAD_REQUEST,
        };
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

/// Build the API router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/sessions", post(create_session))
        .route("/sessions/:id", get(get_session).delete(end_session))
        .route("/sessions/:id/messages", post(send_message))
        .route("/sessions/:id/actions/:name", post(run_action))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the HTTP server
pub async fn run_http_server(host: &str, port: u16, services: SessionServices) -> Result<()> {
    tracing::info!("Prompt directory: {}", services.prompts.dir().display());
    let state = Arc::new(AppState::new(services));
    spawn_idle_sweep(state.clone(), SESSION_IDLE_TIMEOUT);
    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!("HTTP server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// End sessions whose client went away without deleting them
pub fn spawn_idle_sweep(state: Arc<AppState>, max_idle: Duration) -> JoinHandle<()> {
    let period = IDLE_SWEEP_INTERVAL.min(max_idle).max(Duration::from_millis(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let ended = state.registry.end_idle(max_idle).await;
            if ended > 0 {
                tracing::info!("Idle sweep ended {} sessions", ended);
            }
        }
    })
}

fn lookup(state: &AppState, id: &str) -> Result<SessionHandle, ApiError> {
    let uuid = Uuid::parse_str(id).map_err(|_| SessionError::NotFound(id.to_string()))?;
    Ok(state.registry.get(uuid)?)
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("DBAGENT_GIT_HASH").to_string(),
        sessions: state.registry.len(),
    })
}

async fn create_session(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (id, handle) = state.registry.create();
    let mut session = handle.lock().await;
    let message = session.start().await;

    (
        StatusCode::CREATED,
        Json(SessionResponse {
            id,
            state: session.status(),
            messages: vec![message],
        }),
    )
}

async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionStatusResponse>, ApiError> {
    let handle = lookup(&state, &id)?;
    let session = handle.lock().await;

    Ok(Json(SessionStatusResponse {
        id: session.id(),
        state: session.status(),
        error: session.last_error().map(String::from),
        agent_id: session.agent_id(),
        bucket: session.config().map(|c| c.bucket_name.clone()),
        backends: session.backend_tools(),
        tools: session.tool_names(),
    }))
}

async fn send_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<MessageRequest>,
) -> Result<Json<MessagesResponse>, ApiError> {
    let handle = lookup(&state, &id)?;
    let message = handle.lock().await.message(&req.content).await;

    Ok(Json(MessagesResponse {
        messages: vec![message],
    }))
}

async fn run_action(
    State(state): State<Arc<AppState>>,
    Path((id, name)): Path<(String, String)>,
) -> Result<Json<ActionReply>, ApiError> {
    let handle = lookup(&state, &id)?;
    let action: ChatAction = name.parse()?;
    tracing::info!("Action {} on session {}", action, id);

    let reply = handle.lock().await.action(action).await;

    if reply.terminate && state.exit_on_terminate {
        // Let the response flush, then stop without tearing anything down
        tokio::spawn(async {
            tokio::time::sleep(EXIT_FLUSH_DELAY).await;
            tracing::info!("Exiting on user request");
            std::process::exit(0);
        });
    }

    Ok(Json(reply))
}

async fn end_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let uuid = Uuid::parse_str(&id).map_err(|_| SessionError::NotFound(id.clone()))?;
    let handle = state.registry.remove(uuid)?;
    handle.lock().await.end().await;
    Ok(StatusCode::NO_CONTENT)
}
