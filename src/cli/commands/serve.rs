//! HTTP API server for integration with other systems.
//!
//! Provides REST endpoints for agent sessions and policy search. Each
//! session owns its own agent and history; sessions live in memory only and
//! are dropped when idle, when the store is full, or on `DELETE /session/{id}`.

use crate::agent::{Agent, ToolCallRecord};
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::{ServerSettings, Settings};
use crate::error::KallError;
use crate::orchestrator::Orchestrator;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info};
use uuid::Uuid;

/// Shared application state.
struct AppState {
    orchestrator: Orchestrator,
    sessions: Mutex<SessionStore<Arc<Mutex<Agent>>>>,
}

struct Session<T> {
    value: T,
    last_used: Instant,
}

/// Sessions keyed by id, bounded in count and idle time.
struct SessionStore<T> {
    sessions: HashMap<Uuid, Session<T>>,
    max_sessions: usize,
    idle_timeout: Duration,
}

impl<T: Clone> SessionStore<T> {
    fn new(settings: &ServerSettings) -> Self {
        Self {
            sessions: HashMap::new(),
            max_sessions: settings.max_sessions.max(1),
            idle_timeout: Duration::from_secs(settings.session_idle_secs),
        }
    }

    /// Look up a live session and mark it used.
    fn get(&mut self, id: &Uuid, now: Instant) -> Option<T> {
        self.prune(now);
        let session = self.sessions.get_mut(id)?;
        session.last_used = now;
        Some(session.value.clone())
    }

    /// Store a new session, making room first. Returns its id.
    fn insert(&mut self, value: T, now: Instant) -> Uuid {
        self.prune(now);
        while self.sessions.len() >= self.max_sessions {
            let oldest = self
                .sessions
                .iter()
                .min_by_key(|(_, s)| s.last_used)
                .map(|(id, _)| *id);
            match oldest {
                Some(id) => {
                    self.sessions.remove(&id);
                    debug!("Evicted session {}", id);
                }
                None => break,
            }
        }

        let id = Uuid::new_v4();
        self.sessions.insert(
            id,
            Session {
                value,
                last_used: now,
            },
        );
        id
    }

    fn remove(&mut self, id: &Uuid) -> bool {
        self.sessions.remove(id).is_some()
    }

    /// Drop sessions idle for longer than the timeout.
    fn prune(&mut self, now: Instant) {
        let timeout = self.idle_timeout;
        let before = self.sessions.len();
        self.sessions
            .retain(|_, s| now.saturating_duration_since(s.last_used) <= timeout);
        let dropped = before - self.sessions.len();
        if dropped > 0 {
            debug!("Dropped {} idle session(s)", dropped);
        }
    }

    fn len(&self) -> usize {
        self.sessions.len()
    }
}

/// Run the HTTP API server.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    if let Err(e) = preflight::check(Operation::Chat, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings)?;

    let spinner = Output::spinner("Indexing policy documents...");
    let ready = orchestrator.registry().await;
    spinner.finish_and_clear();
    ready?;

    let sessions = SessionStore::new(&orchestrator.settings().server);
    let state = Arc::new(AppState {
        orchestrator,
        sessions: Mutex::new(sessions),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health))
        .route("/tools", get(list_tools))
        .route("/chat", post(chat))
        .route("/reset", post(reset))
        .route("/session/{id}", delete(close_session))
        .route("/search", post(search))
        .layer(cors)
        .with_state(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Kall API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Tools", "GET  /tools");
    Output::kv("Chat", "POST /chat");
    Output::kv("Reset", "POST /reset");
    Output::kv("Close", "DELETE /session/{id}");
    Output::kv("Search", "POST /search");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct ChatRequest {
    /// Existing session; a new one is created when absent or unknown.
    #[serde(default)]
    session: Option<Uuid>,
    message: String,
}

#[derive(Serialize)]
struct ChatResponse {
    session: Uuid,
    answer: String,
    tool_calls: Vec<ToolCallRecord>,
    rounds: usize,
}

#[derive(Deserialize)]
struct ResetRequest {
    session: Uuid,
}

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    3
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<SearchResult>,
}

#[derive(Serialize)]
struct SearchResult {
    title: Option<String>,
    content: String,
    score: f32,
}

#[derive(Serialize)]
struct ToolInfo {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// HTTP status for a failed request.
fn status_for(error: &KallError) -> StatusCode {
    match error {
        KallError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        KallError::MaxRoundsExceeded(_) => StatusCode::UNPROCESSABLE_ENTITY,
        KallError::Service(e) if e.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
        KallError::Service(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(error: KallError) -> Response {
    (
        status_for(&error),
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn list_tools(State(state): State<Arc<AppState>>) -> Response {
    match state.orchestrator.registry().await {
        Ok(registry) => Json(
            registry
                .schemas()
                .map(|s| ToolInfo {
                    name: s.name.clone(),
                    description: s.description.clone(),
                    parameters: s.to_json_schema(),
                })
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(e) => error_response(e),
    }
}

async fn chat(State(state): State<Arc<AppState>>, Json(req): Json<ChatRequest>) -> Response {
    if req.message.trim().is_empty() {
        return error_response(KallError::InvalidInput("message is empty".to_string()));
    }

    let (session, agent) = {
        let mut sessions = state.sessions.lock().await;
        let now = Instant::now();
        let existing = req
            .session
            .and_then(|id| sessions.get(&id, now).map(|agent| (id, agent)));
        match existing {
            Some(existing) => existing,
            None => {
                let agent = match state.orchestrator.agent().await {
                    Ok(agent) => Arc::new(Mutex::new(agent)),
                    Err(e) => return error_response(e),
                };
                let id = sessions.insert(agent.clone(), now);
                info!("Created session {} ({} open)", id, sessions.len());
                (id, agent)
            }
        }
    };

    let mut agent = agent.lock().await;
    match agent.chat(&req.message).await {
        Ok(response) => Json(ChatResponse {
            session,
            answer: response.content,
            tool_calls: response.tool_calls,
            rounds: response.rounds,
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

fn session_not_found(id: Uuid) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: format!("Session not found: {}", id),
        }),
    )
        .into_response()
}

async fn reset(State(state): State<Arc<AppState>>, Json(req): Json<ResetRequest>) -> Response {
    let agent = state.sessions.lock().await.get(&req.session, Instant::now());
    match agent {
        Some(agent) => {
            agent.lock().await.reset();
            Json(serde_json::json!({ "session": req.session, "reset": true })).into_response()
        }
        None => session_not_found(req.session),
    }
}

async fn close_session(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
    if state.sessions.lock().await.remove(&id) {
        info!("Closed session {}", id);
        StatusCode::NO_CONTENT.into_response()
    } else {
        session_not_found(id)
    }
}

async fn search(State(state): State<Arc<AppState>>, Json(req): Json<SearchRequest>) -> Response {
    match state.orchestrator.search(&req.query, req.limit).await {
        Ok(hits) => Json(SearchResponse {
            results: hits
                .into_iter()
                .map(|hit| SearchResult {
                    title: hit.document.title,
                    content: hit.document.content,
                    score: hit.score,
                })
                .collect(),
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteError;

    #[test]
    fn test_status_for() {
        assert_eq!(
            status_for(&KallError::InvalidInput("k must be positive".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&KallError::MaxRoundsExceeded(10)),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(&RemoteError::RateLimited("429".into()).into()),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_for(&RemoteError::Authentication("bad key".into()).into()),
            StatusCode::BAD_GATEWAY
        );
    }

    fn store(max_sessions: usize, idle_secs: u64) -> SessionStore<&'static str> {
        SessionStore::new(&ServerSettings {
            max_sessions,
            session_idle_secs: idle_secs,
        })
    }

    #[test]
    fn test_sessions_capped_by_least_recent_use() {
        let mut sessions = store(2, 3600);
        let start = Instant::now();

        let first = sessions.insert("first", start);
        let second = sessions.insert("second", start + Duration::from_secs(1));
        // Touching the first session makes the second the oldest.
        assert_eq!(sessions.get(&first, start + Duration::from_secs(2)), Some("first"));

        let third = sessions.insert("third", start + Duration::from_secs(3));
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions.get(&second, start + Duration::from_secs(4)), None);
        assert_eq!(sessions.get(&first, start + Duration::from_secs(4)), Some("first"));
        assert_eq!(sessions.get(&third, start + Duration::from_secs(4)), Some("third"));
    }

    #[test]
    fn test_idle_sessions_dropped() {
        let mut sessions = store(10, 60);
        let start = Instant::now();

        let idle = sessions.insert("idle", start);
        let active = sessions.insert("active", start);
        assert!(sessions.get(&active, start + Duration::from_secs(50)).is_some());

        let later = start + Duration::from_secs(100);
        assert_eq!(sessions.get(&idle, later), None);
        assert_eq!(sessions.get(&active, later), Some("active"));
        assert_eq!(sessions.len(), 1);
    }

    #[test]
    fn test_remove_session() {
        let mut sessions = store(10, 60);
        let id = sessions.insert("only", Instant::now());

        assert!(sessions.remove(&id));
        assert!(!sessions.remove(&id));
        assert_eq!(sessions.len(), 0);
    }

    #[test]
    fn test_chat_request_session_optional() {
        let req: ChatRequest = serde_json::from_str(r#"{"message": "hi"}"#).unwrap();
        assert!(req.session.is_none());

        let id = Uuid::new_v4();
        let req: ChatRequest =
            serde_json::from_value(serde_json::json!({ "session": id, "message": "hi" })).unwrap();
        assert_eq!(req.session, Some(id));
    }
}
