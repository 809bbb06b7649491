use crate::auth::bearer_key;
use crate::error::HttpApiError;
use crate::state::AppState;
use axum::extract::{Query, Request, State};
use axum::http::header::{HeaderValue, ACCEPT};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use gm_core::{Deltas, GameOption, RoundDocument, DEFAULT_GAME_ID};
use gm_runtime::{EventSink, PlayerAction, RuntimeError, StreamEvent};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(status))
        .route("/api/init", post(init_game))
        .route("/api/action", post(take_action))
        .route("/api/toggle_mode", post(toggle_mode))
        .layer(middleware::from_fn(cors_middleware))
        .with_state(state)
}

async fn cors_middleware(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        let mut response = Response::new(axum::body::Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        apply_cors_headers(response.headers_mut());
        return response;
    }
    let mut response = next.run(request).await;
    apply_cors_headers(response.headers_mut());
    response
}

fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static("authorization, content-type, accept"),
    );
}

async fn status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "online",
        "storageMode": state.mode().await,
        "dbConnection": state.probe().await,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InitRequest {
    pub settings: String,
    pub game_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InitResponse {
    pub state: RoundDocument,
    pub options: Vec<GameOption>,
}

async fn init_game(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<InitRequest>,
) -> Result<Json<InitResponse>, HttpApiError> {
    let api_key = bearer_key(&headers)?;
    let game_id = request
        .game_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_GAME_ID.to_string());
    info!(game_id = %game_id, "init requested");
    let doc = state.master(&api_key).await.init(&game_id, &request.settings).await?;
    Ok(Json(InitResponse {
        options: doc.current_options.clone(),
        state: doc,
    }))
}

#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub state: RoundDocument,
    pub options: Vec<GameOption>,
    pub deltas: Deltas,
    pub event_summary: String,
}

fn wants_stream(headers: &HeaderMap) -> bool {
    headers
        .get(ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("text/event-stream"))
}

fn sse_event(event: &StreamEvent) -> Result<Event, axum::Error> {
    Event::default().json_data(event)
}

async fn take_action(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(action): Json<PlayerAction>,
) -> Result<Response, HttpApiError> {
    let api_key = bearer_key(&headers)?;
    let master = state.master(&api_key).await;
    let doc = master.load(&action.game_id).await?;

    if !wants_stream(&headers) {
        let report = master.act_on(&doc, &action).await?;
        return Ok(Json(ActionResponse {
            options: report.document.current_options.clone(),
            state: report.document,
            deltas: report.deltas,
            event_summary: report.event_summary,
        })
        .into_response());
    }

    let (sink, rx) = EventSink::channel(state.stream_buffer);
    tokio::spawn(async move {
        match master.stream_on(&doc, &action, &sink).await {
            Ok(next) => info!(game_id = %next.game_id, round_id = next.round_id, "streamed round finished"),
            Err(RuntimeError::Disconnected) => warn!(game_id = %doc.game_id, "client left mid-round"),
            Err(e) => warn!(game_id = %doc.game_id, error = %e, "streamed round failed"),
        }
    });
    let events = futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|event| (sse_event(&event), rx))
    });
    Ok(Sse::new(events).keep_alive(KeepAlive::default()).into_response())
}

#[derive(Debug, Deserialize)]
pub struct ToggleQuery {
    pub mode: String,
}

async fn toggle_mode(
    State(state): State<AppState>,
    Query(query): Query<ToggleQuery>,
) -> Result<Json<Value>, HttpApiError> {
    let mode = query
        .mode
        .parse()
        .map_err(|e: anyhow::Error| HttpApiError::bad_request(e.to_string()))?;
    let mode = state
        .switch_to(mode)
        .await
        .map_err(|e| HttpApiError::unavailable("could not open the requested store", e.to_string()))?;
    Ok(Json(json!({"status": "ok", "storageMode": mode})))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{StorageConfig, StorageMode};
    use crate::state::BackendFactory;
    use axum::http::header::AUTHORIZATION;
    use gm_ai::{GenerationBackend, Purpose, Reply, ScriptedBackend};
    use gm_runtime::RuntimeConfig;
    use persistence::{MemoryStore, RoundStore};
    use std::sync::Arc;

    fn app_state(store: Arc<MemoryStore>, storage: StorageConfig) -> AppState {
        let backend: Arc<dyn GenerationBackend> = Arc::new(
            ScriptedBackend::new().on_actor(
                Purpose::Analyze,
                "ceo",
                Reply::text(r#"{"valid": true, "attributeChanges": {"cash": -100}, "eventSummary": "Paid."}"#),
            ).on_actor(
                Purpose::Analyze,
                "cto",
                Reply::text(r#"{"valid": true, "attributeChanges": {}}"#),
            ).on_actor(
                Purpose::Analyze,
                "cmo",
                Reply::text(r#"{"valid": true, "attributeChanges": {}}"#),
            ),
        );
        let factory: BackendFactory = Arc::new(move |_key: &str| backend.clone());
        AppState::new(
            StorageMode::Local,
            store,
            storage,
            factory,
            RuntimeConfig::default(),
            64,
        )
    }

    fn authorized() -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(AUTHORIZATION, HeaderValue::from_static("Bearer sk-test"));
        h
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn init(state: &AppState) -> Value {
        let Json(resp) = init_game(State(state.clone()), authorized(), Json(InitRequest::default()))
            .await
            .unwrap();
        serde_json::to_value(resp).unwrap()
    }

    #[tokio::test]
    async fn missing_credential_is_rejected_before_any_work() {
        let store = Arc::new(MemoryStore::new());
        let state = app_state(store.clone(), StorageConfig::default());
        let err = init_game(State(state.clone()), HeaderMap::new(), Json(InitRequest::default()))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        let err = take_action(State(state), HeaderMap::new(), Json(PlayerAction::default()))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert!(store.timeline(DEFAULT_GAME_ID).is_empty());
    }

    #[tokio::test]
    async fn init_then_action_over_http() {
        let store = Arc::new(MemoryStore::new());
        let state = app_state(store.clone(), StorageConfig::default());
        let first = init(&state).await;
        assert_eq!(first["state"]["roundId"], 1);
        assert_eq!(first["state"]["turn"], 1);
        assert!(!first["options"].as_array().unwrap().is_empty());

        let action = PlayerAction {
            label: "A".into(),
            ..PlayerAction::default()
        };
        let response = take_action(State(state), authorized(), Json(action)).await.unwrap();
        let body = body_json(response).await;
        assert_eq!(body["state"]["roundId"], 2);
        assert_eq!(body["deltas"]["cash"], -100);
        assert_eq!(body["event_summary"], "Paid.");
        assert_eq!(
            body["state"]["attributes"]["cash"],
            first["state"]["attributes"]["cash"].as_i64().unwrap() - 100
        );
        assert_eq!(store.timeline(DEFAULT_GAME_ID).len(), 2);
    }

    #[tokio::test]
    async fn unknown_game_is_404() {
        let state = app_state(Arc::new(MemoryStore::new()), StorageConfig::default());
        let action = PlayerAction {
            game_id: "nowhere".into(),
            ..PlayerAction::default()
        };
        let err = take_action(State(state), authorized(), Json(action)).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        let body = body_json(err.into_response()).await;
        assert_eq!(body["error"], "session not found");
    }

    #[tokio::test]
    async fn streamed_action_ends_with_done() {
        let store = Arc::new(MemoryStore::new());
        let state = app_state(store.clone(), StorageConfig::default());
        init(&state).await;
        let mut headers = authorized();
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        let response = take_action(
            State(state),
            headers,
            Json(PlayerAction {
                label: "A".into(),
                ..PlayerAction::default()
            }),
        )
        .await
        .unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        let events: Vec<Value> = text
            .lines()
            .filter_map(|line| line.strip_prefix("data:"))
            .map(|data| serde_json::from_str(data.trim_start()).unwrap())
            .collect();
        assert_eq!(events.first().unwrap()["type"], "log");
        let done: Vec<&Value> = events.iter().filter(|e| e["type"] == "done").collect();
        assert_eq!(done.len(), 1);
        let last = events.last().unwrap();
        assert_eq!(last["type"], "done");
        assert_eq!(last["persisted"], true);
        assert_eq!(last["state"]["roundId"], 2);
        assert!(events.iter().any(|e| e["type"] == "token" && e["streamId"] == "2-ceo"));
        let latest = store.pull_latest(DEFAULT_GAME_ID).await.unwrap().unwrap();
        assert_eq!(latest.round_id, 2);
    }

    #[tokio::test]
    async fn toggle_switches_and_rejects_unknown_modes() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageConfig {
            mode: StorageMode::Local,
            local_path: dir.path().join("local.json").display().to_string(),
            sqlite_url: format!("sqlite://{}", dir.path().join("db").join("rounds.db").display()),
        };
        let state = app_state(Arc::new(MemoryStore::new()), storage);

        let err = toggle_mode(State(state.clone()), Query(ToggleQuery { mode: "REMOTE".into() }))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let Json(body) = toggle_mode(State(state.clone()), Query(ToggleQuery { mode: "cloud".into() }))
            .await
            .unwrap();
        assert_eq!(body["storageMode"], "CLOUD");
        assert_eq!(state.mode().await, StorageMode::Cloud);

        let doc = init(&state).await;
        assert_eq!(doc["state"]["roundId"], 1);
        let Json(status_body) = status(State(state.clone())).await;
        assert_eq!(status_body["storageMode"], "CLOUD");
        assert_eq!(status_body["dbConnection"], true);

        let store = persistence::SqliteStore::connect(&format!(
            "sqlite://{}",
            dir.path().join("db").join("rounds.db").display()
        ))
        .await
        .unwrap();
        assert_eq!(store.count(DEFAULT_GAME_ID).await.unwrap(), 1);
    }

    #[test]
    fn accept_header_selects_streaming() {
        let mut headers = HeaderMap::new();
        assert!(!wants_stream(&headers));
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream, */*"));
        assert!(wants_stream(&headers));
    }
}
