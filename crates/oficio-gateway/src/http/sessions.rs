use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::app::AppState;

#[derive(Deserialize)]
pub struct SessionCreateRequest {
    pub phone: String,
    pub message: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Deserialize)]
pub struct SessionQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    10
}

/// POST /sessions — store one user turn.
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SessionCreateRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if request.phone.trim().is_empty() || request.message.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "detail": "phone and message are required" })),
        ));
    }
    let mut meta = Map::new();
    if let Some(timestamp) = request.timestamp {
        meta.insert("timestamp".into(), Value::String(timestamp));
    }
    state
        .services()
        .sessions
        .save(&request.phone, &request.message, false, meta)
        .await;
    Ok(Json(json!({ "status": "saved", "phone": request.phone })))
}

/// GET /sessions/{phone}?limit=N — recent turns for a phone.
pub async fn get_sessions(
    State(state): State<Arc<AppState>>,
    Path(phone): Path<String>,
    Query(query): Query<SessionQuery>,
) -> Json<Value> {
    let turns = state.services().sessions.history(&phone, query.limit).await;
    let sessions: Vec<Value> = turns
        .into_iter()
        .map(|turn| {
            let mut row = json!({
                "phone": phone,
                "message": turn.message,
                "timestamp": turn.timestamp.to_rfc3339(),
                "created_at": turn.timestamp.to_rfc3339(),
                "is_bot": turn.is_bot,
            });
            if let Value::Object(ref mut map) = row {
                for (k, v) in turn.metadata {
                    map.entry(k).or_insert(v);
                }
            }
            row
        })
        .collect();
    Json(json!({ "sessions": sessions }))
}

/// DELETE /sessions/{phone} — drop the transcript.
pub async fn delete_sessions(
    State(state): State<Arc<AppState>>,
    Path(phone): Path<String>,
) -> Json<Value> {
    state.services().sessions.delete(&phone).await;
    Json(json!({ "status": "deleted", "phone": phone }))
}

/// GET /sessions/stats — counts across all stored transcripts.
pub async fn session_stats(State(state): State<Arc<AppState>>) -> Json<Value> {
    let stats = state.services().sessions.stats().await;
    Json(json!({
        "active_sessions": stats.active_sessions,
        "total_turns": stats.total_turns,
    }))
}
