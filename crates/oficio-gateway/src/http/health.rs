use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::app::AppState;

/// GET /health — 200 with service facts when the KV store answers PING,
/// 503 otherwise.
pub async fn health(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if state.services().kv.ping().await {
        Ok(Json(json!({
            "status": "healthy",
            "redis": "connected",
            "service": "oficio-clientes",
        })))
    } else {
        Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "detail": "Service unhealthy: redis ping failed" })),
        ))
    }
}
