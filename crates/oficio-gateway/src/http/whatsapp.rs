use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use oficio_core::types::WhatsAppInbound;

use crate::app::AppState;

/// POST /handle-whatsapp-message — one conversation turn.
///
/// Replies are always 200 with `{"response": ...}` or `{"messages": [...]}`;
/// the only client error is a missing phone.
pub async fn handle_whatsapp_message(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<WhatsAppInbound>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    match state.orchestrator.handle_message(payload).await {
        Ok(reply) => Ok(Json(serde_json::to_value(reply).unwrap_or(Value::Null))),
        Err(e) => Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "detail": e.to_string() })),
        )),
    }
}
