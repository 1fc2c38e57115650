use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{Map, Value};

use oficio_conversation::process::{process_free_message, ProcessedMessage};

use crate::app::AppState;

#[derive(Deserialize)]
pub struct MessageProcessingRequest {
    pub message: String,
    #[serde(default)]
    pub context: Map<String, Value>,
}

/// POST /process-message — free-text entity extraction with a provider
/// digest when the need is complete.
pub async fn process_message(
    State(state): State<Arc<AppState>>,
    Json(request): Json<MessageProcessingRequest>,
) -> Json<ProcessedMessage> {
    let phone = request
        .context
        .get("phone")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string();
    let processed = process_free_message(state.services(), &phone, &request.message).await;
    Json(processed)
}
