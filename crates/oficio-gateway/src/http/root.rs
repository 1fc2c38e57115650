use axum::Json;
use serde_json::{json, Value};

/// GET / — service metadata.
pub async fn root() -> Json<Value> {
    Json(json!({
        "service": "oficio-clientes",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
    }))
}
