use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use oficio_conversation::{ConversationServices, Orchestrator};
use oficio_core::config::OficioConfig;

/// Central shared state — `Arc<AppState>` into every handler.
pub struct AppState {
    pub orchestrator: Orchestrator,
}

impl AppState {
    pub async fn init(config: OficioConfig, cancel: CancellationToken) -> Arc<Self> {
        let services = ConversationServices::init(config, cancel).await;
        // The availability listener subscribes lazily on the first request;
        // starting it here keeps replies from racing the first search.
        services.availability.start();
        Arc::new(Self {
            orchestrator: Orchestrator::new(services),
        })
    }

    pub fn services(&self) -> &Arc<ConversationServices> {
        self.orchestrator.services()
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(crate::http::root::root))
        .route("/health", get(crate::http::health::health))
        .route("/process-message", post(crate::http::process::process_message))
        .route(
            "/handle-whatsapp-message",
            post(crate::http::whatsapp::handle_whatsapp_message),
        )
        .route("/sessions", post(crate::http::sessions::create_session))
        .route("/sessions/stats", get(crate::http::sessions::session_stats))
        .route(
            "/sessions/{phone}",
            get(crate::http::sessions::get_sessions).delete(crate::http::sessions::delete_sessions),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
