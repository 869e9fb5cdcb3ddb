//! API route definitions

use super::chat_handlers;
use super::explorer_handlers;
use super::generate_handlers;
use super::handlers::{self, ExplorerState};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the API router
pub fn create_router(state: ExplorerState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // ====================================================================
        // Stateless provider endpoints
        // ====================================================================
        .route("/api/generate", post(generate_handlers::generate))
        .route("/api/chat", post(chat_handlers::stream_chat))
        // ====================================================================
        // Knowledge tree
        // ====================================================================
        .route("/api/roots", get(explorer_handlers::list_roots))
        .route("/api/nodes/{id}", get(explorer_handlers::get_node))
        .route(
            "/api/nodes/{id}/children",
            get(explorer_handlers::get_children),
        )
        .route(
            "/api/nodes/{id}/pages",
            get(explorer_handlers::get_pages).put(explorer_handlers::set_page),
        )
        .route(
            "/api/nodes/{id}/select",
            post(explorer_handlers::select_node),
        )
        .route(
            "/api/nodes/{id}/generate",
            post(explorer_handlers::generate_children),
        )
        .route("/api/nodes/{id}/more", post(explorer_handlers::generate_more))
        .route("/api/path", get(explorer_handlers::get_path))
        // ====================================================================
        // Chat sessions
        // ====================================================================
        .route("/api/chat/trigger", post(chat_handlers::trigger_chat))
        .route("/api/chat/messages", post(chat_handlers::send_message))
        .route("/api/chat/sessions", get(chat_handlers::list_sessions))
        .route(
            "/api/chat/sessions/{id}",
            get(chat_handlers::get_session).delete(chat_handlers::delete_session),
        )
        .route(
            "/api/chat/sessions/{id}/activate",
            post(chat_handlers::activate_session),
        )
        .route("/api/chat/toggle", post(chat_handlers::toggle_chat))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
