//! Shared server state, error type and health check

use crate::chat::{ChatError, ChatManager};
use crate::llm::traits::{ChatStreamer, ChildGenerator};
use crate::tree::{Explorer, TreeError};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;

/// Fixed message of a failed `/api/generate` call
pub const GENERATION_FAILED: &str = "Failed to generate nodes";

/// Fixed message of a failed `/api/chat` call
pub const CHAT_UNAVAILABLE: &str = "The library is currently closed for reorganization. (API Error)";

/// Shared server state
pub struct ServerState {
    /// Stateful node cache + generation service
    pub explorer: Arc<Explorer>,
    /// Stateful chat sessions
    pub chat_manager: Arc<ChatManager>,
    /// Provider behind the stateless `/api/generate` endpoint
    pub generator: Arc<dyn ChildGenerator>,
    /// Provider behind the stateless `/api/chat` endpoint
    pub streamer: Arc<dyn ChatStreamer>,
    /// Whether generation credentials (or a remote endpoint) are configured
    pub generation_ready: bool,
    /// Whether chat credentials (or a remote endpoint) are configured
    pub chat_ready: bool,
}

pub type ExplorerState = Arc<ServerState>;

// ============================================================================
// Health check
// ============================================================================

#[derive(Serialize)]
pub struct ProviderHealth {
    pub generation: String,
    pub chat: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub providers: ProviderHealth,
}

fn readiness(ready: bool) -> String {
    if ready {
        "configured".to_string()
    } else {
        "missing_credentials".to_string()
    }
}

/// Health check handler.
///
/// Always 200: missing credentials only make the matching endpoints fail,
/// so the server reports `"degraded"` instead of going down.
pub async fn health(State(state): State<ExplorerState>) -> Json<HealthResponse> {
    let status = if state.generation_ready && state.chat_ready {
        "ok"
    } else {
        "degraded"
    };
    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        providers: ProviderHealth {
            generation: readiness(state.generation_ready),
            chat: readiness(state.chat_ready),
        },
    })
}

// ============================================================================
// Error handling
// ============================================================================

/// Application error type
#[derive(Debug)]
pub enum AppError {
    Internal(anyhow::Error),
    NotFound(String),
    BadRequest(String),
    Conflict(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::Internal(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl From<TreeError> for AppError {
    fn from(err: TreeError) -> Self {
        match err {
            TreeError::NodeNotFound(_) => AppError::NotFound(err.to_string()),
            TreeError::PageOutOfRange { .. } => AppError::BadRequest(err.to_string()),
            TreeError::PageLimitReached { .. } => AppError::Conflict(err.to_string()),
        }
    }
}

impl From<ChatError> for AppError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::NoActiveSession => AppError::BadRequest(err.to_string()),
            ChatError::SessionNotFound(_) => AppError::NotFound(err.to_string()),
            ChatError::SessionBusy(_) => AppError::Conflict(err.to_string()),
        }
    }
}
