//! Chat API handlers: stateless streaming endpoint and session management
//!
//! Streaming responses are Server-Sent Events. The stateless `/api/chat`
//! endpoint writes one `{"text": ...}` frame per provider fragment and a
//! final `[DONE]`; the session endpoints stream typed [`ChatEvent`]s and end
//! after the terminal event.

use crate::api::handlers::{AppError, ExplorerState, CHAT_UNAVAILABLE};
use crate::api::query::{PaginatedResponse, PaginationParams};
use crate::chat::{
    ChatEvent, ChatTurn, SendMessageRequest, SessionSummary, SessionView, TriggerChat,
    TriggerChatRequest,
};
use crate::llm::sse::{error_payload, text_payload, DONE};
use crate::llm::types::ChatStreamRequest;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::{future, stream, Stream, StreamExt};
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{error, warn};
use uuid::Uuid;

// ============================================================================
// Stateless chat stream
// ============================================================================

/// POST /api/chat: Stream a reply for one message, keeping no state
///
/// A provider that refuses the request (missing key, upstream error) yields
/// a 500 before any frame is written. A failure mid-stream writes an error
/// frame and closes the stream without `[DONE]`.
pub async fn stream_chat(
    State(state): State<ExplorerState>,
    Json(req): Json<ChatStreamRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let text_stream = state.streamer.stream_chat(&req).await.map_err(|e| {
        error!(node = %req.node_title, error = %e, "Chat stream refused");
        AppError::Internal(anyhow::anyhow!(CHAT_UNAVAILABLE))
    })?;

    // `None` marks the natural end of the provider stream
    let frames = text_stream
        .map(Some)
        .chain(stream::once(future::ready(None)))
        .scan(false, |failed, item| {
            let frame = if *failed {
                None
            } else {
                match item {
                    Some(Ok(text)) => Some(Event::default().data(text_payload(&text))),
                    Some(Err(e)) => {
                        warn!(error = %e, "Chat stream interrupted");
                        *failed = true;
                        Some(Event::default().data(error_payload(CHAT_UNAVAILABLE)))
                    }
                    None => Some(Event::default().data(DONE)),
                }
            };
            future::ready(frame)
        })
        .map(Ok);

    Ok(Sse::new(frames).keep_alive(KeepAlive::default()))
}

// ============================================================================
// Session turns
// ============================================================================

fn event_name(event: &ChatEvent) -> &'static str {
    match event {
        ChatEvent::StreamDelta { .. } => "stream_delta",
        ChatEvent::Completed { .. } => "completed",
        ChatEvent::Failed { .. } => "failed",
    }
}

/// Re-broadcast a turn's events as SSE, ending after the terminal event
fn turn_events(turn: ChatTurn) -> impl Stream<Item = Result<Event, Infallible>> {
    let session_id = turn.session_id;
    BroadcastStream::new(turn.events)
        .filter_map(move |item| {
            future::ready(match item {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!(session_id = %session_id, error = %e, "Chat subscriber lagged");
                    None
                }
            })
        })
        .scan(false, |done, event| {
            if *done {
                return future::ready(None);
            }
            *done = event.is_terminal();
            let frame = Event::default()
                .event(event_name(&event))
                .json_data(&event)
                .unwrap_or_else(|e| Event::default().comment(format!("unserializable: {e}")));
            future::ready(Some(frame))
        })
        .map(Ok)
}

/// POST /api/chat/trigger: Ask about a node (explore mode by default)
pub async fn trigger_chat(
    State(state): State<ExplorerState>,
    Json(req): Json<TriggerChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let node_title = match req.node_title {
        Some(title) => title,
        None => state
            .explorer
            .store()
            .get(&req.node_id)
            .await
            .map(|n| n.title)
            .ok_or_else(|| AppError::NotFound(format!("Node {} not found", req.node_id)))?,
    };

    let turn = state
        .chat_manager
        .trigger_chat(TriggerChat {
            node_id: req.node_id,
            node_title,
            mode: req.mode,
            question: req.question,
            open_chat: req.open_chat,
        })
        .await?;

    Ok(Sse::new(turn_events(turn)).keep_alive(KeepAlive::default()))
}

/// POST /api/chat/messages: Follow-up on the active session
pub async fn send_message(
    State(state): State<ExplorerState>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    if req.message.trim().is_empty() {
        return Err(AppError::BadRequest("message cannot be empty".to_string()));
    }
    let turn = state.chat_manager.send_message(&req.message).await?;
    Ok(Sse::new(turn_events(turn)).keep_alive(KeepAlive::default()))
}

// ============================================================================
// Sessions
// ============================================================================

/// GET /api/chat/sessions: List sessions, most recent first
pub async fn list_sessions(
    State(state): State<ExplorerState>,
    Query(pagination): Query<PaginationParams>,
) -> Result<Json<PaginatedResponse<SessionSummary>>, AppError> {
    pagination.validate().map_err(AppError::BadRequest)?;
    let sessions = state.chat_manager.list_sessions().await;
    Ok(Json(pagination.paginate(sessions)))
}

/// GET /api/chat/sessions/{id}: Get session details
pub async fn get_session(
    State(state): State<ExplorerState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(state.chat_manager.get_session(session_id).await?))
}

/// DELETE /api/chat/sessions/{id}: Delete a session
pub async fn delete_session(
    State(state): State<ExplorerState>,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.chat_manager.delete_session(session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/chat/sessions/{id}/activate: Make a session the active one
pub async fn activate_session(
    State(state): State<ExplorerState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(state.chat_manager.switch_session(session_id).await?))
}

/// POST /api/chat/toggle: Flip the chat-open flag
pub async fn toggle_chat(State(state): State<ExplorerState>) -> Json<serde_json::Value> {
    let open = state.chat_manager.toggle_chat().await;
    Json(serde_json::json!({ "chat_open": open }))
}
