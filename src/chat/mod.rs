//! Chat module: one conversation thread per explored node
//!
//! Replies are streamed from a [`ChatStreamer`](crate::llm::ChatStreamer)
//! into the session log and re-broadcast as [`ChatEvent`]s for SSE clients.

pub mod config;
pub mod manager;
pub mod sentinel;
pub mod types;

pub use config::ChatConfig;
pub use manager::{ChatError, ChatManager, ChatTurn, TriggerChat};
pub use types::{
    ChatEvent, ChatMessage, ChatSession, SendMessageRequest, SessionSummary, SessionView,
    TriggerChatRequest,
};
