//! Chat types: sessions, messages and streamed events

use crate::llm::types::{ChatMode, HistoryMessage, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One entry of a session's append-only message log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    /// Sent to the model but not displayed (synthesised openers)
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_questions: Option<Vec<String>>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            hidden: false,
            suggested_questions: None,
        }
    }

    /// Empty model message filled in as the stream arrives
    pub fn placeholder() -> Self {
        Self {
            role: Role::Model,
            content: String::new(),
            hidden: false,
            suggested_questions: None,
        }
    }

    pub fn to_history(&self) -> HistoryMessage {
        HistoryMessage {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

/// A conversation thread tied to one node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: Uuid,
    pub node_id: String,
    pub node_title: String,
    pub messages: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
}

impl ChatSession {
    pub fn new(node_id: impl Into<String>, node_title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            node_id: node_id.into(),
            node_title: node_title.into(),
            messages: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Suggested questions of the latest model message, if any
    pub fn suggested_questions(&self) -> Vec<String> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Model)
            .and_then(|m| m.suggested_questions.clone())
            .unwrap_or_default()
    }

    /// Messages shown to the user (hidden openers removed)
    pub fn visible_messages(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter().filter(|m| !m.hidden)
    }

    /// First `max_chars` characters of the last visible message, with `...` when cut
    pub fn preview(&self, max_chars: usize) -> String {
        let Some(last) = self.visible_messages().last() else {
            return String::new();
        };
        let mut preview: String = last.content.chars().take(max_chars).collect();
        if last.content.chars().count() > max_chars {
            preview.push_str("...");
        }
        preview
    }
}

/// Entry of the session list
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub node_id: String,
    pub title: String,
    pub preview: String,
    pub message_count: usize,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
    pub is_loading: bool,
}

/// Session detail with derived state
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    #[serde(flatten)]
    pub session: ChatSession,
    pub suggested_questions: Vec<String>,
    pub is_active: bool,
    pub is_loading: bool,
}

/// Request body of `POST /api/chat/trigger`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerChatRequest {
    pub node_id: String,
    /// Defaults to the cached node's title
    #[serde(default)]
    pub node_title: Option<String>,
    #[serde(default = "default_trigger_mode")]
    pub mode: ChatMode,
    /// Asked instead of the synthesised "Tell me about ..." opener
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default = "default_open_chat")]
    pub open_chat: bool,
}

fn default_trigger_mode() -> ChatMode {
    ChatMode::Explore
}

fn default_open_chat() -> bool {
    true
}

/// Request body of `POST /api/chat/messages`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub message: String,
}

/// Events streamed while a model reply is produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// A fragment appended to the placeholder message
    StreamDelta { session_id: Uuid, text: String },
    /// The reply finished; `content` is the final displayed text
    Completed {
        session_id: Uuid,
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        suggested_questions: Option<Vec<String>>,
    },
    /// The reply failed; the placeholder now holds `message`
    Failed { session_id: Uuid, message: String },
}

impl ChatEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ChatEvent::StreamDelta { .. })
    }
}
