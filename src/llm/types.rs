//! Wire types for the generation and chat endpoints, and provider errors

use crate::tree::models::{LlmConfig, Node, PopupData};
use serde::{Deserialize, Serialize};

/// Errors raised by text-generation providers.
///
/// The variants follow the failure classes the HTTP layer distinguishes:
/// missing credentials, transport failures, upstream rejections and
/// responses that do not match the expected schema.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmError {
    #[error("missing {0}")]
    MissingCredentials(&'static str),
    #[error("request failed: {0}")]
    Http(String),
    #[error("provider returned {status}: {message}")]
    Upstream { status: u16, message: String },
    #[error("malformed provider response: {0}")]
    Malformed(String),
    #[error("stream error: {0}")]
    Stream(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Http(err.to_string())
    }
}

// ============================================================================
// Generation endpoint
// ============================================================================

/// One generated sub-topic, validated against the response schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildSpec {
    pub title: String,
    #[serde(default)]
    pub hook: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_config: Option<LlmConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub popup_data: Option<PopupData>,
}

impl ChildSpec {
    pub fn new(title: impl Into<String>, hook: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            hook: hook.into(),
            llm_config: None,
            popup_data: None,
        }
    }
}

/// Request body of `POST /api/generate`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub parent_node: Node,
    #[serde(default)]
    pub path_history: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_titles: Option<Vec<String>>,
}

/// Success body of `POST /api/generate`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub children: Vec<ChildSpec>,
}

#[derive(Deserialize)]
struct RawChildren {
    children: Option<Vec<RawChild>>,
}

#[derive(Deserialize)]
struct RawChild {
    title: Option<String>,
    #[serde(default)]
    hook: Option<String>,
    #[serde(default)]
    llm_config: Option<LlmConfig>,
    #[serde(default)]
    popup_data: Option<PopupData>,
}

/// Parse and validate a generation payload (`{"children": [...]}`).
///
/// Missing `children`, invalid JSON or a child without a title are all
/// reported as [`LlmError::Malformed`]; nothing is partially accepted.
pub fn parse_children(content: &str) -> Result<Vec<ChildSpec>, LlmError> {
    let raw: RawChildren = serde_json::from_str(content)
        .map_err(|e| LlmError::Malformed(format!("invalid JSON: {}", e)))?;

    let children = raw
        .children
        .ok_or_else(|| LlmError::Malformed("missing `children` array".into()))?;

    children
        .into_iter()
        .enumerate()
        .map(|(i, child)| {
            let title = child
                .title
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .ok_or_else(|| LlmError::Malformed(format!("child {} has no title", i)))?;
            Ok(ChildSpec {
                title,
                hook: child.hook.unwrap_or_default(),
                llm_config: child.llm_config,
                popup_data: child.popup_data,
            })
        })
        .collect()
}

// ============================================================================
// Chat endpoint
// ============================================================================

/// Author of a chat message, in the provider's vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// Which system prompt the chat endpoint uses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    /// Long-form article about a node
    Explore,
    /// Conversational follow-up
    #[default]
    Chat,
}

/// A prior turn sent as provider history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub role: Role,
    pub content: String,
}

/// Request body of `POST /api/chat`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatStreamRequest {
    pub message: String,
    pub node_title: String,
    #[serde(default)]
    pub ancestry_path: Vec<String>,
    #[serde(default)]
    pub mode: ChatMode,
    #[serde(default)]
    pub history: Vec<HistoryMessage>,
}
