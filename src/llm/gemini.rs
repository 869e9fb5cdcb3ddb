//! Google Gemini chat streamer.
//!
//! Streams replies from `v1beta/models/{model}:streamGenerateContent?alt=sse`.
//! Gemini has no `[DONE]` sentinel; the stream simply ends after the chunk
//! carrying `finishReason`.

use super::prompt::{build_chat_message, chat_system_prompt};
use super::sse::{decode_text_stream, Payload};
use super::traits::{ChatStreamer, TextStream};
use super::types::{ChatStreamRequest, LlmError, Role};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::info;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_CHAT_MODEL: &str = "gemini-2.5-flash-lite";

#[derive(Debug, Clone)]
pub struct GeminiStreamer {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiStreamer {
    /// Build a streamer. A missing key only fails at call time.
    pub fn new(
        api_key: Option<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| LlmError::Http(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.base_url, self.model
        )
    }

    /// Build the JSON body: system instruction, prior turns, then the
    /// rewritten user message.
    fn build_body(request: &ChatStreamRequest) -> Value {
        let mut contents: Vec<Value> = request
            .history
            .iter()
            .map(|msg| {
                let role = match msg.role {
                    Role::User => "user",
                    Role::Model => "model",
                };
                json!({"role": role, "parts": [{"text": msg.content}]})
            })
            .collect();
        contents.push(json!({
            "role": "user",
            "parts": [{"text": build_chat_message(request)}]
        }));

        json!({
            "system_instruction": {"parts": [{"text": chat_system_prompt(request.mode)}]},
            "contents": contents,
        })
    }
}

/// Interpret one Gemini SSE payload.
///
/// Chunks look like
/// `{"candidates":[{"content":{"parts":[{"text":"Hello"}],"role":"model"}}]}`;
/// the final chunk may carry text alongside `finishReason`.
pub fn parse_gemini_payload(data: &str) -> Payload {
    let Ok(parsed) = serde_json::from_str::<Value>(data) else {
        return Payload::Skip;
    };

    if let Some(error) = parsed.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown API error")
            .to_string();
        return Payload::Error(message);
    }

    let text: String = parsed
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|c| c.first())
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();

    if text.is_empty() {
        Payload::Skip
    } else {
        Payload::Text(text)
    }
}

#[async_trait]
impl ChatStreamer for GeminiStreamer {
    async fn stream_chat(&self, request: &ChatStreamRequest) -> Result<TextStream, LlmError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(LlmError::MissingCredentials("GOOGLE_API_KEY"))?;

        info!(
            mode = ?request.mode,
            node = %request.node_title,
            ancestry = ?request.ancestry_path,
            history = request.history.len(),
            "Starting Gemini chat stream"
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .header("accept", "text/event-stream")
            .json(&Self::build_body(request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable>".to_string());
            return Err(LlmError::Upstream {
                status: status.as_u16(),
                message: body,
            });
        }

        Ok(decode_text_stream(
            response.bytes_stream(),
            parse_gemini_payload,
        ))
    }
}
