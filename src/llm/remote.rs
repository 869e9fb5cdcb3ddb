//! Clients for a remote explorer's own `/api/generate` and `/api/chat`
//! endpoints, for deployments where the stateful tree and the provider keys
//! live in different processes.

use super::sse::{decode_text_stream, parse_chat_payload};
use super::traits::{ChatStreamer, ChildGenerator, TextStream};
use super::types::{parse_children, ChatStreamRequest, ChildSpec, GenerateRequest, LlmError};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

fn client(timeout: Duration) -> Result<reqwest::Client, LlmError> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(timeout)
        .build()
        .map_err(|e| LlmError::Http(format!("failed to build HTTP client: {}", e)))
}

async fn upstream_error(response: reqwest::Response) -> LlmError {
    let status = response.status().as_u16();
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|b| b.error)
        .unwrap_or(text);
    LlmError::Upstream { status, message }
}

/// [`ChildGenerator`] posting to a remote generation endpoint
#[derive(Debug, Clone)]
pub struct HttpChildGenerator {
    client: reqwest::Client,
    url: String,
}

impl HttpChildGenerator {
    pub fn new(url: impl Into<String>) -> Result<Self, LlmError> {
        Ok(Self {
            client: client(Duration::from_secs(120))?,
            url: url.into(),
        })
    }
}

#[async_trait]
impl ChildGenerator for HttpChildGenerator {
    async fn generate(&self, request: &GenerateRequest) -> Result<Vec<ChildSpec>, LlmError> {
        debug!(url = %self.url, parent = %request.parent_node.id, "Remote generation");
        let response = self.client.post(&self.url).json(request).send().await?;
        if !response.status().is_success() {
            return Err(upstream_error(response).await);
        }
        let text = response.text().await?;
        parse_children(&text)
    }
}

/// [`ChatStreamer`] consuming a remote `/api/chat` SSE endpoint
#[derive(Debug, Clone)]
pub struct HttpChatStreamer {
    client: reqwest::Client,
    url: String,
}

impl HttpChatStreamer {
    pub fn new(url: impl Into<String>) -> Result<Self, LlmError> {
        Ok(Self {
            client: client(Duration::from_secs(300))?,
            url: url.into(),
        })
    }
}

#[async_trait]
impl ChatStreamer for HttpChatStreamer {
    async fn stream_chat(&self, request: &ChatStreamRequest) -> Result<TextStream, LlmError> {
        debug!(url = %self.url, node = %request.node_title, "Remote chat stream");
        let response = self
            .client
            .post(&self.url)
            .header("accept", "text/event-stream")
            .json(request)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(upstream_error(response).await);
        }
        Ok(decode_text_stream(
            response.bytes_stream(),
            parse_chat_payload,
        ))
    }
}
