//! Provider traits for child generation and chat streaming
//!
//! Same shape as the store traits in `tree::traits`: async trait + Send + Sync
//! so implementations can be shared as `Arc<dyn ...>` across tasks.

use super::types::{ChatStreamRequest, ChildSpec, GenerateRequest, LlmError};
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Stream of text fragments produced by a chat provider.
///
/// Concatenating the `Ok` items in order yields the full reply. An `Err`
/// item terminates the stream.
pub type TextStream = BoxStream<'static, Result<String, LlmError>>;

/// Produces sub-topics for a node.
///
/// # Implementations
///
/// - [`OpenAiGenerator`](super::OpenAiGenerator): calls an OpenAI-compatible
///   chat-completions endpoint in JSON mode
/// - [`HttpChildGenerator`](super::HttpChildGenerator): posts to a remote
///   `/api/generate` endpoint
/// - [`MockGenerator`](super::MockGenerator): scripted responses for tests
#[async_trait]
pub trait ChildGenerator: Send + Sync {
    /// Generate children for `request.parent_node`.
    ///
    /// Returns validated children in provider order. All-or-nothing: on any
    /// error no children are returned.
    async fn generate(&self, request: &GenerateRequest) -> Result<Vec<ChildSpec>, LlmError>;
}

/// Streams a chat reply for a node.
///
/// # Implementations
///
/// - [`GeminiStreamer`](super::GeminiStreamer): Gemini `streamGenerateContent`
/// - [`HttpChatStreamer`](super::HttpChatStreamer): consumes a remote
///   `/api/chat` SSE endpoint
/// - [`MockChatStreamer`](super::MockChatStreamer): scripted chunks for tests
#[async_trait]
pub trait ChatStreamer: Send + Sync {
    /// Start a reply. Errors before the first byte (credentials, HTTP status)
    /// are returned directly; later failures arrive as an `Err` stream item.
    async fn stream_chat(&self, request: &ChatStreamRequest) -> Result<TextStream, LlmError>;
}
