//! Scripted providers for tests
//!
//! Neither mock touches the network. Responses are queued up front; when the
//! queue is empty the mocks fall back to deterministic defaults so tests that
//! don't care about content stay short.

use super::traits::{ChatStreamer, ChildGenerator, TextStream};
use super::types::{ChatStreamRequest, ChildSpec, GenerateRequest, LlmError};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

/// Scripted [`ChildGenerator`].
///
/// Every request is recorded. If a gate is set, each call waits for one
/// `notify_one()` before answering, which lets tests hold a generation
/// in flight.
#[derive(Default)]
pub struct MockGenerator {
    responses: Mutex<VecDeque<Result<Vec<ChildSpec>, LlmError>>>,
    requests: Mutex<Vec<GenerateRequest>>,
    gate: Option<Arc<Notify>>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_gate(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub async fn push_ok(&self, children: Vec<ChildSpec>) {
        self.responses.lock().await.push_back(Ok(children));
    }

    pub async fn push_err(&self, err: LlmError) {
        self.responses.lock().await.push_back(Err(err));
    }

    pub async fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.requests.lock().await.len()
    }

    /// Five children titled after the parent, used when nothing is queued
    fn default_children(request: &GenerateRequest) -> Vec<ChildSpec> {
        (1..=5)
            .map(|i| {
                ChildSpec::new(
                    format!("{} {}", request.parent_node.title, i),
                    format!("Part {} of {}", i, request.parent_node.title),
                )
            })
            .collect()
    }
}

#[async_trait]
impl ChildGenerator for MockGenerator {
    async fn generate(&self, request: &GenerateRequest) -> Result<Vec<ChildSpec>, LlmError> {
        self.requests.lock().await.push(request.clone());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        match self.responses.lock().await.pop_front() {
            Some(response) => response,
            None => Ok(Self::default_children(request)),
        }
    }
}

enum Script {
    Chunks(Vec<String>),
    /// Chunks followed by a mid-stream error
    Broken(Vec<String>, LlmError),
    /// Rejected before streaming starts
    Refused(LlmError),
}

/// Scripted [`ChatStreamer`].
///
/// Each call consumes one script; with none queued it streams
/// `"Reply to: <message>"` in two fragments.
#[derive(Default)]
pub struct MockChatStreamer {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<ChatStreamRequest>>,
    gate: Option<Arc<Notify>>,
}

impl MockChatStreamer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Streams wait for one `notify_one()` before the first fragment
    pub fn with_gate(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub async fn push_chunks<S: Into<String>>(&self, chunks: impl IntoIterator<Item = S>) {
        let chunks = chunks.into_iter().map(Into::into).collect();
        self.scripts.lock().await.push_back(Script::Chunks(chunks));
    }

    pub async fn push_broken<S: Into<String>>(
        &self,
        chunks: impl IntoIterator<Item = S>,
        err: LlmError,
    ) {
        let chunks = chunks.into_iter().map(Into::into).collect();
        self.scripts
            .lock()
            .await
            .push_back(Script::Broken(chunks, err));
    }

    pub async fn push_refusal(&self, err: LlmError) {
        self.scripts.lock().await.push_back(Script::Refused(err));
    }

    pub async fn requests(&self) -> Vec<ChatStreamRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.requests.lock().await.len()
    }
}

#[async_trait]
impl ChatStreamer for MockChatStreamer {
    async fn stream_chat(&self, request: &ChatStreamRequest) -> Result<TextStream, LlmError> {
        self.requests.lock().await.push(request.clone());
        let script = self.scripts.lock().await.pop_front();
        let items: Vec<Result<String, LlmError>> = match script {
            Some(Script::Refused(err)) => return Err(err),
            Some(Script::Chunks(chunks)) => chunks.into_iter().map(Ok).collect(),
            Some(Script::Broken(chunks, err)) => chunks
                .into_iter()
                .map(Ok)
                .chain(std::iter::once(Err(err)))
                .collect(),
            None => vec![
                Ok("Reply to: ".to_string()),
                Ok(request.message.clone()),
            ],
        };

        let gate = self.gate.clone();
        Ok(stream::once(async move {
            if let Some(gate) = gate {
                gate.notified().await;
            }
            stream::iter(items)
        })
        .flatten()
        .boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::models::Node;

    fn request() -> GenerateRequest {
        GenerateRequest {
            parent_node: Node::leaf("p", "Physics", ""),
            path_history: vec!["Physics".into()],
            exclude_titles: None,
        }
    }

    #[tokio::test]
    async fn test_generator_queue_then_default() {
        let generator = MockGenerator::new();
        generator.push_ok(vec![ChildSpec::new("Optics", "light")]).await;

        let first = generator.generate(&request()).await.unwrap();
        assert_eq!(first[0].title, "Optics");
        let second = generator.generate(&request()).await.unwrap();
        assert_eq!(second.len(), 5);
        assert_eq!(second[0].title, "Physics 1");
        assert_eq!(generator.call_count().await, 2);
    }

    #[tokio::test]
    async fn test_streamer_broken_script() {
        let streamer = MockChatStreamer::new();
        streamer
            .push_broken(["a", "b"], LlmError::Stream("cut".into()))
            .await;
        let req = ChatStreamRequest {
            message: "hi".into(),
            node_title: "T".into(),
            ancestry_path: vec![],
            mode: Default::default(),
            history: vec![],
        };
        let items: Vec<_> = streamer.stream_chat(&req).await.unwrap().collect().await;
        assert_eq!(items.len(), 3);
        assert!(items[2].is_err());
    }
}
