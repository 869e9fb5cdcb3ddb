//! Server-Sent Events plumbing shared by the streaming clients and the
//! `/api/chat` endpoint.
//!
//! The chat wire format is one `data: {"text": "..."}` frame per fragment,
//! terminated by `data: [DONE]`. Error objects (`{"error": "..."}`) end the
//! stream with a failure.

use super::traits::TextStream;
use super::types::LlmError;
use bytes::Bytes;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt::Display;

/// Maximum size of a single unterminated SSE line. Anything larger is
/// treated as a corrupted stream.
pub const MAX_SSE_BUFFER_BYTES: usize = 1_048_576;

/// Terminal frame of the chat stream
pub const DONE: &str = "[DONE]";

/// `data:` payload carrying one text fragment
pub fn text_payload(text: &str) -> String {
    serde_json::json!({ "text": text }).to_string()
}

/// `data:` payload carrying a stream error
pub fn error_payload(message: &str) -> String {
    serde_json::json!({ "error": message }).to_string()
}

/// Encode one text fragment as an SSE frame
pub fn text_frame(text: &str) -> String {
    format!("data: {}\n\n", text_payload(text))
}

pub fn done_frame() -> String {
    format!("data: {}\n\n", DONE)
}

/// Incremental decoder turning arbitrary byte chunks into `data:` payloads.
///
/// Bytes are buffered until a full line is available, so multi-byte UTF-8
/// characters split across chunks decode correctly.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk; returns the payloads of every `data:` line it completes
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>, LlmError> {
        self.buffer.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        let mut consumed = 0;
        while let Some(rel) = self.buffer[consumed..].iter().position(|b| *b == b'\n') {
            let end = consumed + rel;
            if let Some(data) = Self::data_of(&self.buffer[consumed..end]) {
                payloads.push(data);
            }
            consumed = end + 1;
        }
        if consumed > 0 {
            self.buffer.drain(..consumed);
        }

        if self.buffer.len() > MAX_SSE_BUFFER_BYTES {
            return Err(LlmError::Stream(format!(
                "SSE buffer exceeded {} bytes",
                MAX_SSE_BUFFER_BYTES
            )));
        }
        Ok(payloads)
    }

    /// Flush a trailing line that was never newline-terminated
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        Self::data_of(&rest)
    }

    fn data_of(line: &[u8]) -> Option<String> {
        let line = String::from_utf8_lossy(line);
        let line = line.trim_end_matches('\r');
        // Empty lines, comments and event:/id: fields carry no payload
        let data = line.strip_prefix("data:")?;
        Some(data.strip_prefix(' ').unwrap_or(data).to_string())
    }
}

/// What a single `data:` payload means to a text stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Skip,
    Done,
    Error(String),
}

/// Interpret a payload of our own chat wire format
pub fn parse_chat_payload(data: &str) -> Payload {
    let data = data.trim();
    if data == DONE {
        return Payload::Done;
    }
    let Ok(value) = serde_json::from_str::<Value>(data) else {
        return Payload::Skip;
    };
    if let Some(err) = value.get("error") {
        let message = err
            .as_str()
            .map(str::to_string)
            .or_else(|| err.get("message").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_else(|| "unknown stream error".to_string());
        return Payload::Error(message);
    }
    match value.get("text").and_then(Value::as_str) {
        Some(text) => Payload::Text(text.to_string()),
        None => Payload::Skip,
    }
}

struct DecodeState<F> {
    bytes: BoxStream<'static, Result<Bytes, String>>,
    decoder: SseDecoder,
    pending: VecDeque<Result<String, LlmError>>,
    finished: bool,
    parse: F,
}

impl<F> DecodeState<F>
where
    F: FnMut(&str) -> Payload,
{
    fn accept(&mut self, payloads: impl IntoIterator<Item = String>) {
        for data in payloads {
            match (self.parse)(&data) {
                Payload::Text(text) if !text.is_empty() => self.pending.push_back(Ok(text)),
                Payload::Text(_) | Payload::Skip => {}
                Payload::Done => {
                    self.finished = true;
                    return;
                }
                Payload::Error(message) => {
                    self.pending.push_back(Err(LlmError::Stream(message)));
                    self.finished = true;
                    return;
                }
            }
        }
    }

    fn fail(&mut self, err: LlmError) {
        self.pending.push_back(Err(err));
        self.finished = true;
    }
}

/// Turn an SSE byte stream into a [`TextStream`] using `parse` to interpret
/// each payload. The stream ends at `Done`, at the first error, or when the
/// bytes run out.
pub fn decode_text_stream<S, E, F>(bytes: S, parse: F) -> TextStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + 'static,
    F: FnMut(&str) -> Payload + Send + 'static,
{
    let state = DecodeState {
        bytes: bytes.map(|r| r.map_err(|e| e.to_string())).boxed(),
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
        parse,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => match state.decoder.push(&chunk) {
                    Ok(payloads) => state.accept(payloads),
                    Err(e) => state.fail(e),
                },
                Some(Err(e)) => state.fail(LlmError::Stream(format!("stream read error: {}", e))),
                None => {
                    let tail = state.decoder.finish();
                    state.accept(tail);
                    state.finished = true;
                }
            }
        }
    })
    .boxed()
}
