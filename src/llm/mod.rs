//! Text-generation providers
//!
//! Architecture follows the project pattern (trait + impl + mock):
//! - `ChildGenerator` / `ChatStreamer` traits
//! - `OpenAiGenerator` (JSON-mode chat completions) and `GeminiStreamer`
//!   (SSE streaming) as the in-process providers
//! - `HttpChildGenerator` / `HttpChatStreamer` for a remote explorer's
//!   endpoints
//! - `MockGenerator` / `MockChatStreamer` for tests

pub mod gemini;
pub mod mock;
pub mod openai;
pub mod prompt;
pub mod remote;
pub mod sse;
pub mod traits;
pub mod types;

pub use gemini::GeminiStreamer;
pub use mock::{MockChatStreamer, MockGenerator};
pub use openai::OpenAiGenerator;
pub use remote::{HttpChatStreamer, HttpChildGenerator};
pub use traits::{ChatStreamer, ChildGenerator, TextStream};
pub use types::{
    ChatMode, ChatStreamRequest, ChildSpec, GenerateRequest, GenerateResponse, HistoryMessage,
    LlmError, Role,
};
