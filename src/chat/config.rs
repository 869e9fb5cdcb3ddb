//! Chat configuration

/// Shown in place of a reply whenever the stream fails
pub const APOLOGY_MESSAGE: &str = "I'm having trouble connecting to the library archives right now.";

/// Configuration for the chat session manager
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Text written into the placeholder when a reply fails
    pub apology: String,
    /// Characters of the last message shown in the session list
    pub preview_chars: usize,
    /// Buffer of the per-turn event channel
    pub event_buffer: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            apology: APOLOGY_MESSAGE.to_string(),
            preview_chars: 60,
            event_buffer: 256,
        }
    }
}
