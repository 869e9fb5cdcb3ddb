//! ChatManager: per-node conversation threads with streamed replies
//!
//! Architecture:
//! - Sessions live in one `RwLock<ChatState>`; the active session id and the
//!   per-session loading set sit next to them so every transition is a
//!   single locked update
//! - Each reply runs in its own task: the placeholder message is extended in
//!   place as fragments arrive and every fragment is also sent on a
//!   per-turn `broadcast::channel` for SSE subscribers
//! - On completion the follow-up questions marker is split off; on failure
//!   the placeholder is overwritten with the apology text. The loading flag
//!   is cleared in both cases

use super::config::ChatConfig;
use super::sentinel::extract_suggested_questions;
use super::types::{ChatEvent, ChatMessage, ChatSession, SessionSummary, SessionView};
use crate::llm::traits::ChatStreamer;
use crate::llm::types::{ChatMode, ChatStreamRequest, LlmError};
use crate::tree::traits::NodeStore;
use futures::StreamExt;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    #[error("no active chat session")]
    NoActiveSession,
    #[error("chat session {0} not found")]
    SessionNotFound(Uuid),
    #[error("chat session {0} is still answering")]
    SessionBusy(Uuid),
}

#[derive(Debug, Default)]
struct ChatState {
    sessions: HashMap<Uuid, ChatSession>,
    /// Session ids, most recently created first
    order: Vec<Uuid>,
    active: Option<Uuid>,
    loading: HashSet<Uuid>,
    chat_open: bool,
}

impl ChatState {
    fn view(&self, id: Uuid) -> Option<SessionView> {
        let session = self.sessions.get(&id)?;
        Some(SessionView {
            suggested_questions: session.suggested_questions(),
            is_active: self.active == Some(id),
            is_loading: self.loading.contains(&id),
            session: session.clone(),
        })
    }
}

/// A reply in progress
#[derive(Debug)]
pub struct ChatTurn {
    pub session_id: Uuid,
    /// Deltas followed by exactly one terminal event
    pub events: broadcast::Receiver<ChatEvent>,
    /// Resolves once the reply is stored
    pub task: JoinHandle<()>,
}

/// Parameters of [`ChatManager::trigger_chat`]
#[derive(Debug, Clone)]
pub struct TriggerChat {
    pub node_id: String,
    pub node_title: String,
    pub mode: ChatMode,
    pub question: Option<String>,
    pub open_chat: bool,
}

pub struct ChatManager {
    state: Arc<RwLock<ChatState>>,
    streamer: Arc<dyn ChatStreamer>,
    nodes: Arc<dyn NodeStore>,
    config: ChatConfig,
}

impl ChatManager {
    pub fn new(
        streamer: Arc<dyn ChatStreamer>,
        nodes: Arc<dyn NodeStore>,
        config: ChatConfig,
    ) -> Self {
        Self {
            state: Arc::new(RwLock::new(ChatState::default())),
            streamer,
            nodes,
            config,
        }
    }

    /// Ask about a node.
    ///
    /// Reuses the active session when it belongs to `node_id`, otherwise
    /// creates a new session and makes it active. Without a question a
    /// hidden "Tell me about ..." opener is sent.
    pub async fn trigger_chat(&self, trigger: TriggerChat) -> Result<ChatTurn, ChatError> {
        let ancestry_path = self.nodes.ancestry_titles(&trigger.node_id).await;

        let (session_id, placeholder_index, request) = {
            let mut state = self.state.write().await;

            let reuse = state.active.filter(|id| {
                state
                    .sessions
                    .get(id)
                    .is_some_and(|s| s.node_id == trigger.node_id)
            });
            let session_id = match reuse {
                Some(id) => id,
                None => {
                    let session = ChatSession::new(&trigger.node_id, &trigger.node_title);
                    let id = session.id;
                    info!(session_id = %id, node_id = %trigger.node_id, "Created chat session");
                    state.sessions.insert(id, session);
                    state.order.insert(0, id);
                    state.active = Some(id);
                    id
                }
            };

            if state.loading.contains(&session_id) {
                return Err(ChatError::SessionBusy(session_id));
            }
            if trigger.open_chat {
                state.chat_open = true;
            }

            let session = state
                .sessions
                .get_mut(&session_id)
                .ok_or(ChatError::SessionNotFound(session_id))?;

            let history = session.messages.iter().map(ChatMessage::to_history).collect();
            let (message, hidden) = match trigger.question {
                Some(question) => (question, false),
                None => (format!("Tell me about {}", trigger.node_title), true),
            };

            let mut user = ChatMessage::user(message.clone());
            user.hidden = hidden;
            session.messages.push(user);
            session.messages.push(ChatMessage::placeholder());
            let placeholder_index = session.messages.len() - 1;

            let request = ChatStreamRequest {
                message,
                node_title: session.node_title.clone(),
                ancestry_path,
                mode: trigger.mode,
                history,
            };

            state.loading.insert(session_id);
            (session_id, placeholder_index, request)
        };

        let (events_tx, events) = broadcast::channel(self.config.event_buffer);
        let task = tokio::spawn(run_turn(
            self.state.clone(),
            self.streamer.clone(),
            request,
            session_id,
            placeholder_index,
            events_tx,
            self.config.apology.clone(),
        ));

        Ok(ChatTurn {
            session_id,
            events,
            task,
        })
    }

    /// Follow-up on the active session's node in chat mode
    pub async fn send_message(&self, text: &str) -> Result<ChatTurn, ChatError> {
        let (node_id, node_title) = {
            let state = self.state.read().await;
            let id = state.active.ok_or(ChatError::NoActiveSession)?;
            let session = state
                .sessions
                .get(&id)
                .ok_or(ChatError::SessionNotFound(id))?;
            (session.node_id.clone(), session.node_title.clone())
        };

        self.trigger_chat(TriggerChat {
            node_id,
            node_title,
            mode: ChatMode::Chat,
            question: Some(text.to_string()),
            open_chat: false,
        })
        .await
    }

    /// Make an existing session the active one and open the chat
    pub async fn switch_session(&self, id: Uuid) -> Result<SessionView, ChatError> {
        let mut state = self.state.write().await;
        if !state.sessions.contains_key(&id) {
            return Err(ChatError::SessionNotFound(id));
        }
        state.active = Some(id);
        state.chat_open = true;
        debug!(session_id = %id, "Switched chat session");
        state.view(id).ok_or(ChatError::SessionNotFound(id))
    }

    pub async fn delete_session(&self, id: Uuid) -> Result<(), ChatError> {
        let mut state = self.state.write().await;
        if state.sessions.remove(&id).is_none() {
            return Err(ChatError::SessionNotFound(id));
        }
        state.order.retain(|s| *s != id);
        state.loading.remove(&id);
        if state.active == Some(id) {
            state.active = None;
        }
        info!(session_id = %id, "Deleted chat session");
        Ok(())
    }

    /// Sessions, most recent first
    pub async fn list_sessions(&self) -> Vec<SessionSummary> {
        let state = self.state.read().await;
        state
            .order
            .iter()
            .filter_map(|id| state.sessions.get(id))
            .map(|s| SessionSummary {
                id: s.id,
                node_id: s.node_id.clone(),
                title: s.node_title.clone(),
                preview: s.preview(self.config.preview_chars),
                message_count: s.messages.len(),
                created_at: s.created_at,
                is_active: state.active == Some(s.id),
                is_loading: state.loading.contains(&s.id),
            })
            .collect()
    }

    pub async fn get_session(&self, id: Uuid) -> Result<SessionView, ChatError> {
        self.state
            .read()
            .await
            .view(id)
            .ok_or(ChatError::SessionNotFound(id))
    }

    pub async fn active_session(&self) -> Option<SessionView> {
        let state = self.state.read().await;
        state.active.and_then(|id| state.view(id))
    }

    pub async fn is_loading(&self, id: Uuid) -> bool {
        self.state.read().await.loading.contains(&id)
    }

    pub async fn is_chat_open(&self) -> bool {
        self.state.read().await.chat_open
    }

    /// Flip the chat-open flag and return the new value
    pub async fn toggle_chat(&self) -> bool {
        let mut state = self.state.write().await;
        state.chat_open = !state.chat_open;
        state.chat_open
    }
}

/// Stream one reply into the placeholder at `index` of `session_id`
async fn run_turn(
    state: Arc<RwLock<ChatState>>,
    streamer: Arc<dyn ChatStreamer>,
    request: ChatStreamRequest,
    session_id: Uuid,
    index: usize,
    events_tx: broadcast::Sender<ChatEvent>,
    apology: String,
) {
    let streamed: Result<(), LlmError> = async {
        let mut stream = streamer.stream_chat(&request).await?;
        while let Some(chunk) = stream.next().await {
            let text = chunk?;
            {
                let mut state = state.write().await;
                if let Some(msg) = state
                    .sessions
                    .get_mut(&session_id)
                    .and_then(|s| s.messages.get_mut(index))
                {
                    msg.content.push_str(&text);
                }
            }
            // No subscriber is fine: the session log is the source of truth
            let _ = events_tx.send(ChatEvent::StreamDelta { session_id, text });
        }
        Ok(())
    }
    .await;

    let event = {
        let mut state = state.write().await;
        state.loading.remove(&session_id);
        let msg = state
            .sessions
            .get_mut(&session_id)
            .and_then(|s| s.messages.get_mut(index));

        match (streamed, msg) {
            (Ok(()), Some(msg)) => {
                let (content, questions) = extract_suggested_questions(&msg.content);
                msg.content = content.clone();
                msg.suggested_questions = questions.clone();
                debug!(session_id = %session_id, chars = content.len(), "Chat reply completed");
                ChatEvent::Completed {
                    session_id,
                    content,
                    suggested_questions: questions,
                }
            }
            (Err(e), Some(msg)) => {
                warn!(session_id = %session_id, error = %e, "Chat reply failed");
                msg.content = apology.clone();
                msg.suggested_questions = None;
                ChatEvent::Failed {
                    session_id,
                    message: apology,
                }
            }
            (_, None) => {
                debug!(session_id = %session_id, "Session removed while answering");
                ChatEvent::Failed {
                    session_id,
                    message: apology,
                }
            }
        }
    };
    let _ = events_tx.send(event);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::MockChatStreamer;
    use crate::llm::types::Role;
    use crate::tree::cache::NodeCache;
    use crate::tree::memory::InMemoryNodeStore;
    use crate::tree::models::Node;
    use tokio::sync::Notify;

    fn nodes() -> Arc<dyn NodeStore> {
        Arc::new(InMemoryNodeStore::new(NodeCache::new(
            vec![
                Node::leaf("a", "Alpha", ""),
                Node::leaf("b", "Beta", ""),
            ],
            vec![],
            20,
        )))
    }

    fn manager(streamer: Arc<MockChatStreamer>) -> ChatManager {
        ChatManager::new(streamer, nodes(), ChatConfig::default())
    }

    fn explore(node_id: &str, title: &str) -> TriggerChat {
        TriggerChat {
            node_id: node_id.into(),
            node_title: title.into(),
            mode: ChatMode::Explore,
            question: None,
            open_chat: true,
        }
    }

    #[tokio::test]
    async fn test_trigger_creates_hidden_opener_and_reply() {
        let streamer = Arc::new(MockChatStreamer::new());
        streamer.push_chunks(["Alpha ", "is first."]).await;
        let manager = manager(streamer.clone());

        let turn = manager.trigger_chat(explore("a", "Alpha")).await.unwrap();
        turn.task.await.unwrap();

        let view = manager.get_session(turn.session_id).await.unwrap();
        assert!(view.is_active);
        assert!(!view.is_loading);
        let messages = &view.session.messages;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "Tell me about Alpha");
        assert!(messages[0].hidden);
        assert_eq!(messages[1].role, Role::Model);
        assert_eq!(messages[1].content, "Alpha is first.");
        assert!(manager.is_chat_open().await);

        let requests = streamer.requests().await;
        assert_eq!(requests[0].mode, ChatMode::Explore);
        assert!(requests[0].history.is_empty());
    }

    #[tokio::test]
    async fn test_events_stream_deltas_then_completed() {
        let streamer = Arc::new(MockChatStreamer::new());
        streamer
            .push_chunks(["Hi", " there", "<!--QUESTIONS:[\"Why?\"]-->"])
            .await;
        let manager = manager(streamer);

        let mut turn = manager.trigger_chat(explore("a", "Alpha")).await.unwrap();
        let mut deltas = String::new();
        loop {
            match turn.events.recv().await.unwrap() {
                ChatEvent::StreamDelta { text, .. } => deltas.push_str(&text),
                ChatEvent::Completed {
                    content,
                    suggested_questions,
                    ..
                } => {
                    assert_eq!(content, "Hi there");
                    assert_eq!(suggested_questions.unwrap(), vec!["Why?"]);
                    break;
                }
                other => panic!("unexpected event {:?}", other),
            }
        }
        assert!(deltas.ends_with("-->"));
    }

    #[tokio::test]
    async fn test_char_by_char_equals_single_chunk() {
        let reply = "Plate tectonics explains drift.\n<!--QUESTIONS:[\"How?\",\"Why?\",\"When?\"]-->";

        let split = Arc::new(MockChatStreamer::new());
        split
            .push_chunks(reply.chars().map(|c| c.to_string()).collect::<Vec<_>>())
            .await;
        let whole = Arc::new(MockChatStreamer::new());
        whole.push_chunks([reply]).await;

        let mut results = Vec::new();
        for streamer in [split, whole] {
            let manager = manager(streamer);
            let turn = manager.trigger_chat(explore("a", "Alpha")).await.unwrap();
            turn.task.await.unwrap();
            let view = manager.get_session(turn.session_id).await.unwrap();
            results.push(view.session.messages[1].clone());
        }
        assert_eq!(results[0], results[1]);
        assert_eq!(results[0].content, "Plate tectonics explains drift.");
        assert_eq!(
            results[0].suggested_questions.as_deref(),
            Some(&["How?".to_string(), "Why?".to_string(), "When?".to_string()][..])
        );
    }

    #[tokio::test]
    async fn test_failure_writes_apology_and_clears_loading() {
        let streamer = Arc::new(MockChatStreamer::new());
        streamer
            .push_broken(["partial"], LlmError::Stream("reset".into()))
            .await;
        let manager = manager(streamer);

        let mut turn = manager.trigger_chat(explore("a", "Alpha")).await.unwrap();
        let mut terminal = None;
        while let Ok(event) = turn.events.recv().await {
            if event.is_terminal() {
                terminal = Some(event);
                break;
            }
        }
        assert!(matches!(terminal, Some(ChatEvent::Failed { .. })));
        turn.task.await.unwrap();

        let view = manager.get_session(turn.session_id).await.unwrap();
        assert_eq!(
            view.session.messages[1].content,
            crate::chat::config::APOLOGY_MESSAGE
        );
        assert!(!manager.is_loading(turn.session_id).await);
    }

    #[tokio::test]
    async fn test_refused_stream_is_apology() {
        let streamer = Arc::new(MockChatStreamer::new());
        streamer
            .push_refusal(LlmError::MissingCredentials("GOOGLE_API_KEY"))
            .await;
        let manager = manager(streamer);

        let turn = manager.trigger_chat(explore("a", "Alpha")).await.unwrap();
        turn.task.await.unwrap();
        let view = manager.get_session(turn.session_id).await.unwrap();
        assert_eq!(view.session.messages[1].content, ChatConfig::default().apology);
        assert!(!view.is_loading);
    }

    #[tokio::test]
    async fn test_follow_up_goes_to_latest_node_session() {
        let streamer = Arc::new(MockChatStreamer::new());
        let manager = manager(streamer.clone());

        let a = manager.trigger_chat(explore("a", "Alpha")).await.unwrap();
        a.task.await.unwrap();
        let a_before = manager.get_session(a.session_id).await.unwrap().session;

        let b = manager.trigger_chat(explore("b", "Beta")).await.unwrap();
        b.task.await.unwrap();
        assert_ne!(a.session_id, b.session_id);

        let follow = manager.send_message("And then?").await.unwrap();
        assert_eq!(follow.session_id, b.session_id);
        follow.task.await.unwrap();

        let b_view = manager.get_session(b.session_id).await.unwrap();
        assert_eq!(b_view.session.messages.len(), 4);
        assert_eq!(b_view.session.messages[2].content, "And then?");
        assert!(!b_view.session.messages[2].hidden);

        let last = streamer.requests().await.pop().unwrap();
        assert_eq!(last.mode, ChatMode::Chat);
        assert_eq!(last.history.len(), 2);

        let a_view = manager.switch_session(a.session_id).await.unwrap();
        assert!(a_view.is_active);
        assert_eq!(a_view.session.messages, a_before.messages);
    }

    #[tokio::test]
    async fn test_same_node_reuses_active_session() {
        let manager = manager(Arc::new(MockChatStreamer::new()));
        let first = manager.trigger_chat(explore("a", "Alpha")).await.unwrap();
        first.task.await.unwrap();

        let mut again = explore("a", "Alpha");
        again.question = Some("What else?".into());
        let second = manager.trigger_chat(again).await.unwrap();
        second.task.await.unwrap();

        assert_eq!(first.session_id, second.session_id);
        assert_eq!(manager.list_sessions().await.len(), 1);
    }

    #[tokio::test]
    async fn test_busy_session_rejects_second_turn() {
        let gate = Arc::new(Notify::new());
        let streamer = Arc::new(MockChatStreamer::new().with_gate(gate.clone()));
        let manager = manager(streamer);

        let first = manager.trigger_chat(explore("a", "Alpha")).await.unwrap();
        assert!(manager.is_loading(first.session_id).await);
        let err = manager.send_message("too soon").await.unwrap_err();
        assert_eq!(err, ChatError::SessionBusy(first.session_id));

        gate.notify_one();
        first.task.await.unwrap();
        assert!(manager.send_message("now").await.is_ok());
    }

    #[tokio::test]
    async fn test_send_without_session() {
        let manager = manager(Arc::new(MockChatStreamer::new()));
        assert_eq!(
            manager.send_message("hello").await.unwrap_err(),
            ChatError::NoActiveSession
        );
    }

    #[tokio::test]
    async fn test_list_order_and_delete() {
        let manager = manager(Arc::new(MockChatStreamer::new()));
        let a = manager.trigger_chat(explore("a", "Alpha")).await.unwrap();
        a.task.await.unwrap();
        let b = manager.trigger_chat(explore("b", "Beta")).await.unwrap();
        b.task.await.unwrap();

        let list = manager.list_sessions().await;
        assert_eq!(list[0].id, b.session_id);
        assert_eq!(list[0].title, "Beta");
        assert!(list[0].is_active);
        assert_eq!(list[1].id, a.session_id);

        manager.delete_session(b.session_id).await.unwrap();
        assert!(manager.active_session().await.is_none());
        assert_eq!(manager.list_sessions().await.len(), 1);
        assert_eq!(
            manager.delete_session(b.session_id).await.unwrap_err(),
            ChatError::SessionNotFound(b.session_id)
        );
    }

    #[tokio::test]
    async fn test_ancestry_from_active_path() {
        let nodes = nodes();
        nodes
            .append_page("a", vec![crate::llm::types::ChildSpec::new("Gamma", "")])
            .await
            .unwrap();
        nodes.select("a", 0).await.unwrap();
        nodes.select("a.0.0", 1).await.unwrap();

        let streamer = Arc::new(MockChatStreamer::new());
        let manager = ChatManager::new(streamer.clone(), nodes, ChatConfig::default());
        let turn = manager.trigger_chat(explore("a.0.0", "Gamma")).await.unwrap();
        turn.task.await.unwrap();

        let request = streamer.requests().await.pop().unwrap();
        assert_eq!(request.ancestry_path, vec!["Alpha"]);
        assert_eq!(request.node_title, "Gamma");
    }

    #[tokio::test]
    async fn test_toggle_chat() {
        let manager = manager(Arc::new(MockChatStreamer::new()));
        assert!(!manager.is_chat_open().await);
        assert!(manager.toggle_chat().await);
        assert!(!manager.toggle_chat().await);
    }
}
