//! The confirm/resume conversation loop.
//!
//! A turn either completes, pauses on a graph interrupt, or fails. A paused
//! turn is finished by [`SessionLoop::resume`] with the operator's decision.

use std::sync::Arc;

use futures::StreamExt;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::agent::LoadedAgent;
use crate::graph::{
    EventStream, Graph, GraphError, GraphInput, PauseToken, ResumeToken, RunConfig, StreamEvent,
};
use crate::message::{ChatMessage, ConversationTurn};

/// Replies accepted as "yes" at the confirmation prompt.
const ACCEPT_WORDS: &[&str] = &[
    "y", "yes", "ok", "okay", "sure", "confirm", "accept", "approve", "1", "true", "是", "是的",
    "好", "好的", "确认", "确定", "同意", "可以", "对",
];

/// Map free-form operator input to one of the two resume tokens.
pub fn normalize_decision(input: &str) -> ResumeToken {
    let answer = input.trim().to_lowercase();
    if ACCEPT_WORDS.contains(&answer.as_str()) {
        ResumeToken::Accepted
    } else {
        ResumeToken::Rejected
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnReply {
    /// User and assistant content, in emission order.
    pub content: String,
    /// Tool and function output produced during this turn.
    pub tool_messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    Completed(TurnReply),
    Paused(PauseToken),
    Failed(String),
}

/// What the stream produced before it ended or paused.
#[derive(Default)]
struct Collected {
    visible: Vec<String>,
    tools: Vec<ChatMessage>,
}

impl Collected {
    fn absorb(&mut self, other: Collected) {
        self.visible.extend(other.visible);
        self.tools.extend(other.tools);
    }
}

struct PendingTurn {
    token: PauseToken,
    collected: Collected,
}

pub struct SessionLoop {
    thread_id: Uuid,
    agent: Option<Arc<LoadedAgent>>,
    history: Vec<ConversationTurn>,
    tool_messages: Vec<ChatMessage>,
    pending: Option<PendingTurn>,
}

impl Default for SessionLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionLoop {
    pub fn new() -> Self {
        Self {
            thread_id: Uuid::new_v4(),
            agent: None,
            history: Vec::new(),
            tool_messages: Vec::new(),
            pending: None,
        }
    }

    pub fn with_agent(agent: Arc<LoadedAgent>) -> Self {
        let mut session = Self::new();
        session.agent = Some(agent);
        session
    }

    /// Switch agents. History is kept; the new agent gets a fresh thread so
    /// it never sees another graph's checkpoint.
    pub fn set_agent(&mut self, agent: Arc<LoadedAgent>) {
        info!("Session switched to agent '{}'", agent.name);
        self.pending = None;
        self.retire_thread();
        self.agent = Some(agent);
        self.thread_id = Uuid::new_v4();
    }

    pub fn agent(&self) -> Option<&Arc<LoadedAgent>> {
        self.agent.as_ref()
    }

    pub fn thread_id(&self) -> Uuid {
        self.thread_id
    }

    pub fn config(&self) -> RunConfig {
        RunConfig {
            thread_id: self.thread_id,
        }
    }

    pub fn history(&self) -> &[ConversationTurn] {
        &self.history
    }

    /// All tool messages of the session, oldest first.
    pub fn tool_messages(&self) -> &[ChatMessage] {
        &self.tool_messages
    }

    /// Tool message by 1-based index.
    pub fn tool_message(&self, n: usize) -> Option<&ChatMessage> {
        n.checked_sub(1).and_then(|i| self.tool_messages.get(i))
    }

    pub fn pending_pause(&self) -> Option<&PauseToken> {
        self.pending.as_ref().map(|p| &p.token)
    }

    pub fn is_paused(&self) -> bool {
        self.pending.is_some()
    }

    /// Abandon a paused turn without answering it. History and thread id
    /// are left as they are.
    pub fn cancel_pause(&mut self) {
        if self.pending.take().is_some() {
            if let Some(agent) = &self.agent {
                agent.active_graph().discard_interrupt(&self.thread_id);
            }
            debug!("Paused turn on thread {} abandoned", self.thread_id);
        }
    }

    /// Start a new conversation lineage.
    pub fn reset(&mut self) {
        self.pending = None;
        self.retire_thread();
        self.thread_id = Uuid::new_v4();
        self.history.clear();
        self.tool_messages.clear();
        info!("Session reset, new thread {}", self.thread_id);
    }

    /// Run one user turn from the full history plus `input`.
    pub async fn run_turn(&mut self, input: &str) -> TurnOutcome {
        let Some(agent) = self.agent.clone() else {
            return TurnOutcome::Failed("no agent loaded".into());
        };
        self.cancel_pause();
        self.history.push(ConversationTurn::user(input));
        let messages: Vec<ChatMessage> = self.history.iter().map(|t| t.to_message()).collect();

        let graph = agent.active_graph();
        debug!(
            "Turn on thread {} via graph '{}' ({} messages)",
            self.thread_id,
            graph.name(),
            messages.len()
        );
        let stream = graph.stream(GraphInput::State { messages }, self.config());
        self.drive(stream, Collected::default()).await
    }

    /// Answer a pending pause. `None` when no pause is pending or the agent
    /// has no checkpointed graph to resume; nothing runs and the history is
    /// left untouched.
    pub async fn resume(&mut self, decision: ResumeToken) -> Option<TurnOutcome> {
        let agent = self.agent.clone()?;
        let Some(pending) = self.pending.take() else {
            warn!("Nothing to resume on thread {}", self.thread_id);
            return None;
        };
        let Some(graph) = agent.checkpointed() else {
            warn!("Agent '{}' cannot resume: no checkpointed graph", agent.name);
            return None;
        };
        let collected = pending.collected;
        info!("Resuming thread {} with {decision}", self.thread_id);
        let stream = graph.stream(GraphInput::Resume(decision), self.config());
        Some(self.drive(stream, collected).await)
    }

    /// Drop the saved state of the current thread before it is replaced.
    fn retire_thread(&self) {
        if let Some(agent) = &self.agent {
            agent.active_graph().clear_thread(&self.thread_id);
        }
    }

    async fn drive(&mut self, stream: EventStream, mut collected: Collected) -> TurnOutcome {
        match consume(stream).await {
            Ok((part, Some(token))) => {
                collected.absorb(part);
                self.pending = Some(PendingTurn {
                    token: token.clone(),
                    collected,
                });
                TurnOutcome::Paused(token)
            }
            Ok((part, None)) => {
                collected.absorb(part);
                TurnOutcome::Completed(self.finish(collected))
            }
            Err(e) => {
                error!("Turn failed on thread {}: {e:#}", self.thread_id);
                TurnOutcome::Failed(e.to_string())
            }
        }
    }

    fn finish(&mut self, collected: Collected) -> TurnReply {
        let content = collected.visible.join("\n\n");
        if content.trim().is_empty() {
            warn!("Turn produced no visible content");
        } else {
            self.history.push(ConversationTurn::assistant(content.clone()));
        }
        self.tool_messages.extend(collected.tools.iter().cloned());
        TurnReply {
            content,
            tool_messages: collected.tools,
        }
    }
}

/// Read events until the stream ends or interrupts. The stream is dropped
/// on interrupt, so nothing after the pause runs.
async fn consume(
    mut stream: EventStream,
) -> Result<(Collected, Option<PauseToken>), GraphError> {
    let mut collected = Collected::default();
    while let Some(event) = stream.next().await {
        match event? {
            StreamEvent::Message(msg) if msg.role.is_visible() => {
                if !msg.content.is_empty() {
                    collected.visible.push(msg.content);
                }
            }
            StreamEvent::Message(msg) if msg.role.is_tool_output() => collected.tools.push(msg),
            StreamEvent::Message(msg) => debug!("Skipping {} message", msg.role),
            StreamEvent::Interrupt(token) => return Ok((collected, Some(token))),
        }
    }
    Ok((collected, None))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yes_variants_normalize_to_accepted() {
        for answer in ["yes", "Y", " ok ", "Sure", "是", "确认", "好的", "TRUE", "1"] {
            assert_eq!(normalize_decision(answer), ResumeToken::Accepted, "{answer}");
        }
    }

    #[test]
    fn everything_else_is_rejected() {
        for answer in ["no", "n", "", "maybe", "不", "yes please", "0"] {
            assert_eq!(normalize_decision(answer), ResumeToken::Rejected, "{answer}");
        }
    }

    #[test]
    fn tool_message_index_is_one_based() {
        let mut session = SessionLoop::new();
        session.tool_messages.push(ChatMessage::tool("a", "first"));
        session.tool_messages.push(ChatMessage::tool("b", "second"));
        assert!(session.tool_message(0).is_none());
        assert_eq!(session.tool_message(1).unwrap().content, "first");
        assert_eq!(session.tool_message(2).unwrap().content, "second");
        assert!(session.tool_message(3).is_none());
    }

    #[tokio::test]
    async fn turn_without_agent_fails_cleanly() {
        let mut session = SessionLoop::new();
        let id = session.thread_id();
        assert!(matches!(session.run_turn("hi").await, TurnOutcome::Failed(_)));
        assert!(session.history().is_empty());
        assert_eq!(session.thread_id(), id);
        assert!(session.resume(ResumeToken::Accepted).await.is_none());
    }

    #[test]
    fn reset_changes_thread_and_clears_state() {
        let mut session = SessionLoop::new();
        session.history.push(ConversationTurn::user("x"));
        session.tool_messages.push(ChatMessage::tool("t", "y"));
        let before = session.thread_id();
        session.reset();
        assert_ne!(session.thread_id(), before);
        assert!(session.history().is_empty());
        assert!(session.tool_messages().is_empty());
    }
}
