//! Minimal orchestration runtime for declarative agent graphs.
//!
//! A graph is consumed only through the [`Graph`] trait: stream it with an
//! input and a [`RunConfig`], read [`StreamEvent`]s until the stream ends or
//! yields an interrupt. Checkpointed graphs persist progress per thread id in
//! a [`MemorySaver`] so an interrupted run can be resumed.

pub mod checkpoint;
pub mod runtime;
pub mod spec;

use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::message::ChatMessage;

pub use checkpoint::{Checkpoint, MemorySaver};
pub use runtime::SpecGraph;
pub use spec::{GraphModule, GraphSpec, NodeSpec};

/// Interrupt raised by a graph that needs a human decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PauseToken {
    pub payload: serde_json::Value,
}

impl PauseToken {
    pub fn message(&self) -> Option<&str> {
        self.payload.get("message").and_then(|v| v.as_str())
    }

    pub fn question(&self) -> Option<&str> {
        self.payload.get("question").and_then(|v| v.as_str())
    }
}

/// Decision fed back into a paused graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeToken {
    Accepted,
    Rejected,
}

impl ResumeToken {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "[ACCEPTED]",
            Self::Rejected => "[REJECTED]",
        }
    }
}

impl std::fmt::Display for ResumeToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub enum GraphInput {
    /// Start a new run from this message state.
    State { messages: Vec<ChatMessage> },
    /// Continue the interrupted run of the configured thread.
    Resume(ResumeToken),
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Message(ChatMessage),
    Interrupt(PauseToken),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunConfig {
    pub thread_id: Uuid,
}

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("node '{0}' needs a chat model but none is configured")]
    NoModel(String),

    #[error("tool '{0}' is not available to this agent")]
    UnknownTool(String),

    #[error("node '{node}' failed: {reason}")]
    NodeFailed { node: String, reason: String },

    #[error("graph '{0}' has no checkpointer and cannot be resumed")]
    NotResumable(String),

    #[error("thread {0} has no pending interrupt")]
    NoPendingInterrupt(Uuid),
}

pub type EventStream = BoxStream<'static, Result<StreamEvent, GraphError>>;

pub trait Graph: Send + Sync {
    fn name(&self) -> &str;

    fn is_checkpointed(&self) -> bool;

    /// Events are produced lazily: a node runs only when the next event is
    /// polled, so dropping the stream stops execution.
    fn stream(&self, input: GraphInput, config: RunConfig) -> EventStream;

    /// Saved state for a thread, if this graph keeps any.
    fn checkpoint(&self, _thread_id: &Uuid) -> Option<Checkpoint> {
        None
    }

    /// Drop a pending pause so a later resume on this thread finds nothing
    /// to continue.
    fn discard_interrupt(&self, _thread_id: &Uuid) {}

    /// Forget everything saved for a thread.
    fn clear_thread(&self, _thread_id: &Uuid) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resume_tokens_render_bracketed() {
        assert_eq!(ResumeToken::Accepted.to_string(), "[ACCEPTED]");
        assert_eq!(ResumeToken::Rejected.as_str(), "[REJECTED]");
    }

    #[test]
    fn pause_token_accessors() {
        let token = PauseToken {
            payload: serde_json::json!({"message": "About to run", "question": "Proceed?"}),
        };
        assert_eq!(token.message(), Some("About to run"));
        assert_eq!(token.question(), Some("Proceed?"));
        let bare = PauseToken {
            payload: serde_json::json!("continue?"),
        };
        assert_eq!(bare.message(), None);
    }
}
