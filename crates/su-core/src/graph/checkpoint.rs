use dashmap::DashMap;
use uuid::Uuid;

use super::PauseToken;
use crate::message::ChatMessage;

/// State of one thread after its most recent node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Checkpoint {
    pub messages: Vec<ChatMessage>,
    /// Index of the next node to run. Points at the interrupting node while
    /// a pause is pending.
    pub next_node: usize,
    pub pending: Option<PauseToken>,
    /// Number of nodes executed on this thread across all runs.
    pub step: u64,
}

/// In-process checkpoint store keyed by thread id. Lives as long as the
/// graph that owns it.
#[derive(Debug, Default)]
pub struct MemorySaver {
    threads: DashMap<Uuid, Checkpoint>,
}

impl MemorySaver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, thread_id: &Uuid) -> Option<Checkpoint> {
        self.threads.get(thread_id).map(|c| c.value().clone())
    }

    pub fn put(&self, thread_id: Uuid, checkpoint: Checkpoint) {
        self.threads.insert(thread_id, checkpoint);
    }

    pub fn remove(&self, thread_id: &Uuid) -> Option<Checkpoint> {
        self.threads.remove(thread_id).map(|(_, c)| c)
    }

    /// Clear a pending pause so the thread can no longer be resumed.
    /// Returns whether a pause was pending.
    pub fn discard_interrupt(&self, thread_id: &Uuid) -> bool {
        self.threads
            .get_mut(thread_id)
            .and_then(|mut c| c.pending.take())
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }
}
