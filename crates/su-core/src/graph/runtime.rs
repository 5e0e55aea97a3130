use std::collections::VecDeque;
use std::sync::Arc;

use futures::StreamExt;
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    Checkpoint, EventStream, Graph, GraphError, GraphInput, GraphSpec, MemorySaver, NodeSpec,
    PauseToken, ResumeToken, RunConfig, StreamEvent,
};
use crate::agent::AgentContext;
use crate::llm::ChatRequest;
use crate::message::{ChatMessage, Role};

const CANCELLED: &str = "Operation cancelled.";

/// Executes a [`GraphSpec`] node by node against an agent's context.
///
/// Cloning shares the underlying checkpoint store.
#[derive(Clone)]
pub struct SpecGraph {
    inner: Arc<Inner>,
}

struct Inner {
    name: String,
    spec: GraphSpec,
    context: Arc<AgentContext>,
    saver: Option<MemorySaver>,
}

impl SpecGraph {
    pub fn new(name: impl Into<String>, spec: GraphSpec, context: Arc<AgentContext>) -> Self {
        let saver = spec.wants_checkpointer().then(MemorySaver::new);
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                spec,
                context,
                saver,
            }),
        }
    }

    pub fn spec(&self) -> &GraphSpec {
        &self.inner.spec
    }
}

impl Graph for SpecGraph {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn is_checkpointed(&self) -> bool {
        self.inner.saver.is_some()
    }

    fn stream(&self, input: GraphInput, config: RunConfig) -> EventStream {
        match Run::start(Arc::clone(&self.inner), input, config.thread_id) {
            Ok(run) => futures::stream::unfold(run, |mut run| async move {
                run.next_event().await.map(|event| (event, run))
            })
            .boxed(),
            Err(e) => futures::stream::once(async move { Err(e) }).boxed(),
        }
    }

    fn checkpoint(&self, thread_id: &Uuid) -> Option<Checkpoint> {
        self.inner.saver.as_ref().and_then(|s| s.get(thread_id))
    }

    fn discard_interrupt(&self, thread_id: &Uuid) {
        if let Some(saver) = &self.inner.saver {
            if saver.discard_interrupt(thread_id) {
                debug!("Graph '{}' dropped pending pause on thread {thread_id}", self.inner.name);
            }
        }
    }

    fn clear_thread(&self, thread_id: &Uuid) {
        if let Some(saver) = &self.inner.saver {
            saver.remove(thread_id);
        }
    }
}

/// One traversal of the node list. Owns its working state and writes it
/// back to the saver after every node.
struct Run {
    inner: Arc<Inner>,
    thread_id: Uuid,
    messages: Vec<ChatMessage>,
    next: usize,
    resume: Option<ResumeToken>,
    step: u64,
    queue: VecDeque<StreamEvent>,
    finished: bool,
}

impl Run {
    fn start(inner: Arc<Inner>, input: GraphInput, thread_id: Uuid) -> Result<Self, GraphError> {
        let previous = inner.saver.as_ref().and_then(|s| s.get(&thread_id));
        let (messages, next, resume, step) = match input {
            GraphInput::State { messages } => {
                (messages, 0, None, previous.map_or(0, |c| c.step))
            }
            GraphInput::Resume(token) => {
                if inner.saver.is_none() {
                    return Err(GraphError::NotResumable(inner.name.clone()));
                }
                let cp = previous
                    .filter(|c| c.pending.is_some())
                    .ok_or(GraphError::NoPendingInterrupt(thread_id))?;
                info!(
                    "Resuming graph '{}' on thread {thread_id} at node {} with {token}",
                    inner.name, cp.next_node
                );
                (cp.messages, cp.next_node, Some(token), cp.step)
            }
        };
        Ok(Self {
            inner,
            thread_id,
            messages,
            next,
            resume,
            step,
            queue: VecDeque::new(),
            finished: false,
        })
    }

    async fn next_event(&mut self) -> Option<Result<StreamEvent, GraphError>> {
        loop {
            if let Some(event) = self.queue.pop_front() {
                return Some(Ok(event));
            }
            if self.finished {
                return None;
            }
            if self.next >= self.inner.spec.nodes.len() {
                self.finished = true;
                self.save(None);
                continue;
            }
            if let Err(e) = self.run_node().await {
                self.finished = true;
                return Some(Err(e));
            }
        }
    }

    async fn run_node(&mut self) -> Result<(), GraphError> {
        let inner = Arc::clone(&self.inner);
        let idx = self.next;
        let node = &inner.spec.nodes[idx];
        let ctx = &inner.context;
        debug!("Graph '{}' node '{}' ({})", inner.name, node.name(), node.kind());

        match node {
            NodeSpec::Chatbot {
                system_prompt,
                system_prompt_file,
                use_tools,
                ..
            } => {
                let model = ctx
                    .model
                    .as_ref()
                    .ok_or_else(|| GraphError::NoModel(node.name().to_string()))?;
                let from_file = match (system_prompt, system_prompt_file) {
                    (None, Some(file)) => {
                        let path = ctx.resolve(file);
                        let text = tokio::fs::read_to_string(&path).await.map_err(|e| {
                            GraphError::NodeFailed {
                                node: node.name().to_string(),
                                reason: format!("cannot read {}: {e}", path.display()),
                            }
                        })?;
                        Some(text.trim().to_string())
                    }
                    _ => None,
                };
                let prompt = system_prompt
                    .as_deref()
                    .or(from_file.as_deref())
                    .or_else(|| ctx.setting("systemPrompt"));
                let request = ChatRequest {
                    system_prompt: prompt,
                    history: &self.messages,
                    tools: use_tools.then_some(&ctx.tools),
                };
                let reply = model
                    .respond(request)
                    .await
                    .map_err(|e| GraphError::NodeFailed {
                        node: node.name().to_string(),
                        reason: format!("{e:#}"),
                    })?;
                for msg in reply.tool_messages {
                    self.emit(msg);
                }
                self.emit(ChatMessage::assistant(reply.text));
                self.advance(idx + 1);
            }
            NodeSpec::Confirm {
                message, question, ..
            } => match self.resume.take() {
                None => {
                    let token = PauseToken {
                        payload: serde_json::json!({
                            "node": node.name(),
                            "message": self.render(message),
                            "question": self.render(question),
                        }),
                    };
                    self.step += 1;
                    self.save(Some(token.clone()));
                    self.queue.push_back(StreamEvent::Interrupt(token));
                    self.finished = true;
                }
                Some(ResumeToken::Accepted) => self.advance(idx + 1),
                Some(ResumeToken::Rejected) => {
                    self.emit(ChatMessage::assistant(CANCELLED));
                    self.advance(inner.spec.nodes.len());
                }
            },
            NodeSpec::Tool { tool, args, .. } => {
                if ctx.tools.get(tool).is_none() {
                    return Err(GraphError::UnknownTool(tool.clone()));
                }
                let output = ctx.tools.execute(tool, args.clone()).await.map_err(|e| {
                    GraphError::NodeFailed {
                        node: node.name().to_string(),
                        reason: format!("{e:#}"),
                    }
                })?;
                self.emit(ChatMessage::tool(tool.clone(), output));
                self.advance(idx + 1);
            }
            NodeSpec::Reply { text, .. } => {
                let text = self.render(text);
                self.emit(ChatMessage::assistant(text));
                self.advance(idx + 1);
            }
        }
        Ok(())
    }

    fn emit(&mut self, msg: ChatMessage) {
        self.messages.push(msg.clone());
        self.queue.push_back(StreamEvent::Message(msg));
    }

    fn advance(&mut self, next: usize) {
        self.next = next;
        self.step += 1;
        self.save(None);
    }

    fn save(&self, pending: Option<PauseToken>) {
        if let Some(saver) = &self.inner.saver {
            saver.put(
                self.thread_id,
                Checkpoint {
                    messages: self.messages.clone(),
                    next_node: self.next,
                    pending,
                    step: self.step,
                },
            );
        }
    }

    fn render(&self, template: &str) -> String {
        let latest = |role: Role| {
            self.messages
                .iter()
                .rev()
                .find(|m| m.role == role)
                .map(|m| m.content.as_str())
                .unwrap_or("")
        };
        template
            .replace("{last_tool}", latest(Role::Tool))
            .replace("{last_user}", latest(Role::User))
    }
}
