//! End-to-end turns through registry, loader, graph runtime and session loop.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use su_config::McpSettings;
use su_core::{
    normalize_decision, AgentLoader, AgentRegistry, ChatMessage, ChatModel, ChatReply,
    ChatRequest, Graph, LoadedAgent, ResumeToken, Role, SessionLoop, ToolProvisioner, TurnOutcome,
    TurnRole,
};

/// Answers deterministically and records every history it was shown.
#[derive(Default)]
struct ScriptedModel {
    seen: Mutex<Vec<Vec<ChatMessage>>>,
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn respond(&self, request: ChatRequest<'_>) -> Result<ChatReply> {
        self.seen.lock().unwrap().push(request.history.to_vec());

        if let Some(tool) = request.history.last().filter(|m| m.role == Role::Tool) {
            return Ok(ChatReply {
                text: format!("Summary: the clock says {}", tool.content),
                tool_messages: Vec::new(),
            });
        }

        let last_user = request
            .history
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();

        if last_user.contains("twice") {
            if let Some(tools) = request.tools {
                let first = tools.execute("get_current_time", serde_json::json!({})).await?;
                let second = tools.execute("get_current_time", serde_json::json!({})).await?;
                return Ok(ChatReply {
                    text: "Checked the clock twice.".into(),
                    tool_messages: vec![
                        ChatMessage::tool("get_current_time", first),
                        ChatMessage::tool("get_current_time", second),
                    ],
                });
            }
        }

        Ok(ChatReply {
            text: format!("echo: {last_user}"),
            tool_messages: Vec::new(),
        })
    }
}

fn write(path: &Path, content: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn agent_package(root: &Path, name: &str, graph: &str) {
    write(
        &root.join(name).join("agent.json"),
        r#"{"graphs": {"main": "./src/graph.json:graph"}}"#,
    );
    write(&root.join(name).join("src/graph.json"), graph);
}

fn fixture() -> tempfile::TempDir {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    agent_package(
        root,
        "chat",
        r#"{"graph": {"nodes": [{"kind": "chatbot", "systemPrompt": "Be helpful."}]}}"#,
    );
    agent_package(
        root,
        "guarded",
        r#"{"graph": {"checkpointer": "memory", "nodes": [
            {"kind": "confirm", "message": "I am about to read the clock.", "question": "Proceed?"},
            {"kind": "tool", "name": "clock", "tool": "get_current_time"},
            {"kind": "chatbot", "name": "summarize", "useTools": false}
        ]}}"#,
    );
    agent_package(
        root,
        "forgetful",
        r#"{"graph": {"nodes": [
            {"kind": "confirm", "question": "Proceed?"},
            {"kind": "reply", "text": "done"}
        ]}}"#,
    );
    tmp
}

async fn load(root: &Path, name: &str, model: Arc<ScriptedModel>) -> Arc<LoadedAgent> {
    let mut registry = AgentRegistry::new(root);
    registry.scan();
    let model: Arc<dyn ChatModel> = model;
    let mut loader = AgentLoader::new(ToolProvisioner::new(McpSettings::default()), Some(model));
    loader.load(&mut registry, name).await.unwrap()
}

fn completed(outcome: TurnOutcome) -> su_core::TurnReply {
    match outcome {
        TurnOutcome::Completed(reply) => reply,
        other => panic!("expected completed turn, got {other:?}"),
    }
}

#[tokio::test]
async fn hello_completes_without_pause() {
    let tmp = fixture();
    let model = Arc::new(ScriptedModel::default());
    let mut session = SessionLoop::with_agent(load(tmp.path(), "chat", model).await);

    let reply = completed(session.run_turn("hello").await);
    assert_eq!(reply.content, "echo: hello");
    assert!(reply.tool_messages.is_empty());
    assert!(!session.is_paused());

    let history = session.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].role, TurnRole::Assistant);
    assert_eq!(history[1].content, "echo: hello");
    assert!(session.tool_messages().is_empty());
}

#[tokio::test]
async fn accepted_pause_runs_tool_and_summarizes() {
    let tmp = fixture();
    let model = Arc::new(ScriptedModel::default());
    let mut session = SessionLoop::with_agent(load(tmp.path(), "guarded", model).await);

    let token = match session.run_turn("what time is it?").await {
        TurnOutcome::Paused(token) => token,
        other => panic!("expected pause, got {other:?}"),
    };
    assert_eq!(token.message(), Some("I am about to read the clock."));
    assert_eq!(token.question(), Some("Proceed?"));
    assert_eq!(session.history().len(), 1);
    assert!(session.tool_messages().is_empty());

    let decision = normalize_decision("确认");
    assert_eq!(decision, ResumeToken::Accepted);
    let reply = completed(session.resume(decision).await.unwrap());

    let tool = session.tool_message(1).unwrap();
    assert_eq!(tool.role, Role::Tool);
    assert_eq!(tool.name.as_deref(), Some("get_current_time"));
    assert!(reply.content.starts_with("Summary: the clock says "));
    assert!(reply.content.ends_with(&tool.content));

    let history = session.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].content, reply.content);
}

#[tokio::test]
async fn rejected_pause_cancels() {
    let tmp = fixture();
    let model = Arc::new(ScriptedModel::default());
    let mut session = SessionLoop::with_agent(load(tmp.path(), "guarded", model.clone()).await);

    assert!(matches!(session.run_turn("time please").await, TurnOutcome::Paused(_)));
    let reply = completed(session.resume(normalize_decision("nope")).await.unwrap());

    assert_eq!(reply.content, "Operation cancelled.");
    assert!(session.tool_messages().is_empty());
    assert!(model.seen.lock().unwrap().is_empty());
    assert_eq!(session.history().len(), 2);
}

#[tokio::test]
async fn resume_without_checkpointed_graph_leaves_history_alone() {
    let tmp = fixture();
    let model = Arc::new(ScriptedModel::default());
    let agent = load(tmp.path(), "forgetful", model).await;
    assert!(agent.checkpointed().is_none());
    let mut session = SessionLoop::with_agent(agent);

    assert!(matches!(session.run_turn("go").await, TurnOutcome::Paused(_)));
    let before = session.history().to_vec();
    assert!(session.resume(ResumeToken::Accepted).await.is_none());
    assert_eq!(session.history(), before.as_slice());
    assert!(!session.is_paused());
}

#[tokio::test]
async fn turns_share_a_lineage_until_reset() {
    let tmp = fixture();
    let model = Arc::new(ScriptedModel::default());
    let agent = load(tmp.path(), "guarded", model).await;
    let graph = agent.checkpointed().unwrap().clone();
    let mut session = SessionLoop::with_agent(agent);

    let thread = session.thread_id();
    session.run_turn("first").await;
    session.resume(ResumeToken::Rejected).await;
    let after_first = graph.checkpoint(&thread).unwrap().step;

    session.run_turn("second").await;
    assert_eq!(session.thread_id(), thread);
    let cp = graph.checkpoint(&thread).unwrap();
    assert!(cp.step > after_first);
    assert!(cp.messages.iter().any(|m| m.content == "first"));

    session.reset();
    assert_ne!(session.thread_id(), thread);
    assert!(graph.checkpoint(&thread).is_none());
    assert!(graph.checkpoint(&session.thread_id()).is_none());
    assert!(session.history().is_empty());

    assert!(matches!(session.run_turn("fresh").await, TurnOutcome::Paused(_)));
    let fresh = graph.checkpoint(&session.thread_id()).unwrap();
    assert!(!fresh.messages.iter().any(|m| m.content == "first"));
}

#[tokio::test]
async fn tool_output_is_kept_out_of_the_visible_reply() {
    let tmp = fixture();
    let model = Arc::new(ScriptedModel::default());
    let mut session = SessionLoop::with_agent(load(tmp.path(), "chat", model).await);

    let reply = completed(session.run_turn("check the time twice").await);
    assert_eq!(reply.content, "Checked the clock twice.");
    assert_eq!(reply.tool_messages.len(), 2);
    assert_eq!(session.tool_message(1), Some(&reply.tool_messages[0]));
    assert_eq!(session.tool_message(2), Some(&reply.tool_messages[1]));
    assert!(session.tool_message(3).is_none());
}

#[tokio::test]
async fn every_turn_sees_the_full_history() {
    let tmp = fixture();
    let model = Arc::new(ScriptedModel::default());
    let mut session = SessionLoop::with_agent(load(tmp.path(), "chat", model.clone()).await);

    session.run_turn("one").await;
    session.run_turn("two").await;

    let seen = model.seen.lock().unwrap();
    let contents: Vec<&str> = seen[1].iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["one", "echo: one", "two"]);
}

#[tokio::test]
async fn switching_agents_keeps_history_with_new_thread() {
    let tmp = fixture();
    let model = Arc::new(ScriptedModel::default());
    let mut session = SessionLoop::with_agent(load(tmp.path(), "chat", model.clone()).await);
    session.run_turn("hello").await;
    let thread = session.thread_id();

    session.set_agent(load(tmp.path(), "guarded", model).await);
    assert_ne!(session.thread_id(), thread);
    assert_eq!(session.history().len(), 2);
}

#[tokio::test]
async fn cancelled_pause_cannot_be_resumed() {
    let tmp = fixture();
    let model = Arc::new(ScriptedModel::default());
    let agent = load(tmp.path(), "guarded", model.clone()).await;
    let graph = agent.checkpointed().unwrap().clone();
    let mut session = SessionLoop::with_agent(agent);

    assert!(matches!(session.run_turn("what time is it?").await, TurnOutcome::Paused(_)));
    session.cancel_pause();
    assert!(!session.is_paused());
    let cp = graph.checkpoint(&session.thread_id()).unwrap();
    assert!(cp.pending.is_none());

    assert!(session.resume(ResumeToken::Accepted).await.is_none());
    assert_eq!(session.history().len(), 1);
    assert!(session.tool_messages().is_empty());
    assert!(model.seen.lock().unwrap().is_empty());
    let after = graph.checkpoint(&session.thread_id()).unwrap();
    assert!(!after.messages.iter().any(|m| m.role == Role::Tool));
}

#[tokio::test]
async fn switching_agents_drops_the_old_checkpoint() {
    let tmp = fixture();
    let model = Arc::new(ScriptedModel::default());
    let guarded = load(tmp.path(), "guarded", model.clone()).await;
    let graph = guarded.checkpointed().unwrap().clone();
    let mut session = SessionLoop::with_agent(guarded);

    assert!(matches!(session.run_turn("time please").await, TurnOutcome::Paused(_)));
    let thread = session.thread_id();
    assert!(graph.checkpoint(&thread).is_some());

    session.set_agent(load(tmp.path(), "chat", model).await);
    assert!(!session.is_paused());
    assert!(graph.checkpoint(&thread).is_none());
}
