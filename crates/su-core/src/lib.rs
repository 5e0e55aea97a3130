pub mod agent;
pub mod error;
pub mod graph;
pub mod llm;
pub mod mcp;
pub mod message;
pub mod session;
pub mod tools;

// Re-export key types
pub use agent::{AgentContext, AgentDescriptor, AgentLoader, AgentRegistry, LoadedAgent};
pub use error::AgentError;
pub use graph::{Graph, GraphError, PauseToken, ResumeToken};
pub use llm::{ChatModel, ChatReply, ChatRequest, RigChatModel};
pub use message::{ChatMessage, ConversationTurn, Role, TurnRole};
pub use session::{normalize_decision, SessionLoop, TurnOutcome, TurnReply};
pub use tools::{Tool, ToolProvisioner, ToolSet};
